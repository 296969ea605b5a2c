#![allow(clippy::unwrap_used)]
// Wire-level tests for `DavClient` using wiremock.

use std::time::Duration;

use reqwest::Method;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cumulo_api::{DavClient, Error, RequestSpec};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DavClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    // Native redirect following must stay off; the client follows
    // redirects manually.
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let client = DavClient::with_client(http, base_url);
    (server, client)
}

fn get(client: &DavClient, path: &str) -> RequestSpec {
    RequestSpec::new(Method::GET, client.url_for(path).unwrap())
}

// ── Redirect handling ───────────────────────────────────────────────

#[tokio::test]
async fn test_redirect_followed_to_target() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/old")).await.unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.hops_followed(), 1);
}

#[tokio::test]
async fn test_redirect_loop_bounded_at_three_hops() {
    let (server, client) = setup().await;

    // Always redirects back to itself: 1 initial request + exactly 3
    // follow-ups, then a not-found-class failure.
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .expect(4)
        .mount(&server)
        .await;

    let result = client.execute(get(&client, "/loop")).await;

    match result {
        Err(ref e @ Error::RedirectLimitExceeded { hops }) => {
            assert_eq!(hops, 3);
            assert!(e.is_not_found());
        }
        other => panic!("expected RedirectLimitExceeded, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_redirect_without_location_fails_immediately() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.execute(get(&client, "/broken")).await;

    match result {
        Err(ref e @ Error::RedirectWithoutLocation { status }) => {
            assert_eq!(status, 302);
            assert!(e.is_not_found());
        }
        other => panic!("expected RedirectWithoutLocation, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_redirect_returned_when_following_disabled() {
    let (server, mut client) = setup().await;
    client.set_follow_redirects(false);

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://idp.example.com/saml/login"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/old")).await.unwrap();

    assert!(resp.is_redirect());
    assert_eq!(resp.hops_followed(), 0);
    assert!(resp.is_idp_redirection(client.base_url()));
}

#[tokio::test]
async fn test_same_authority_redirect_is_not_idp() {
    let (server, mut client) = setup().await;
    client.set_follow_redirects(false);

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/remote.php/dav"))
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/old")).await.unwrap();

    assert!(resp.is_redirect());
    assert!(!resp.is_idp_redirection(client.base_url()));
}

// ── Credential application ──────────────────────────────────────────

#[tokio::test]
async fn test_basic_auth_sent_preemptively() {
    let (server, mut client) = setup().await;
    client.set_basic_credentials("alice", SecretString::from("pw".to_string()));

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("Authorization", "Basic YWxpY2U6cHc="))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/files")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_bearer_auth_header() {
    let (server, mut client) = setup().await;
    client.set_bearer_credentials(SecretString::from("tok-123".to_string()));

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/files")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_saml_cookie_sent_verbatim() {
    let (server, mut client) = setup().await;
    client.set_saml_session_cookie(SecretString::from("oc_session=s3ss10n".to_string()));

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("Cookie", "oc_session=s3ss10n"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/files")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_replaced_credentials_drop_old_header() {
    let (server, mut client) = setup().await;
    client.set_basic_credentials("alice", SecretString::from("pw".to_string()));
    client.set_bearer_credentials(SecretString::from("tok-123".to_string()));

    // Only the bearer header may appear; a lingering Basic header would
    // not match and the expectation would fail on drop.
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.execute(get(&client, "/files")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

// ── Timeout scoping ─────────────────────────────────────────────────

#[tokio::test]
async fn test_per_call_timeout_is_scoped_to_that_call() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    // Override shorter than the server delay: this call times out.
    let result = client
        .execute(get(&client, "/slow").timeout(Duration::from_millis(50)))
        .await;
    assert!(
        matches!(result, Err(ref e) if e.is_timeout()),
        "expected timeout, got: {result:?}"
    );

    // Next call without an override reverts to the client default and
    // completes normally.
    let resp = client.execute(get(&client, "/slow")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

// ── HEAD helper ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_exists_true_on_success() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/remote.php/dav/files/alice/notes.txt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.exists("/remote.php/dav/files/alice/notes.txt").await.unwrap());
}

#[tokio::test]
async fn test_exists_false_on_missing() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/remote.php/dav/files/alice/gone.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!client.exists("/remote.php/dav/files/alice/gone.txt").await.unwrap());
}

// ── Probe helper ────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_status_returns_status_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/index.php/204"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let url = client.url_for("/index.php/204").unwrap();
    let (status, body) = client
        .probe_status(url, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(status.as_u16(), 204);
    assert!(body.is_empty());
}
