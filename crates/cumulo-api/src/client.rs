// WebDAV transport client
//
// Wraps `reqwest::Client` with per-request credential application,
// bounded manual redirect following, and scoped per-call timeout
// overrides. Higher layers (operation execution, connectivity probing)
// talk to the server exclusively through this type.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::credentials::Credentials;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Fixed identifying user-agent applied to every request.
pub const USER_AGENT: &str = concat!("cumulo/", env!("CARGO_PKG_VERSION"), " (WebDAV client)");

/// Upper bound on manually followed redirect hops per logical request.
/// Exceeding it is a not-found-class failure, never a loop.
pub const MAX_REDIRECTS: u32 = 3;

/// A single logical request: method, target, headers, body, and an
/// optional per-call timeout override.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<String>,
    timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// WebDAV `Depth` header shorthand.
    pub fn depth(self, depth: u8) -> Self {
        self.header("Depth", depth.to_string())
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Scoped timeout override: applies to this request only. The next
    /// request without an override uses the client's configured default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response from [`DavClient::execute`], after any redirect following.
pub struct DavResponse {
    inner: reqwest::Response,
    hops_followed: u32,
}

impl DavResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Number of redirect hops actually followed for this request.
    pub fn hops_followed(&self) -> u32 {
        self.hops_followed
    }

    pub fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    /// The `Location` header value, verbatim, if present.
    pub fn location(&self) -> Option<&str> {
        self.inner
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Whether this terminal response is itself a redirect (seen when the
    /// client was built with redirect following disabled).
    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.inner.status())
    }

    /// Classify a terminal redirect as an identity-provider redirection:
    /// the `Location` target leaves the given base authority, or lands on
    /// an SSO/SAML path. Callers treat this like an auth failure.
    pub fn is_idp_redirection(&self, base: &Url) -> bool {
        if !self.is_redirect() {
            return false;
        }
        let Some(loc) = self.location() else {
            return false;
        };
        match Url::parse(loc) {
            Ok(target) => {
                let cross_authority = target.host_str() != base.host_str()
                    || target.port_or_known_default() != base.port_or_known_default();
                cross_authority || path_hints_sso(target.path())
            }
            // Relative Location stays on the same authority.
            Err(_) => path_hints_sso(loc),
        }
    }

    /// Consume the response and return the full body.
    pub async fn bytes(self) -> Result<Vec<u8>, Error> {
        let bytes = self.inner.bytes().await.map_err(Error::Transport)?;
        Ok(bytes.to_vec())
    }

    /// Consume the response and return the body as text.
    pub async fn text(self) -> Result<String, Error> {
        self.inner.text().await.map_err(Error::Transport)
    }

    /// Fully drain and discard the body so the underlying connection
    /// returns to the pool. Never leave a response undrained.
    pub async fn drain(self) -> Result<(), Error> {
        let _ = self.inner.bytes().await.map_err(Error::Transport)?;
        Ok(())
    }
}

impl std::fmt::Debug for DavResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavResponse")
            .field("status", &self.inner.status())
            .field("hops_followed", &self.hops_followed)
            .finish_non_exhaustive()
    }
}

fn is_redirect_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT
    )
}

fn path_hints_sso(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("/saml") || lower.contains("/sso") || lower.contains("/idp")
}

/// WebDAV transport client for one server.
///
/// Holds the base URL, the single active credential slot, and the
/// redirect-follow flag. A client is owned by the operation or session
/// that created it; concurrent unrelated operations each get their own
/// (the pooled connections underneath may be shared process-wide).
#[derive(Debug)]
pub struct DavClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    follow_redirects: bool,
    default_timeout: Duration,
}

impl DavClient {
    /// Create a client for `base_url` from a shared `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials: Credentials::None,
            follow_redirects: true,
            default_timeout: transport.request_timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for having disabled native redirect
    /// following on `http`; this client follows redirects manually.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            credentials: Credentials::None,
            follow_redirects: true,
            default_timeout: Duration::from_secs(30),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a server-relative path against the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    pub fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    // ── Credential management ────────────────────────────────────────
    //
    // One slot: each setter replaces whatever was active before, so at
    // most one credential kind is ever attached.

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Attach Basic username/password auth, applied preemptively.
    pub fn set_basic_credentials(&mut self, username: impl Into<String>, password: SecretString) {
        self.credentials = Credentials::Basic {
            username: username.into(),
            password,
        };
    }

    /// Attach an OAuth2 bearer token.
    pub fn set_bearer_credentials(&mut self, token: SecretString) {
        self.credentials = Credentials::Bearer { token };
    }

    /// Attach a SAML SSO session cookie, sent verbatim as a `Cookie`
    /// header on every request.
    pub fn set_saml_session_cookie(&mut self, cookie: SecretString) {
        self.credentials = Credentials::SamlSession { cookie };
    }

    pub fn clear_credentials(&mut self) {
        self.credentials = Credentials::None;
    }

    // ── Request execution ────────────────────────────────────────────

    /// Execute a request, following 301/302/307 redirects manually up to
    /// [`MAX_REDIRECTS`] hops when redirect following is enabled.
    ///
    /// Blocking network call: do not invoke from a latency-sensitive
    /// context; the operation layer runs this on worker tasks.
    pub async fn execute(&self, spec: RequestSpec) -> Result<DavResponse, Error> {
        let mut url = spec.url.clone();
        let mut hops: u32 = 0;

        loop {
            debug!(method = %spec.method, %url, "dispatching request");
            let resp = self.send_once(&spec, url.clone()).await?;
            let status = resp.status();

            if self.follow_redirects && is_redirect_status(status) {
                if hops >= MAX_REDIRECTS {
                    return Err(Error::RedirectLimitExceeded { hops });
                }
                let Some(location) = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
                else {
                    return Err(Error::RedirectWithoutLocation {
                        status: status.as_u16(),
                    });
                };

                // Location taken verbatim and re-parsed as the next target;
                // relative values resolve against the current URL.
                let next = match Url::parse(&location) {
                    Ok(u) => u,
                    Err(url::ParseError::RelativeUrlWithoutBase) => {
                        url.join(&location).map_err(Error::InvalidUrl)?
                    }
                    Err(e) => return Err(Error::InvalidUrl(e)),
                };

                debug!(hop = hops + 1, location = %next, "following redirect");
                url = next;
                hops += 1;
                continue;
            }

            return Ok(DavResponse {
                inner: resp,
                hops_followed: hops,
            });
        }
    }

    async fn send_once(&self, spec: &RequestSpec, url: Url) -> Result<reqwest::Response, Error> {
        let mut builder = self.http.request(spec.method.clone(), url);

        builder = match &self.credentials {
            Credentials::None => builder,
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            Credentials::Bearer { token } => builder.bearer_auth(token.expose_secret()),
            Credentials::SamlSession { cookie } => builder.header(COOKIE, cookie.expose_secret()),
        };

        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }

        if let Some(ref body) = spec.body {
            builder = builder.body(body.clone());
        }

        // Per-call override is scoped to this send only; the builder
        // default (from TransportConfig) applies otherwise.
        if let Some(timeout) = spec.timeout {
            builder = builder.timeout(timeout);
        }

        let timeout_secs = spec.timeout.unwrap_or(self.default_timeout).as_secs();
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout { timeout_secs }
            } else {
                Error::Transport(e)
            }
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Check whether a server-relative path exists via `HEAD`.
    ///
    /// The response body is fully drained before returning so the
    /// connection goes back to the pool.
    pub async fn exists(&self, path: &str) -> Result<bool, Error> {
        let url = self.url_for(path)?;
        let resp = self.execute(RequestSpec::new(Method::HEAD, url)).await?;
        let found = resp.status().is_success();
        resp.drain().await?;
        Ok(found)
    }

    /// Lightweight status probe: GET the URL with a short timeout and
    /// return the status plus the full (drained) body.
    pub async fn probe_status(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<(StatusCode, Vec<u8>), Error> {
        let resp = self
            .execute(RequestSpec::new(Method::GET, url).timeout(timeout))
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        Ok((status, body))
    }
}
