// ── Client factory ──
//
// Turns a user (or a bare URL) into a configured `DavClient` with the
// right credential kind attached. Every failure on this path, from
// account lookup to secret retrieval, is wrapped in one
// `CredentialCreation` error so callers can catch client-construction
// problems with a single arm.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use cumulo_api::{DavClient, TransportConfig};

use crate::account::{AccountStore, AuthMode};
use crate::error::CoreError;
use crate::model::User;

/// Builds authenticated [`DavClient`]s from account records.
///
/// The transport configuration is shared by every client the factory
/// produces; it is injected at construction rather than read from any
/// global.
pub struct ClientFactory {
    store: Arc<dyn AccountStore>,
    transport: TransportConfig,
}

impl ClientFactory {
    pub fn new(store: Arc<dyn AccountStore>, transport: TransportConfig) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Build a client for `user` with that account's credentials
    /// attached.
    ///
    /// Fails with [`CoreError::CredentialCreation`] for the anonymous
    /// user, an unknown account, a missing secret, or a transport setup
    /// problem.
    pub async fn create_for_user(&self, user: &User) -> Result<DavClient, CoreError> {
        if user.is_anonymous() {
            return Err(CoreError::credential_creation(
                user.account_name(),
                CoreError::NoAccountConfigured,
            ));
        }
        let account = user.account_name();

        let record = self
            .store
            .record(account)
            .await
            .map_err(|e| CoreError::credential_creation(account, e))?;

        let mut client = DavClient::new(record.base_url.clone(), &self.transport)
            .map_err(|e| CoreError::credential_creation(account, CoreError::Api(e)))?;

        match record.auth_mode {
            AuthMode::Basic => {
                let password = self
                    .store
                    .password(account)
                    .await
                    .map_err(|e| CoreError::credential_creation(account, e))?;
                let login = record.username.as_deref().unwrap_or_else(|| user.login_name());
                client.set_basic_credentials(login, password);
            }
            AuthMode::OAuth2 => {
                let token = self
                    .store
                    .bearer_token(account)
                    .await
                    .map_err(|e| CoreError::credential_creation(account, e))?;
                client.set_bearer_credentials(token);
            }
            AuthMode::SamlSso => {
                let cookie = self
                    .store
                    .saml_session_cookie(account)
                    .await
                    .map_err(|e| CoreError::credential_creation(account, e))?;
                client.set_saml_session_cookie(cookie);
            }
        }

        debug!(account, auth = ?record.auth_mode, "built client");
        Ok(client)
    }

    /// Build an unauthenticated client for `base_url`, used by probes
    /// and pre-login endpoints.
    pub fn create_anonymous(
        &self,
        base_url: Url,
        follow_redirects: bool,
    ) -> Result<DavClient, CoreError> {
        let mut client = DavClient::new(base_url, &self.transport).map_err(CoreError::Api)?;
        client.set_follow_redirects(follow_redirects);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::account::{AccountRecord, MemoryAccountStore};
    use cumulo_api::CredentialKind;
    use secrecy::SecretString;

    fn factory_with(auth_mode: AuthMode) -> (Arc<MemoryAccountStore>, ClientFactory) {
        let store = Arc::new(MemoryAccountStore::new());
        store.add_record(AccountRecord {
            account_name: "alice@cloud.example.com".to_owned(),
            base_url: Url::parse("https://cloud.example.com").unwrap(),
            server_version: None,
            auth_mode,
            username: None,
            display_name: None,
        });
        let factory = ClientFactory::new(store.clone(), TransportConfig::default());
        (store, factory)
    }

    #[tokio::test]
    async fn anonymous_user_is_refused() {
        let (_, factory) = factory_with(AuthMode::Basic);
        let err = factory.create_for_user(&User::anonymous()).await.unwrap_err();
        assert!(err.is_credential_creation());
    }

    #[tokio::test]
    async fn unknown_account_wraps_as_credential_creation() {
        let (store, factory) = factory_with(AuthMode::Basic);
        let user = store.user("alice@cloud.example.com").await.unwrap();
        store.set_current(None);

        let stranger = User::new("mallory@cloud.example.com", user.server().unwrap().clone());
        let err = factory.create_for_user(&stranger).await.unwrap_err();
        assert!(err.is_credential_creation());
    }

    #[tokio::test]
    async fn basic_account_gets_basic_credentials() {
        let (store, factory) = factory_with(AuthMode::Basic);
        store.set_password("alice@cloud.example.com", SecretString::from("pw".to_owned()));

        let user = store.user("alice@cloud.example.com").await.unwrap();
        let client = factory.create_for_user(&user).await.unwrap();
        assert_eq!(client.credentials().kind(), CredentialKind::Basic);
    }

    #[tokio::test]
    async fn username_override_replaces_the_derived_login() {
        let store = Arc::new(MemoryAccountStore::new());
        store.add_record(AccountRecord {
            account_name: "alice@cloud.example.com".to_owned(),
            base_url: Url::parse("https://cloud.example.com").unwrap(),
            server_version: None,
            auth_mode: AuthMode::Basic,
            username: Some("real-login".to_owned()),
            display_name: None,
        });
        store.set_password("alice@cloud.example.com", SecretString::from("pw".to_owned()));
        let factory = ClientFactory::new(store.clone(), TransportConfig::default());

        let user = store.user("alice@cloud.example.com").await.unwrap();
        let client = factory.create_for_user(&user).await.unwrap();
        match client.credentials() {
            cumulo_api::Credentials::Basic { username, .. } => {
                assert_eq!(username, "real-login");
            }
            other => panic!("expected Basic credentials, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_secret_wraps_as_credential_creation() {
        let (store, factory) = factory_with(AuthMode::OAuth2);
        let user = store.user("alice@cloud.example.com").await.unwrap();
        let err = factory.create_for_user(&user).await.unwrap_err();
        assert!(err.is_credential_creation());
    }

    #[tokio::test]
    async fn saml_account_gets_session_cookie() {
        let (store, factory) = factory_with(AuthMode::SamlSso);
        store.set_saml_cookie(
            "alice@cloud.example.com",
            SecretString::from("oc_session=abc".to_owned()),
        );

        let user = store.user("alice@cloud.example.com").await.unwrap();
        let client = factory.create_for_user(&user).await.unwrap();
        assert_eq!(client.credentials().kind(), CredentialKind::SamlSession);
    }

    #[tokio::test]
    async fn anonymous_client_has_no_credentials() {
        let (_, factory) = factory_with(AuthMode::Basic);
        let client = factory
            .create_anonymous(Url::parse("https://cloud.example.com").unwrap(), false)
            .unwrap();
        assert!(client.credentials().is_none());
        assert!(!client.follow_redirects());
    }
}
