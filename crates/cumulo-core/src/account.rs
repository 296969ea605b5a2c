// ── Account records and the store collaborator ──
//
// The platform owns account persistence; the core reads records and
// secrets through `AccountStore` and reports token invalidation back.
// `MemoryAccountStore` is the in-process implementation used by
// embedders without a platform store (and by the test suites).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;

use cumulo_api::CredentialKind;

use crate::error::CoreError;
use crate::model::{Server, ServerVersion, User};

/// How an account authenticates against its server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Username/password (or app password) sent as Basic auth.
    Basic,
    /// OAuth2 access token sent as a Bearer header.
    OAuth2,
    /// SAML SSO session cookie sent verbatim.
    SamlSso,
}

/// Persisted metadata for one account. Secrets live elsewhere in the
/// store and are fetched separately.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account_name: String,
    pub base_url: Url,
    pub server_version: Option<ServerVersion>,
    pub auth_mode: AuthMode,
    /// Login name override for Basic auth. When absent, the user part
    /// of the account name is used.
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl AccountRecord {
    /// Derive the immutable [`User`] value for this record.
    pub fn user(&self) -> User {
        let mut server = Server::new(self.base_url.clone());
        server.version = self.server_version;
        let mut user = User::new(&self.account_name, server);
        if let Some(ref name) = self.display_name {
            user = user.with_display_name(name.clone());
        }
        user
    }
}

/// Read and invalidation interface over the platform's account storage.
///
/// Implementations decide where records and secrets live. Lookup
/// failures are `AccountNotFound`; a record that exists but has no
/// secret of the requested kind is `NoCredentials`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn record(&self, account: &str) -> Result<AccountRecord, CoreError>;

    async fn password(&self, account: &str) -> Result<SecretString, CoreError>;

    async fn bearer_token(&self, account: &str) -> Result<SecretString, CoreError>;

    async fn saml_session_cookie(&self, account: &str) -> Result<SecretString, CoreError>;

    /// Mark the stored secret of `kind` for `account` as rejected by the
    /// server, so the next fetch yields a fresh value where the backend
    /// supports re-minting.
    async fn invalidate_token(&self, account: &str, kind: CredentialKind) -> Result<(), CoreError>;

    /// The currently selected account name, if any.
    async fn current_account(&self) -> Option<String>;

    /// Derive the [`User`] for `account`.
    async fn user(&self, account: &str) -> Result<User, CoreError> {
        Ok(self.record(account).await?.user())
    }
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, AccountRecord>,
    passwords: HashMap<String, SecretString>,
    bearer_tokens: HashMap<String, SecretString>,
    saml_cookies: HashMap<String, SecretString>,
    current: Option<String>,
    invalidations: Vec<(String, CredentialKind)>,
}

/// In-process account store.
///
/// Invalidation is recorded but stored secrets remain readable: the
/// embedder is expected to replace a secret out of band (as a platform
/// keystore would re-mint a token), and an unchanged secret simply
/// fails again on the retry.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Secrets are plain values; a poisoned lock only means a writer
        // panicked mid-insert, which leaves the maps usable.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_record(&self, record: AccountRecord) {
        let mut inner = self.lock();
        if inner.current.is_none() {
            inner.current = Some(record.account_name.clone());
        }
        inner.records.insert(record.account_name.clone(), record);
    }

    pub fn set_password(&self, account: &str, password: SecretString) {
        self.lock().passwords.insert(account.to_owned(), password);
    }

    pub fn set_bearer_token(&self, account: &str, token: SecretString) {
        self.lock().bearer_tokens.insert(account.to_owned(), token);
    }

    pub fn set_saml_cookie(&self, account: &str, cookie: SecretString) {
        self.lock().saml_cookies.insert(account.to_owned(), cookie);
    }

    pub fn set_current(&self, account: Option<&str>) {
        self.lock().current = account.map(str::to_owned);
    }

    /// Invalidation events recorded so far, in order.
    pub fn invalidations(&self) -> Vec<(String, CredentialKind)> {
        self.lock().invalidations.clone()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn record(&self, account: &str) -> Result<AccountRecord, CoreError> {
        self.lock()
            .records
            .get(account)
            .cloned()
            .ok_or_else(|| CoreError::AccountNotFound {
                account: account.to_owned(),
            })
    }

    async fn password(&self, account: &str) -> Result<SecretString, CoreError> {
        self.lock()
            .passwords
            .get(account)
            .cloned()
            .ok_or_else(|| CoreError::NoCredentials {
                account: account.to_owned(),
            })
    }

    async fn bearer_token(&self, account: &str) -> Result<SecretString, CoreError> {
        self.lock()
            .bearer_tokens
            .get(account)
            .cloned()
            .ok_or_else(|| CoreError::NoCredentials {
                account: account.to_owned(),
            })
    }

    async fn saml_session_cookie(&self, account: &str) -> Result<SecretString, CoreError> {
        self.lock()
            .saml_cookies
            .get(account)
            .cloned()
            .ok_or_else(|| CoreError::NoCredentials {
                account: account.to_owned(),
            })
    }

    async fn invalidate_token(&self, account: &str, kind: CredentialKind) -> Result<(), CoreError> {
        self.lock().invalidations.push((account.to_owned(), kind));
        Ok(())
    }

    async fn current_account(&self) -> Option<String> {
        self.lock().current.clone()
    }
}
