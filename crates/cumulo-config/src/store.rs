// ── File-backed account store ──
//
// Bridges TOML profiles to the core `AccountStore` trait. Secrets
// resolve through a chain: environment variable named in the profile,
// then the OS keyring, then the plaintext profile value. Resolved
// secrets are cached; invalidation drops the cache entry and deletes
// the keyring entry so the next resolution starts over.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use cumulo_api::CredentialKind;
use cumulo_core::{AccountRecord, AccountStore, CoreError, ServerVersion};

use crate::{AccountProfile, Config, ConfigError};

const KEYRING_SERVICE: &str = "cumulo";

fn keyring_suffix(kind: CredentialKind) -> Option<&'static str> {
    match kind {
        CredentialKind::Basic => Some("password"),
        CredentialKind::Bearer => Some("token"),
        CredentialKind::SamlSession => Some("session"),
        CredentialKind::None => None,
    }
}

/// `AccountStore` over a loaded [`Config`].
pub struct FileAccountStore {
    config: Config,
    cache: Mutex<HashMap<(String, CredentialKind), SecretString>>,
}

impl FileAccountStore {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load the configuration from the default path and wrap it.
    pub fn from_default_location() -> Result<Self, ConfigError> {
        Ok(Self::new(crate::load_config()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn profile(&self, account: &str) -> Result<&AccountProfile, CoreError> {
        self.config
            .accounts
            .get(account)
            .ok_or_else(|| CoreError::AccountNotFound {
                account: account.to_owned(),
            })
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<(String, CredentialKind), SecretString>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // The keyring lookup is a blocking OS call, so the chain runs on
    // the blocking pool. The cache lock is never held across an await.
    async fn resolve_secret(
        &self,
        account: &str,
        kind: CredentialKind,
        env_name: Option<String>,
        plaintext: Option<String>,
    ) -> Result<SecretString, CoreError> {
        let key = (account.to_owned(), kind);
        {
            if let Some(cached) = self.lock_cache().get(&key) {
                return Ok(cached.clone());
            }
        }

        let owner = account.to_owned();
        let resolved = tokio::task::spawn_blocking(move || {
            resolve_uncached(&owner, kind, env_name.as_deref(), plaintext.as_deref())
        })
        .await
        .map_err(|e| CoreError::Internal(format!("secret resolution task failed: {e}")))?;

        if let Ok(ref secret) = resolved {
            self.lock_cache().insert(key, secret.clone());
        }
        resolved
    }
}

fn resolve_uncached(
    account: &str,
    kind: CredentialKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, CoreError> {
    // 1. Environment variable named in the profile
    if let Some(env_name) = env_name {
        if let Ok(value) = std::env::var(env_name) {
            return Ok(SecretString::from(value));
        }
    }

    // 2. OS keyring
    if let Some(suffix) = keyring_suffix(kind) {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{account}/{suffix}")) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }
    }

    // 3. Plaintext in the profile
    if let Some(value) = plaintext {
        return Ok(SecretString::from(value.to_owned()));
    }

    Err(CoreError::NoCredentials {
        account: account.to_owned(),
    })
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn record(&self, account: &str) -> Result<AccountRecord, CoreError> {
        let profile = self.profile(account)?;
        let base_url = Url::parse(&profile.server).map_err(|source| {
            CoreError::from(ConfigError::InvalidServerUrl {
                account: account.to_owned(),
                source,
            })
        })?;
        let auth_mode = profile.parsed_auth_mode(account)?;
        Ok(AccountRecord {
            account_name: account.to_owned(),
            base_url,
            server_version: profile
                .server_version
                .as_deref()
                .and_then(ServerVersion::parse),
            auth_mode,
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
        })
    }

    async fn password(&self, account: &str) -> Result<SecretString, CoreError> {
        let profile = self.profile(account)?;
        let env_name = profile.password_env.clone();
        let plaintext = profile.password.clone();
        self.resolve_secret(account, CredentialKind::Basic, env_name, plaintext)
            .await
    }

    async fn bearer_token(&self, account: &str) -> Result<SecretString, CoreError> {
        let profile = self.profile(account)?;
        let env_name = profile.token_env.clone();
        let plaintext = profile.token.clone();
        self.resolve_secret(account, CredentialKind::Bearer, env_name, plaintext)
            .await
    }

    async fn saml_session_cookie(&self, account: &str) -> Result<SecretString, CoreError> {
        let profile = self.profile(account)?;
        let env_name = profile.session_cookie_env.clone();
        let plaintext = profile.session_cookie.clone();
        self.resolve_secret(account, CredentialKind::SamlSession, env_name, plaintext)
            .await
    }

    async fn invalidate_token(&self, account: &str, kind: CredentialKind) -> Result<(), CoreError> {
        self.lock_cache().remove(&(account.to_owned(), kind));

        let Some(suffix) = keyring_suffix(kind) else {
            return Ok(());
        };
        let owner = account.to_owned();
        let deletion = tokio::task::spawn_blocking(move || {
            match keyring::Entry::new(KEYRING_SERVICE, &format!("{owner}/{suffix}")) {
                // Absent entries are fine; anything else is reported to
                // the caller as an error string, the chain re-resolves
                // next time regardless.
                Ok(entry) => entry.delete_credential().err().map(|e| e.to_string()),
                Err(err) => Some(err.to_string()),
            }
        })
        .await
        .map_err(|e| CoreError::Internal(format!("keyring task failed: {e}")))?;

        if let Some(err) = deletion {
            debug!(account, ?kind, error = %err, "keyring entry not deleted");
        }
        Ok(())
    }

    async fn current_account(&self) -> Option<String> {
        if let Some(ref account) = self.config.default_account {
            if self.config.accounts.contains_key(account) {
                return Some(account.clone());
            }
        }
        // Fallback: first known account, in stable order.
        self.config.accounts.keys().min().cloned()
    }
}
