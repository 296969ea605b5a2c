//! Configuration layer for cumulo: TOML account profiles, layered
//! loading (defaults, file, environment), secret resolution through the
//! OS keyring, and [`FileAccountStore`], the config-backed
//! `AccountStore` implementation.
//!
//! Core never reads these types directly -- it talks to the store trait
//! and receives pre-built transport settings.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use cumulo_api::{TlsMode, TransportConfig};
use cumulo_core::AuthMode;

pub mod error;
pub mod store;

pub use error::ConfigError;
pub use store::FileAccountStore;

// ── TOML config structs ──────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Account used when the embedder does not pick one explicitly.
    pub default_account: Option<String>,

    /// Named account profiles, keyed by account name (`user@host`).
    #[serde(default)]
    pub accounts: HashMap<String, AccountProfile>,
}

/// One account profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountProfile {
    /// Server base URL (e.g., "https://cloud.example.com").
    pub server: String,

    /// Last known server version ("29.0.4"); informational.
    pub server_version: Option<String>,

    /// Auth mode: "basic", "oauth2", or "saml".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Login name override; defaults to the account name's user part.
    pub username: Option<String>,

    pub display_name: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// OAuth2 token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the OAuth2 token.
    pub token_env: Option<String>,

    /// SAML session cookie, sent verbatim.
    pub session_cookie: Option<String>,

    /// Environment variable name containing the session cookie.
    pub session_cookie_env: Option<String>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Request timeout override, in seconds.
    pub timeout: Option<u64>,
}

fn default_auth_mode() -> String {
    "basic".into()
}

impl AccountProfile {
    /// Parse the profile's `auth_mode` string.
    pub fn parsed_auth_mode(&self, account: &str) -> Result<AuthMode, ConfigError> {
        match self.auth_mode.as_str() {
            "basic" => Ok(AuthMode::Basic),
            "oauth2" => Ok(AuthMode::OAuth2),
            "saml" => Ok(AuthMode::SamlSso),
            other => Err(ConfigError::UnknownAuthMode {
                account: account.to_owned(),
                value: other.to_owned(),
            }),
        }
    }

    /// Translate TLS and timeout settings into a [`TransportConfig`].
    pub fn transport(&self) -> TransportConfig {
        let mut transport = TransportConfig::default();
        transport.tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        if let Some(secs) = self.timeout {
            transport.request_timeout = Duration::from_secs(secs);
        }
        transport
    }
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "cumulo", "cumulo")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cumulo");
    p
}

// ── Config loading / saving ──────────────────────────────────────────

/// Load the configuration from the default path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the configuration from an explicit file path. Layering order:
/// built-in defaults, then the TOML file, then `CUMULO_`-prefixed
/// environment variables. Nesting in env names uses a double
/// underscore (`CUMULO_ACCOUNTS__<name>__SERVER`) so field names
/// containing a single underscore (`default_account`, `auth_mode`)
/// stay addressable.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CUMULO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Persist the configuration to the default path, creating parent
/// directories as needed.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &std::path::Path, config: &Config) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, rendered).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        default_account = "alice@cloud.example.com"

        [accounts."alice@cloud.example.com"]
        server = "https://cloud.example.com"
        server_version = "29.0.4"
        auth_mode = "basic"
        display_name = "Alice"
        password = "hunter2"
        timeout = 15

        [accounts."bob@other.example.org"]
        server = "https://other.example.org/cloud"
        auth_mode = "oauth2"
        token_env = "BOB_TOKEN"
        insecure = true
    "#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(
            config.default_account.as_deref(),
            Some("alice@cloud.example.com")
        );
        assert_eq!(config.accounts.len(), 2);

        let alice = &config.accounts["alice@cloud.example.com"];
        assert_eq!(alice.server, "https://cloud.example.com");
        assert_eq!(alice.password.as_deref(), Some("hunter2"));
        assert_eq!(alice.timeout, Some(15));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert!(config.default_account.is_none());
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn auth_mode_parses_or_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        let alice = &config.accounts["alice@cloud.example.com"];
        assert_eq!(alice.parsed_auth_mode("alice").unwrap(), AuthMode::Basic);

        let bob = &config.accounts["bob@other.example.org"];
        assert_eq!(bob.parsed_auth_mode("bob").unwrap(), AuthMode::OAuth2);

        let mut broken = alice.clone();
        broken.auth_mode = "ntlm".into();
        assert!(matches!(
            broken.parsed_auth_mode("alice"),
            Err(ConfigError::UnknownAuthMode { .. })
        ));
    }

    #[test]
    fn transport_reflects_tls_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        let alice = config.accounts["alice@cloud.example.com"].transport();
        assert_eq!(alice.tls, TlsMode::System);
        assert_eq!(alice.request_timeout, Duration::from_secs(15));

        let bob = config.accounts["bob@other.example.org"].transport();
        assert_eq!(bob.tls, TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("CUMULO_DEFAULT_ACCOUNT", "bob@other.example.org");

            let config = load_config_from(std::path::Path::new("config.toml")).unwrap();
            assert_eq!(
                config.default_account.as_deref(),
                Some("bob@other.example.org")
            );
            // File-provided profiles survive the env layer.
            assert_eq!(config.accounts.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn save_writes_loadable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir)).unwrap();

        let out = dir.path().join("nested/out.toml");
        save_config_to(&out, &config).unwrap();

        let reloaded = load_config_from(&out).unwrap();
        assert_eq!(reloaded.accounts.len(), 2);
        assert_eq!(reloaded.default_account, config.default_account);
    }
}
