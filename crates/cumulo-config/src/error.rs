use std::path::PathBuf;

use thiserror::Error;

use cumulo_core::CoreError;

/// Errors from configuration loading, saving, and profile resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or merge configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid server URL for account {account}: {source}")]
    InvalidServerUrl {
        account: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unknown auth_mode '{value}' for account {account} (expected 'basic', 'oauth2', or 'saml')")]
    UnknownAuthMode { account: String, value: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}
