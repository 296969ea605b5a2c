// ── Core error types ──
//
// Domain-facing errors from cumulo-core. Transport failures stay inside
// `cumulo_api::Error`; this type adds the account/credential failure
// modes that happen before any network call is attempted.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Client construction failed before any network call: account
    /// lookup, credential extraction, or token refresh. One exception
    /// type to catch regardless of the underlying cause.
    #[error("Cannot create client for account {account}: {source}")]
    CredentialCreation {
        account: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Account not found: {account}")]
    AccountNotFound { account: String },

    #[error("No stored credentials for account {account}")]
    NoCredentials { account: String },

    #[error("No account is configured")]
    NoAccountConfigured,

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Transport-layer error, wrapped.
    #[error("API error: {0}")]
    Api(#[from] cumulo_api::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap an underlying failure as a credential-creation error for
    /// `account`.
    pub fn credential_creation(account: impl Into<String>, source: CoreError) -> Self {
        Self::CredentialCreation {
            account: account.into(),
            source: Box::new(source),
        }
    }

    /// Returns `true` if this failure happened before any network call.
    pub fn is_credential_creation(&self) -> bool {
        matches!(self, Self::CredentialCreation { .. })
    }
}
