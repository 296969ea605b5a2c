use thiserror::Error;

/// Top-level error type for the `cumulo-api` crate.
///
/// Covers the transport-level failure modes: TLS/connection setup,
/// request dispatch, redirect handling, and authentication rejection.
/// `cumulo-core` maps these into its structured operation results.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Authentication ──────────────────────────────────────────────
    /// Server rejected the request credentials (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // ── Redirects ───────────────────────────────────────────────────
    /// More redirects were requested than the bound allows.
    /// Treated as a not-found-class terminal failure, never a loop.
    #[error("Redirect limit exceeded after {hops} hops")]
    RedirectLimitExceeded { hops: u32 },

    /// A redirect status arrived without a `Location` header.
    #[error("Redirect response (HTTP {status}) carried no Location header")]
    RedirectWithoutLocation { status: u16 },
}

impl Error {
    /// Returns `true` if this error should surface as a "not found"
    /// class result. Exhausted or malformed redirect chains map here.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::RedirectLimitExceeded { .. } | Self::RedirectWithoutLocation { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if this error indicates rejected credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` if the request timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying
    /// at a higher layer (connection failures, timeouts).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
