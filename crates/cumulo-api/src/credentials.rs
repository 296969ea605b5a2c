use secrecy::SecretString;

/// Which credential kind is active, without the secret material.
///
/// Marker enum (no data) -- the actual secrets live in [`Credentials`].
/// Used for branching on invalidation without carrying secret material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// No credentials attached (anonymous client).
    None,
    /// Username/password, sent preemptively as Basic auth.
    Basic,
    /// OAuth2 bearer token.
    Bearer,
    /// SAML SSO session cookie, sent as a literal `Cookie` header.
    SamlSession,
}

/// Credentials for authenticating with a sync server.
///
/// Exactly one variant is active per client instance at a time: the
/// client holds a single `Credentials` slot, so setting a new kind
/// structurally clears the others.
#[derive(Clone)]
pub enum Credentials {
    /// No credentials (anonymous/plain access).
    None,

    /// Basic username/password auth, applied preemptively on every request.
    Basic {
        username: String,
        password: SecretString,
    },

    /// OAuth2 bearer token, sent via the `Authorization: Bearer` header.
    Bearer { token: SecretString },

    /// SAML SSO session cookie. Cookie-store handling is disabled for this
    /// mode; the session token is attached verbatim as a `Cookie` header.
    SamlSession { cookie: SecretString },
}

impl Credentials {
    /// The kind marker for this credential, secret-free.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::None => CredentialKind::None,
            Self::Basic { .. } => CredentialKind::Basic,
            Self::Bearer { .. } => CredentialKind::Bearer,
            Self::SamlSession { .. } => CredentialKind::SamlSession,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// Manual Debug so secret material never leaks into logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "Credentials::None"),
            Self::Basic { username, .. } => f
                .debug_struct("Credentials::Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer { .. } => write!(f, "Credentials::Bearer {{ .. }}"),
            Self::SamlSession { .. } => write!(f, "Credentials::SamlSession {{ .. }}"),
        }
    }
}
