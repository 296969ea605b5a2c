// ── User and server value types ──
//
// Immutable values derived on demand from persisted account records.
// `User` identifies an authenticated principal tied to one server; the
// anonymous variant is a null-object for when no account is configured.

use url::Url;

/// Server version as a semantic triple (e.g. `"29.0.4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Lenient parse: missing minor/patch components default to zero,
    /// anything non-numeric yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A sync server: base URI plus (when known) its reported version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub base_url: Url,
    pub version: Option<ServerVersion>,
}

impl Server {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            version: None,
        }
    }

    pub fn with_version(mut self, version: ServerVersion) -> Self {
        self.version = Some(version);
        self
    }
}

/// An authenticated principal tied to one server.
///
/// Account names follow the `user@host` convention. The value is
/// immutable once constructed; it is re-derived from the account store
/// when records change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    account_name: String,
    display_name: Option<String>,
    server: Option<Server>,
}

impl User {
    pub fn new(account_name: impl Into<String>, server: Server) -> Self {
        Self {
            account_name: account_name.into(),
            display_name: None,
            server: Some(server),
        }
    }

    /// Null-object for "no account configured". Has no server and an
    /// empty account name; the factory refuses to build a client for it.
    pub fn anonymous() -> Self {
        Self {
            account_name: String::new(),
            display_name: None,
            server: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.account_name.is_empty()
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    /// The login name: the account name with the domain suffix after
    /// the last `@` stripped (`alice@cloud.example.com` -> `alice`).
    pub fn login_name(&self) -> &str {
        self.account_name
            .rsplit_once('@')
            .map_or(self.account_name.as_str(), |(name, _)| name)
    }
}
