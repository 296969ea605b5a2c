// cumulo-api: Async WebDAV/HTTP transport client for Nextcloud/ownCloud servers

pub mod client;
pub mod credentials;
pub mod error;
pub mod transport;

pub use client::{DavClient, DavResponse, RequestSpec, MAX_REDIRECTS, USER_AGENT};
pub use credentials::{CredentialKind, Credentials};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
