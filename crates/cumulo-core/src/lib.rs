//! Domain layer between `cumulo-api` and embedding applications.
//!
//! This crate owns the account model and the execution machinery for
//! remote operations against a sync server:
//!
//! - **[`AccountStore`]** — Collaborator trait over the platform's
//!   persisted account records; the core reads metadata and invalidates
//!   tokens but never defines the storage format. [`MemoryAccountStore`]
//!   is an embeddable in-process implementation.
//!
//! - **[`ClientFactory`]** — Turns a [`User`] (or a bare URL) into a
//!   configured [`DavClient`](cumulo_api::DavClient) with the right
//!   credential kind attached: Basic, OAuth2 bearer, or SAML session.
//!
//! - **[`OperationRunner`]** / **[`RemoteOperation`]** — The execution
//!   protocol: synchronous single attempts, create-then-run convenience,
//!   and a spawned asynchronous path that invalidates credentials and
//!   retries exactly once on an unauthorized or IdP-redirection result.
//!   Results are structured [`OperationResult`] values delivered exactly
//!   once through an [`OperationHandle`].
//!
//! - **[`ConnectivityService`]** — Process-wide network snapshot (fed by
//!   the platform through a watch channel) plus the walled-network probe:
//!   `GET {server}/index.php/204` expecting an empty 204, with a
//!   mutex-guarded time-windowed verdict cache.

pub mod account;
pub mod connectivity;
pub mod error;
pub mod factory;
pub mod model;
pub mod operation;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::{AccountRecord, AccountStore, AuthMode, MemoryAccountStore};
pub use connectivity::{
    Connectivity, ConnectivityService, NetworkStateHandle, TransportKind, network_state_channel,
};
pub use error::CoreError;
pub use factory::ClientFactory;
pub use model::{Server, ServerVersion, User};
pub use operation::{
    OperationHandle, OperationResult, OperationRunner, RemoteOperation, ResultCode,
};
