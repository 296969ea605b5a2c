// ── Remote operation protocol ──
//
// Operations encapsulate one logical server interaction and report a
// structured `OperationResult` instead of throwing across the async
// boundary. The runner owns client construction and the bounded
// credential-refresh retry; operations only speak to the `DavClient`
// they are handed.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cumulo_api::DavClient;

use crate::error::CoreError;
use crate::factory::ClientFactory;
use crate::model::User;

/// Terminal classification of an operation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    /// The server rejected the attached credentials (401).
    Unauthorized,
    /// The server redirected to an identity provider instead of
    /// answering; treated like an auth failure for retry purposes.
    IdpRedirection,
    Forbidden,
    NotFound,
    Timeout,
    /// Connection-level failure: DNS, TLS, reset, malformed response.
    Transport,
    /// The client could not be built for the account at all; no request
    /// was sent.
    CredentialCreation,
    Cancelled,
    UnexpectedStatus(u16),
}

/// Structured outcome of one operation, delivered exactly once.
#[derive(Debug)]
pub struct OperationResult<T> {
    pub code: ResultCode,
    pub payload: Option<T>,
    pub source: Option<cumulo_api::Error>,
}

impl<T> OperationResult<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            code: ResultCode::Ok,
            payload: Some(payload),
            source: None,
        }
    }

    pub fn code(code: ResultCode) -> Self {
        Self {
            code,
            payload: None,
            source: None,
        }
    }

    /// Classify an HTTP status the operation did not handle itself.
    pub fn from_status(status: u16) -> Self {
        let code = match status {
            200..=299 => ResultCode::Ok,
            401 => ResultCode::Unauthorized,
            403 => ResultCode::Forbidden,
            404 => ResultCode::NotFound,
            other => ResultCode::UnexpectedStatus(other),
        };
        Self::code(code)
    }

    pub fn cancelled() -> Self {
        Self::code(ResultCode::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Ok
    }

    /// Whether the runner should invalidate the stored credential and
    /// retry once.
    pub fn needs_credential_refresh(&self) -> bool {
        matches!(
            self.code,
            ResultCode::Unauthorized | ResultCode::IdpRedirection
        )
    }
}

impl<T> From<cumulo_api::Error> for OperationResult<T> {
    fn from(err: cumulo_api::Error) -> Self {
        let code = if err.is_timeout() {
            ResultCode::Timeout
        } else if err.is_auth_failure() {
            ResultCode::Unauthorized
        } else if err.is_not_found() {
            ResultCode::NotFound
        } else {
            ResultCode::Transport
        };
        Self {
            code,
            payload: None,
            source: Some(err),
        }
    }
}

/// One logical server interaction.
///
/// `run` performs blocking network work and must only be driven from a
/// worker task (the runner takes care of this on the spawned path).
/// Operations needing retry must be safe to run twice.
pub trait RemoteOperation {
    type Output: Send + 'static;

    fn run(
        &mut self,
        client: &mut DavClient,
    ) -> impl Future<Output = OperationResult<Self::Output>> + Send;
}

/// Retry state for the spawned execution path. One refresh attempt,
/// never more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    RetriedOnce,
}

/// Drives [`RemoteOperation`]s: single synchronous attempts on a
/// caller-owned client, or spawned execution with client construction
/// and a single credential-refresh retry.
#[derive(Clone)]
pub struct OperationRunner {
    factory: Arc<ClientFactory>,
}

impl OperationRunner {
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    /// Run one attempt on a caller-owned client. No retry, no
    /// invalidation.
    pub async fn execute<O: RemoteOperation>(
        &self,
        op: &mut O,
        client: &mut DavClient,
    ) -> OperationResult<O::Output> {
        op.run(client).await
    }

    /// Caller-requested re-execution on the same client. The runner
    /// never invokes this itself; it exists for idempotent operations
    /// the caller wants to re-attempt after fixing state out of band.
    pub async fn retry<O: RemoteOperation>(
        &self,
        op: &mut O,
        client: &mut DavClient,
    ) -> OperationResult<O::Output> {
        op.run(client).await
    }

    /// Build a client for `user` and run one attempt. Client
    /// construction failure becomes a `CredentialCreation` result.
    pub async fn execute_for_user<O: RemoteOperation>(
        &self,
        op: &mut O,
        user: &User,
    ) -> OperationResult<O::Output> {
        let mut client = match self.factory.create_for_user(user).await {
            Ok(client) => client,
            Err(err) => return credential_creation_result(&err),
        };
        op.run(&mut client).await
    }

    /// Spawn `op` on a worker task and return a handle to its terminal
    /// result.
    ///
    /// The worker builds a client for `user`, runs the attempt, and on
    /// an unauthorized or IdP-redirection result with credentials
    /// attached invalidates the matching stored token, rebuilds the
    /// client, and retries exactly once. A second consecutive auth
    /// failure is surfaced as-is.
    pub fn spawn<O>(&self, op: O, user: User) -> OperationHandle<O::Output>
    where
        O: RemoteOperation + Send + 'static,
    {
        let factory = self.factory.clone();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = worker_cancel.cancelled() => {
                    debug!(account = user.account_name(), "operation cancelled");
                }
                result = run_with_retry(factory, op, &user) => {
                    // Receiver may have been dropped; nothing to do then.
                    let _ = tx.send(result);
                }
            }
        });

        OperationHandle { join, rx, cancel }
    }

    /// Spawn `op` on a worker task against a caller-supplied client.
    ///
    /// Single attempt: with no principal bound there is nothing to
    /// invalidate, so no credential-refresh retry happens on this path.
    pub fn spawn_with_client<O>(&self, mut op: O, mut client: DavClient) -> OperationHandle<O::Output>
    where
        O: RemoteOperation + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = worker_cancel.cancelled() => {
                    debug!("operation cancelled");
                }
                result = op.run(&mut client) => {
                    let _ = tx.send(result);
                }
            }
        });

        OperationHandle { join, rx, cancel }
    }
}

fn credential_creation_result<T>(err: &CoreError) -> OperationResult<T> {
    warn!(error = %err, "client construction failed");
    OperationResult::code(ResultCode::CredentialCreation)
}

async fn run_with_retry<O: RemoteOperation>(
    factory: Arc<ClientFactory>,
    mut op: O,
    user: &User,
) -> OperationResult<O::Output> {
    let mut client = match factory.create_for_user(user).await {
        Ok(client) => client,
        Err(err) => return credential_creation_result(&err),
    };

    let mut attempt = Attempt::First;
    loop {
        let result = op.run(&mut client).await;

        let refresh = attempt == Attempt::First
            && result.needs_credential_refresh()
            && !client.credentials().is_none();
        if !refresh {
            return result;
        }

        let account = user.account_name();
        let kind = client.credentials().kind();
        warn!(account, ?kind, code = ?result.code, "credentials rejected, invalidating and retrying");

        if let Err(err) = factory.store().invalidate_token(account, kind).await {
            debug!(account, error = %err, "token invalidation failed");
        }
        client = match factory.create_for_user(user).await {
            Ok(client) => client,
            Err(err) => return credential_creation_result(&err),
        };
        attempt = Attempt::RetriedOnce;
    }
}

/// Handle to a spawned operation.
///
/// The terminal result is delivered exactly once through `result()`.
/// `cancel()` is cooperative and best-effort: the worker stops at the
/// next await point, an in-flight socket read is not interrupted, and
/// after cancellation the handle resolves `Cancelled` with no further
/// delivery.
#[derive(Debug)]
pub struct OperationHandle<T> {
    join: JoinHandle<()>,
    rx: oneshot::Receiver<OperationResult<T>>,
    cancel: CancellationToken,
}

impl<T> OperationHandle<T> {
    /// Request cancellation. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Await the terminal result. Resolves `Cancelled` if the worker
    /// exited without delivering one.
    pub async fn result(self) -> OperationResult<T> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => OperationResult::cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(OperationResult::<()>::from_status(204).code, ResultCode::Ok);
        assert_eq!(
            OperationResult::<()>::from_status(401).code,
            ResultCode::Unauthorized
        );
        assert_eq!(
            OperationResult::<()>::from_status(403).code,
            ResultCode::Forbidden
        );
        assert_eq!(
            OperationResult::<()>::from_status(404).code,
            ResultCode::NotFound
        );
        assert_eq!(
            OperationResult::<()>::from_status(502).code,
            ResultCode::UnexpectedStatus(502)
        );
    }

    #[test]
    fn refresh_only_on_auth_codes() {
        assert!(OperationResult::<()>::code(ResultCode::Unauthorized).needs_credential_refresh());
        assert!(OperationResult::<()>::code(ResultCode::IdpRedirection).needs_credential_refresh());
        assert!(!OperationResult::<()>::code(ResultCode::Forbidden).needs_credential_refresh());
        assert!(!OperationResult::<()>::code(ResultCode::Transport).needs_credential_refresh());
    }
}
