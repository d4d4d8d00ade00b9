//! # Detached execution.
//!
//! [`spawn_detached`] starts a unit of work whose lifetime belongs to the host
//! process, not to whichever request happened to trigger it:
//!
//! - it receives a **child of the host token**, never a request token, so a
//!   client disconnect cannot cancel it;
//! - it runs inside a **root span** (`parent: None`), so no request span,
//!   request id or trace identifiers leak into its diagnostics;
//! - dropping the returned [`JoinHandle`] does not stop it.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Spawns `f` as a host-lifetime unit with an explicitly fresh context.
///
/// `f` is called with a child token of `host_token`; cancelling the host token
/// (host shutdown) is the only way the unit is asked to stop.
pub fn spawn_detached<F, Fut, T>(
    unit: &'static str,
    host_token: &CancellationToken,
    f: F,
) -> JoinHandle<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let token = host_token.child_token();
    let span = tracing::info_span!(parent: None, "detached", unit);
    tokio::spawn(f(token).instrument(span))
}
