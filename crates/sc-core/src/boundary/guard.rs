//! Call-site deadlines for bridge calls.
//!
//! The bridge offers no cancellation. A guarded call runs on a helper thread
//! and the caller stops waiting once the deadline passes; the helper is left
//! to finish (or hang) on its own and its late result is dropped.
//!
//! A timed-out helper may still be inside the bridge when the next guarded
//! call starts, so two `Compilable` or `Execute` calls can overlap. The bridge
//! must tolerate that for these two exports. `GetClients` is not guarded
//! here; its callers are serialized by the registry's fetch lock.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{BoundaryCall, BoundaryError};
use crate::logging::event_names;

/// Run `f` and wait at most `timeout` for its result.
///
/// A panic inside `f` is reported as a failed call.
pub fn call_with_timeout<T, F>(
    call: BoundaryCall,
    timeout: Duration,
    f: F,
) -> Result<T, BoundaryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BoundaryError> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name(format!("sc-{}", call))
        .spawn(move || {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(f());
        })
        .map_err(|e| {
            BoundaryError::call_failed(call, format!("failed to spawn call thread: {}", e))
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                target: event_names::BOUNDARY_TIMEOUT,
                call = call.as_str(),
                timeout_ms = timeout.as_millis() as u64,
                "bridge call exceeded its deadline"
            );
            Err(BoundaryError::TimedOut {
                call,
                after: timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(BoundaryError::call_failed(
            call,
            "call aborted before returning",
        )),
    }
}
