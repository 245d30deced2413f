//! Fail-open helper for side effects that must not change a delivery result
//!
//! Presentation and other reporting steps run through [`fail_open`]: a
//! failure is logged via `tracing::warn!` and swallowed. Transport decisions
//! never go through here.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Run an operation that should fail open.
///
/// Returns `None` (after logging) when the operation fails.
///
/// ```no_run
/// use fbridge_core::fail_open::fail_open;
/// use fbridge_core::Result;
///
/// async fn show_notice() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let shown = fail_open("present_outcome", || show_notice()).await;
///     // shown is None if show_notice() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
