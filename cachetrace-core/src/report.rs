//! Best-effort policy for store interactions: run the call, log the failure with the
//! call-site context, and let the caller carry on with `None`.

use std::future::Future;

use tracing::error;

use crate::Result;

/// Awaits a fallible store call. Failures are reported and turned into `None`, so a
/// broken store never aborts the business operation around it.
pub(crate) async fn run_and_report<T, F>(context: &'static str, call: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match call.await {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, context, "Store call failed, continuing");
            None
        }
    }
}
