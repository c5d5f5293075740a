//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::tails::TailsError;

/// Backoff for tails file uploads.
///
/// - Min delay: 250ms
/// - Max delay: 10s
/// - Retries: `max_attempts - 1` after the first try
/// - Jitter enabled
pub fn upload_backoff(max_attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(max_attempts.saturating_sub(1))
        .with_jitter()
}

/// Determines if a tails upload failure may succeed on retry.
///
/// Retryable:
/// - `Upload`: the server or network refused the transfer
/// - `Io`: transient read failure of the local file
///
/// Non-retryable:
/// - `NotFound`, `InvalidPathComponent`: the local file will not appear
pub fn is_retryable_upload(error: &TailsError) -> bool {
    matches!(error, TailsError::Upload { .. } | TailsError::Io(_))
}
