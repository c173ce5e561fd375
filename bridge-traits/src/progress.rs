//! Progress Reporting
//!
//! Sink trait through which the core reports upload progress to whatever
//! front end is listening. Implementations must be cheap and non-blocking;
//! they are invoked from async tasks on the hot path.

use std::path::PathBuf;

/// Failure attributed to one file: the unit reported to a progress sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedError {
    pub path: PathBuf,
    pub message: String,
}

impl KeyedError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Progress reporting surface.
///
/// Two sinks are supplied per directory operation: one scoped to the
/// directory, one to individual files.
pub trait ProgressSink: Send + Sync {
    /// Replace the sink's description text (album title, current file path).
    fn update_description(&self, description: &str);

    /// One more item finished successfully.
    fn increment_success(&self);

    /// One item failed; never called twice for the same path in one run.
    fn add_failure(&self, error: KeyedError);

    /// A guarded remote call is backing off before a retry.
    fn on_backoff_delay(&self, delay_ms: u64) {
        let _ = delay_ms;
    }
}
