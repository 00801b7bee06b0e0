//! Error types for the GenBI client
//!
//! Failures the server reports inside the stream are not error values: they
//! fold into the [`ResultRecord`](crate::ask::record::ResultRecord) and end
//! the operation with `RecordStatus::Failed`.

use thiserror::Error;

/// Errors surfaced by the API client and the ask session
#[derive(Debug, Error)]
pub enum GenBiError {
    /// Question or database id was empty; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network-level failure before or during the stream.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The stream closed cleanly without ever emitting a terminal frame.
    #[error("stream ended before a terminal event")]
    Truncated,

    /// The ask-operation was cancelled or superseded by a newer one.
    #[error("ask was cancelled")]
    Cancelled,

    /// Save requested while the session has no completed result to save.
    #[error("cannot save: {0}")]
    SavePrecondition(String),

    /// Knowledge-base save failed; the ask result itself is unaffected.
    #[error("knowledge base save failed: {0}")]
    Save(String),
}
