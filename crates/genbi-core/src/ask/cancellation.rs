//! Cancellation support for ask-operations
//!
//! Starting a new ask while one is streaming cancels the old stream first,
//! so frames of the superseded operation can never write into the new
//! record.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for one ask-operation
#[derive(Clone)]
pub struct AskCancellation {
    token: CancellationToken,
}

impl AskCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel the operation this token belongs to
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token to select on inside the stream drive loop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for AskCancellation {
    fn default() -> Self {
        Self::new()
    }
}
