//! Streaming ask pipeline
//!
//! One ask-operation streams progress frames from `/api/v1/ask/stream` and
//! folds them into a single evolving [`record::ResultRecord`]:
//!
//! - [`sse`] decodes raw transport chunks into discrete frames,
//!   independent of chunk boundaries
//! - [`update`] classifies each frame payload into exactly one update kind
//! - [`record`] applies updates through a pure reducer
//! - [`session`] owns the stream lifecycle and publishes snapshots

pub mod cancellation;
pub mod record;
pub mod session;
pub mod sse;
pub mod update;
