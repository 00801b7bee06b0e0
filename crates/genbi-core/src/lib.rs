//! Core library for the GenBI client
//!
//! The heart of the crate is the streaming ask pipeline in [`ask`]: an SSE
//! frame decoder, a payload classifier, a pure result reducer, and a session
//! controller that drives them against the backend's `/api/v1/ask/stream`
//! endpoint. The [`api`] module is a thin typed client for the plain
//! request/response collaborators (database listing, knowledge base).

pub mod api;
pub mod ask;
pub mod error;

pub use api::types::{DatabaseInfo, KnowledgeBaseInstruction, KnowledgeBaseSqlPair};
pub use api::ApiClient;
pub use ask::record::{ExecutionSummary, RecordStatus, ResultRecord};
pub use ask::session::{AskSession, SessionSnapshot, SessionState};
pub use error::GenBiError;
