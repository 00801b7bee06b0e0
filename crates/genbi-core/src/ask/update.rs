//! Frame payload classification
//!
//! The backend distinguishes update kinds by which fields a payload carries,
//! and several shapes overlap: a corrected query also carries `sql`, a
//! row-count frame may carry auto-fix metadata, and the final snapshot
//! carries nearly everything. Classification therefore checks fields in a
//! fixed precedence order and the first match wins.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::sse::Frame;

/// A classified interpretation of one frame's payload
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Progress narration, display only
    StepNotice { message: String },
    /// Incremental fragment of reasoning text, appended
    ReasoningChunk { text: String },
    /// Complete reasoning string, replaces anything accumulated
    ReasoningFull { text: String },
    /// The generated query
    SqlProduced { sql: String },
    /// A corrected query after one or more failed executions
    SqlCorrected { sql: String, attempts: u32 },
    /// Explanation of the generated query
    ExplanationProduced { text: String },
    /// Natural-language answer to the original question
    AnswerProduced { text: String },
    /// Successful execution summary
    ExecutionOutcome {
        row_count: u64,
        elapsed_ms: Option<f64>,
        auto_fixed: Option<bool>,
        fix_attempts: Option<u32>,
    },
    /// Execution-time failure; terminal
    ExecutionFailed { message: String },
    /// Complete server-side result snapshot; terminal
    FinalResult(Box<FinalSnapshot>),
    /// Catch-all failure signal; terminal
    GenericError { message: String },
}

impl Update {
    /// Whether this update ends the ask-operation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Update::ExecutionFailed { .. } | Update::FinalResult(_) | Update::GenericError { .. }
        )
    }
}

/// The complete result sent with the terminal `complete` frame
///
/// Fields the server omits stay `None` and the locally-accumulated values
/// survive; fields it carries are authoritative.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalSnapshot {
    pub query_id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub sql_explanation: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub execution_result: Option<ExecutionResultWire>,
    #[serde(default)]
    pub natural_language_answer: Option<String>,
    #[serde(default)]
    pub formatted_table: Option<String>,
    #[serde(default)]
    pub metadata: Option<SnapshotMetadata>,
}

/// Wire shape of the server's execution result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecutionResultWire {
    pub success: bool,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub execution_time_ms: Option<f64>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Generation metadata attached to the final snapshot
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_rows: Option<u64>,
    #[serde(default)]
    pub num_schema_docs: Option<u32>,
    #[serde(default)]
    pub fix_attempts: Option<u32>,
    #[serde(default)]
    pub auto_fixed: Option<bool>,
}

/// Classify a frame's payload into an [`Update`]
///
/// Returns `None` for unparseable or unrecognized payloads; a malformed
/// frame is logged and dropped, never failing the stream.
pub fn classify(frame: &Frame) -> Option<Update> {
    let value: Value = match serde_json::from_str(&frame.data) {
        Ok(value) => value,
        Err(err) => {
            warn!("Dropping unparseable frame payload ({err}): {}", frame.data);
            return None;
        }
    };

    // Precedence matters: check the most specific distinguishing field
    // first, since several payload shapes share fields.
    if value.get("query_id").is_some() {
        return match serde_json::from_value::<FinalSnapshot>(value) {
            Ok(snapshot) => Some(Update::FinalResult(Box::new(snapshot))),
            Err(err) => {
                warn!("Dropping malformed final result frame: {err}");
                None
            }
        };
    }

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        // sql_error frames carry the failing statement and attempt count
        let execution_context = value.get("sql").is_some() || value.get("attempts").is_some();
        return Some(if execution_context {
            Update::ExecutionFailed {
                message: message.to_string(),
            }
        } else {
            Update::GenericError {
                message: message.to_string(),
            }
        });
    }

    if let Some(row_count) = value.get("row_count").and_then(Value::as_u64) {
        return Some(Update::ExecutionOutcome {
            row_count,
            elapsed_ms: value.get("execution_time_ms").and_then(Value::as_f64),
            auto_fixed: value.get("auto_fixed").and_then(Value::as_bool),
            fix_attempts: value
                .get("fix_attempts")
                .and_then(Value::as_u64)
                .map(|n| n as u32),
        });
    }

    if let Some(attempts) = value.get("attempts").and_then(Value::as_u64) {
        let sql = value.get("sql").and_then(Value::as_str).unwrap_or_default();
        return Some(Update::SqlCorrected {
            sql: sql.to_string(),
            attempts: attempts as u32,
        });
    }

    if let Some(text) = value.get("explanation").and_then(Value::as_str) {
        return Some(Update::ExplanationProduced {
            text: text.to_string(),
        });
    }

    if let Some(text) = value.get("natural_language_answer").and_then(Value::as_str) {
        return Some(Update::AnswerProduced {
            text: text.to_string(),
        });
    }

    if let Some(sql) = value.get("sql").and_then(Value::as_str) {
        return Some(Update::SqlProduced {
            sql: sql.to_string(),
        });
    }

    if let Some(text) = value.get("reasoning").and_then(Value::as_str) {
        return Some(Update::ReasoningFull {
            text: text.to_string(),
        });
    }

    if let Some(text) = value.get("chunk").and_then(Value::as_str) {
        return Some(Update::ReasoningChunk {
            text: text.to_string(),
        });
    }

    if value.get("step").is_some() {
        // Status frames pair the step id with human-readable narration;
        // fall back to the id when narration is missing.
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.get("step").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        return Some(Update::StepNotice { message });
    }

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        if is_error_indicator(frame, message) {
            return Some(Update::GenericError {
                message: message.to_string(),
            });
        }
    }

    None
}

/// Whether a bare `message` frame signals a failure
fn is_error_indicator(frame: &Frame, message: &str) -> bool {
    if frame.event.as_deref() == Some("error") {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("error") || lower.contains("failed") || lower.contains("not found")
}
