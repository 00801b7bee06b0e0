//! The evolving ask result and its reducer
//!
//! One ask-operation owns exactly one `ResultRecord`. Every classified
//! update folds in through [`ResultRecord::apply`], a pure function, so the
//! final state is deterministic and testable independent of any rendering
//! timing. The presentation layer only ever sees cloned snapshots.

use serde::Serialize;

use super::update::{FinalSnapshot, Update};

/// Lifecycle of one ask result
///
/// Transitions only move forward: `Streaming` to `Succeeded` or `Failed`,
/// never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Streaming,
    Succeeded,
    Failed,
}

/// Summary of executing the generated query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub success: bool,
    pub row_count: u64,
    pub elapsed_ms: Option<f64>,
    pub error: Option<String>,
}

/// Generation metadata reported by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordMetadata {
    /// Whether the query was auto-corrected after a failed execution
    pub auto_fixed: bool,
    /// Total generation attempts, counting the first
    pub fix_attempts: u32,
    pub model: Option<String>,
    pub num_schema_docs: Option<u32>,
}

/// The in-progress or completed answer to one natural-language question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub question: String,
    pub database_id: String,
    pub sql: Option<String>,
    pub reasoning: String,
    pub explanation: Option<String>,
    pub answer: Option<String>,
    pub formatted_table: Option<String>,
    pub execution: Option<ExecutionSummary>,
    pub metadata: RecordMetadata,
    pub query_id: Option<String>,
    /// Failure message when no execution context applies (transport errors,
    /// server-side failures before execution)
    pub error: Option<String>,
    /// Transient narration shown while streaming; cleared by explanation,
    /// answer, and final-result updates
    pub current_step: Option<String>,
    pub status: RecordStatus,
}

impl ResultRecord {
    pub fn new(question: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            database_id: database_id.into(),
            sql: None,
            reasoning: String::new(),
            explanation: None,
            answer: None,
            formatted_table: None,
            execution: None,
            metadata: RecordMetadata::default(),
            query_id: None,
            error: None,
            current_step: None,
            status: RecordStatus::Streaming,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != RecordStatus::Streaming
    }

    /// Fold one update into the record
    ///
    /// Terminal records absorb all further updates unchanged, which also
    /// guarantees a failed execution can never flip back to success.
    pub fn apply(mut self, update: Update) -> Self {
        if self.is_terminal() {
            return self;
        }

        match update {
            Update::StepNotice { message } => {
                self.current_step = Some(message);
            }
            Update::ReasoningChunk { text } => {
                self.reasoning.push_str(&text);
            }
            Update::ReasoningFull { text } => {
                self.reasoning = text;
            }
            Update::SqlProduced { sql } => {
                self.sql = Some(sql);
            }
            Update::SqlCorrected { sql, attempts } => {
                self.sql = Some(sql);
                self.metadata.auto_fixed = true;
                self.metadata.fix_attempts = attempts;
            }
            Update::ExplanationProduced { text } => {
                self.explanation = Some(text);
                self.current_step = None;
            }
            Update::AnswerProduced { text } => {
                self.answer = Some(text);
                self.current_step = None;
            }
            Update::ExecutionOutcome {
                row_count,
                elapsed_ms,
                auto_fixed,
                fix_attempts,
            } => {
                self.execution = Some(ExecutionSummary {
                    success: true,
                    row_count,
                    elapsed_ms,
                    error: None,
                });
                if auto_fixed == Some(true) {
                    self.metadata.auto_fixed = true;
                    if let Some(attempts) = fix_attempts {
                        self.metadata.fix_attempts = attempts;
                    }
                }
            }
            Update::ExecutionFailed { message } => {
                self.execution = Some(ExecutionSummary {
                    success: false,
                    row_count: 0,
                    elapsed_ms: None,
                    error: Some(message),
                });
                self.current_step = None;
                self.status = RecordStatus::Failed;
            }
            Update::GenericError { message } => {
                self.execution = Some(ExecutionSummary {
                    success: false,
                    row_count: 0,
                    elapsed_ms: None,
                    error: Some(message.clone()),
                });
                self.error = Some(message);
                self.current_step = None;
                self.status = RecordStatus::Failed;
            }
            Update::FinalResult(snapshot) => {
                self.apply_final(*snapshot);
            }
        }

        self
    }

    /// Overwrite exactly the fields the final snapshot carries; omitted
    /// fields keep their accumulated values
    fn apply_final(&mut self, snapshot: FinalSnapshot) {
        self.query_id = Some(snapshot.query_id);
        if let Some(question) = snapshot.question {
            self.question = question;
        }
        if let Some(sql) = snapshot.sql {
            self.sql = Some(sql);
        }
        if let Some(reasoning) = snapshot.reasoning {
            self.reasoning = reasoning;
        }
        if let Some(explanation) = snapshot.sql_explanation {
            self.explanation = Some(explanation);
        }
        if let Some(answer) = snapshot.natural_language_answer {
            self.answer = Some(answer);
        }
        if let Some(table) = snapshot.formatted_table {
            self.formatted_table = Some(table);
        }
        if let Some(result) = snapshot.execution_result {
            self.execution = Some(ExecutionSummary {
                success: result.success,
                row_count: result.row_count,
                elapsed_ms: result.execution_time_ms,
                error: result.error,
            });
        }
        if let Some(metadata) = snapshot.metadata {
            if let Some(auto_fixed) = metadata.auto_fixed {
                self.metadata.auto_fixed = auto_fixed;
            }
            if let Some(fix_attempts) = metadata.fix_attempts {
                self.metadata.fix_attempts = fix_attempts;
            }
            if metadata.model.is_some() {
                self.metadata.model = metadata.model;
            }
            if metadata.num_schema_docs.is_some() {
                self.metadata.num_schema_docs = metadata.num_schema_docs;
            }
        }
        self.current_step = None;
        self.status = RecordStatus::Succeeded;
    }

    /// Record a failure detected outside the stream payload (transport
    /// errors, truncation)
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        if self.is_terminal() {
            return self;
        }
        self.error = Some(message.into());
        self.current_step = None;
        self.status = RecordStatus::Failed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ask::sse::Frame;
    use crate::ask::update::classify;

    fn update(data: &str) -> Update {
        classify(&Frame {
            event: None,
            data: data.to_string(),
        })
        .expect("payload should classify")
    }

    #[test]
    fn test_reasoning_chunks_append_and_full_replaces() {
        let record = ResultRecord::new("q", "db1")
            .apply(update("{\"chunk\":\"A\"}"))
            .apply(update("{\"chunk\":\"B\"}"));
        assert_eq!(record.reasoning, "AB");

        let record = record.apply(update("{\"reasoning\":\"C\"}"));
        assert_eq!(record.reasoning, "C");
    }

    #[test]
    fn test_successful_stream_scenario() {
        let record = ResultRecord::new("top 10 customers", "db1")
            .apply(update("{\"step\":\"parsing\"}"))
            .apply(update("{\"sql\":\"SELECT ...\"}"))
            .apply(update("{\"row_count\":10,\"execution_time_ms\":12.4}"))
            .apply(update(
                "{\"query_id\":\"q-1\",\"natural_language_answer\":\"...\"}",
            ));

        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.sql.as_deref(), Some("SELECT ..."));
        assert_eq!(record.query_id.as_deref(), Some("q-1"));
        assert!(record.answer.is_some());
        assert_eq!(record.current_step, None);

        let execution = record.execution.expect("execution summary set");
        assert!(execution.success);
        assert_eq!(execution.row_count, 10);
        assert_eq!(execution.elapsed_ms, Some(12.4));
    }

    #[test]
    fn test_auto_fix_scenario() {
        let record = ResultRecord::new("q", "db1")
            .apply(update("{\"sql\":\"SELECT 1\"}"))
            .apply(update("{\"attempts\":2,\"sql\":\"SELECT 1 FIX\"}"));

        assert_eq!(record.sql.as_deref(), Some("SELECT 1 FIX"));
        assert!(record.metadata.auto_fixed);
        assert_eq!(record.metadata.fix_attempts, 2);
    }

    #[test]
    fn test_error_mid_stream_is_terminal_and_absorbing() {
        let record = ResultRecord::new("q", "db1")
            .apply(update("{\"sql\":\"SELECT 1\"}"))
            .apply(update("{\"error\":\"syntax error\"}"))
            // Frames arriving after failure must be ignored, not applied
            .apply(update("{\"sql\":\"SELECT 2\"}"))
            .apply(update("{\"row_count\":5}"));

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.sql.as_deref(), Some("SELECT 1"));
        let execution = record.execution.expect("execution summary set");
        assert!(!execution.success);
        assert_eq!(execution.error.as_deref(), Some("syntax error"));
    }

    #[test]
    fn test_final_result_supersedes_but_keeps_omitted_fields() {
        let record = ResultRecord::new("q", "db1")
            .apply(update("{\"chunk\":\"locally accumulated\"}"))
            .apply(update("{\"sql\":\"SELECT local\"}"))
            .apply(update("{\"query_id\":\"q-9\",\"sql\":\"SELECT authoritative\"}"));

        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.sql.as_deref(), Some("SELECT authoritative"));
        // The snapshot omitted reasoning, so the accumulated text survives
        assert_eq!(record.reasoning, "locally accumulated");
    }

    #[test]
    fn test_final_result_succeeds_regardless_of_prior_state() {
        let record = ResultRecord::new("q", "db1").apply(update(
            "{\"query_id\":\"q-1\",\"execution_result\":{\"success\":true,\"row_count\":3},\
             \"metadata\":{\"model\":\"m1\",\"auto_fixed\":true,\"fix_attempts\":2,\"num_schema_docs\":10}}",
        ));

        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.execution.as_ref().map(|e| e.row_count), Some(3));
        assert!(record.metadata.auto_fixed);
        assert_eq!(record.metadata.fix_attempts, 2);
        assert_eq!(record.metadata.model.as_deref(), Some("m1"));
        assert_eq!(record.metadata.num_schema_docs, Some(10));
    }

    #[test]
    fn test_step_notice_cleared_by_answer_and_explanation() {
        let record = ResultRecord::new("q", "db1").apply(update(
            "{\"step\":\"explanation\",\"message\":\"Generating explanation...\"}",
        ));
        assert_eq!(
            record.current_step.as_deref(),
            Some("Generating explanation...")
        );

        let record = record.apply(update("{\"explanation\":\"it counts rows\"}"));
        assert_eq!(record.current_step, None);

        let record = record
            .apply(update("{\"step\":\"answer\"}"))
            .apply(update("{\"natural_language_answer\":\"42\"}"));
        assert_eq!(record.current_step, None);
        assert_eq!(record.answer.as_deref(), Some("42"));
    }

    #[test]
    fn test_fail_is_noop_on_terminal_record() {
        let record = ResultRecord::new("q", "db1")
            .apply(update("{\"query_id\":\"q-1\"}"))
            .fail("connection lost");
        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_fail_marks_streaming_record_failed() {
        let record = ResultRecord::new("q", "db1").fail("stream ended early");
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("stream ended early"));
    }
}
