//! Ask session controller
//!
//! Owns the lifecycle of one streaming ask-operation: validates the inputs,
//! opens the stream, drives decode -> classify -> apply, and publishes an
//! immutable snapshot of the evolving record after every applied update.
//! Decoding and reduction are synchronous; the controller only suspends
//! while awaiting the next transport chunk.

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cancellation::AskCancellation;
use super::record::{RecordStatus, ResultRecord};
use super::sse::FrameDecoder;
use super::update::classify;
use crate::api::types::KnowledgeBaseSqlPair;
use crate::api::ApiClient;
use crate::error::GenBiError;

/// Row cap sent with ask requests unless overridden
pub const DEFAULT_MAX_ROWS: u32 = 100;

/// Controller states for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Succeeded,
    Failed,
}

/// Immutable view handed to the presentation layer
///
/// `record` is `None` only while idle; once streaming starts every snapshot
/// carries the full record so far.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub record: Option<ResultRecord>,
}

/// Drives one ask-operation at a time against the backend
pub struct AskSession {
    client: ApiClient,
    max_rows: u32,
    snapshot: watch::Sender<SessionSnapshot>,
    cancellation: Mutex<AskCancellation>,
}

impl AskSession {
    pub fn new(client: ApiClient) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot {
            state: SessionState::Idle,
            record: None,
        });
        Self {
            client,
            max_rows: DEFAULT_MAX_ROWS,
            snapshot,
            cancellation: Mutex::new(AskCancellation::new()),
        }
    }

    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Watch the live snapshot; a new value is published after every
    /// applied update
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Ask a question, streaming progress into the session snapshot
    ///
    /// Fails fast with a validation error before any network activity when
    /// either input is empty. Any ask still in flight is cancelled first.
    /// Server-reported failures are folded into the returned record
    /// (`RecordStatus::Failed`); transport failures and truncation are
    /// returned as errors after the failed record has been published.
    pub async fn ask(
        &self,
        question: &str,
        database_id: &str,
    ) -> Result<ResultRecord, GenBiError> {
        let question = question.trim();
        let database_id = database_id.trim();
        if question.is_empty() {
            return Err(GenBiError::Validation("question must not be empty".into()));
        }
        if database_id.is_empty() {
            return Err(GenBiError::Validation(
                "database id must not be empty".into(),
            ));
        }

        // Swap in a fresh token; a previous in-flight stream observes the
        // cancel and stops publishing before our first snapshot goes out.
        let cancellation = {
            let mut current = self.cancellation.lock();
            current.cancel();
            *current = AskCancellation::new();
            current.clone()
        };

        let record = ResultRecord::new(question, database_id);
        self.publish(record.clone(), &cancellation);

        info!("Starting ask stream for database {database_id}");
        self.drive(record, &cancellation).await
    }

    /// Cancel the in-flight ask, if any, returning the session to idle
    pub fn cancel(&self) {
        let current = self.cancellation.lock();
        if self.snapshot.borrow().state != SessionState::Streaming {
            return;
        }
        current.cancel();
        self.snapshot.send_replace(SessionSnapshot {
            state: SessionState::Idle,
            record: None,
        });
        info!("Ask session cancelled");
    }

    /// Save the completed question/SQL pair to the knowledge base
    ///
    /// Only valid once the session has succeeded with both a question and
    /// generated SQL; rejected without a network call otherwise. Failures
    /// here never touch the ask record.
    pub async fn save_to_knowledge_base(
        &self,
        description: Option<&str>,
    ) -> Result<KnowledgeBaseSqlPair, GenBiError> {
        let (database_id, question, sql) = {
            let snapshot = self.snapshot.borrow();
            if snapshot.state != SessionState::Succeeded {
                return Err(GenBiError::SavePrecondition(
                    "no completed result to save".into(),
                ));
            }
            let record = snapshot.record.as_ref().ok_or_else(|| {
                GenBiError::SavePrecondition("no completed result to save".into())
            })?;
            let sql = record
                .sql
                .clone()
                .filter(|sql| !sql.is_empty())
                .ok_or_else(|| GenBiError::SavePrecondition("result has no SQL".into()))?;
            if record.question.is_empty() {
                return Err(GenBiError::SavePrecondition("result has no question".into()));
            }
            (record.database_id.clone(), record.question.clone(), sql)
        };

        self.client
            .add_sql_pair(&database_id, &question, &sql, description)
            .await
            .map_err(|err| GenBiError::Save(err.to_string()))
    }

    async fn drive(
        &self,
        mut record: ResultRecord,
        cancellation: &AskCancellation,
    ) -> Result<ResultRecord, GenBiError> {
        let body = serde_json::json!({
            "question": record.question,
            "database_id": record.database_id,
            "max_rows": self.max_rows,
        });

        let response = match self
            .client
            .post("/api/v1/ask/stream")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                record = record.fail(format!("request failed: {err}"));
                self.publish(record, cancellation);
                return Err(GenBiError::Transport(err));
            }
        };
        let response = match self.client.handle_error_response(response).await {
            Ok(response) => response,
            Err(err) => {
                record = record.fail(err.to_string());
                self.publish(record, cancellation);
                return Err(err);
            }
        };

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let token = cancellation.token();

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => {
                    // Dropping the stream releases the transport; frames
                    // already in flight are discarded, not applied.
                    info!("Ask stream cancelled");
                    return Err(GenBiError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(err)) => {
                    warn!("Ask stream transport failure: {err}");
                    record = record.fail(format!("connection lost: {err}"));
                    self.publish(record, cancellation);
                    return Err(GenBiError::Transport(err));
                }
                None => break,
            };

            for frame in decoder.push(&bytes) {
                let Some(update) = classify(&frame) else {
                    continue;
                };
                debug!("Applying update: {update:?}");
                record = record.apply(update);
                self.publish(record.clone(), cancellation);
            }

            if record.is_terminal() {
                break;
            }
        }

        if !record.is_terminal() {
            // A clean close without a terminal frame is a failure, never a
            // silent success on partial state.
            warn!("Ask stream ended without a terminal frame");
            record = record.fail("stream ended before a terminal event");
            self.publish(record, cancellation);
            return Err(GenBiError::Truncated);
        }

        Ok(record)
    }

    /// Publish a snapshot unless this operation has been superseded
    fn publish(&self, record: ResultRecord, cancellation: &AskCancellation) {
        if cancellation.is_cancelled() {
            return;
        }
        let state = match record.status {
            RecordStatus::Streaming => SessionState::Streaming,
            RecordStatus::Succeeded => SessionState::Succeeded,
            RecordStatus::Failed => SessionState::Failed,
        };
        self.snapshot.send_replace(SessionSnapshot {
            state,
            record: Some(record),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Backend stub: serves one canned SSE body, then exits
    fn spawn_stream_server(body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body).with_header(
                    "Content-Type: text/event-stream"
                        .parse::<tiny_http::Header>()
                        .unwrap(),
                );
                let _ = request.respond(response);
            }
        });
        format!("http://{addr}")
    }

    fn session(base_url: &str) -> AskSession {
        AskSession::new(ApiClient::new(base_url).unwrap())
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_before_any_network_call() {
        // Unroutable address: reaching the network would fail differently
        let session = session("http://127.0.0.1:1");

        let err = session.ask("  ", "db1").await.unwrap_err();
        assert!(matches!(err, GenBiError::Validation(_)));

        let err = session.ask("question", "").await.unwrap_err();
        assert!(matches!(err, GenBiError::Validation(_)));

        assert_eq!(session.snapshot().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_save_rejected_without_completed_result() {
        let session = session("http://127.0.0.1:1");
        let err = session.save_to_knowledge_base(None).await.unwrap_err();
        assert!(matches!(err, GenBiError::SavePrecondition(_)));
    }

    #[tokio::test]
    async fn test_new_ask_cancels_previous_operation() {
        let session = session("http://127.0.0.1:1");
        let first = session.cancellation.lock().clone();
        // Connection refused; irrelevant here, the token swap happens first
        let _ = session.ask("question", "db1").await;
        assert!(first.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_is_noop_while_idle() {
        let session = session("http://127.0.0.1:1");
        session.cancel();
        assert_eq!(session.snapshot().state, SessionState::Idle);
        assert!(!session.cancellation.lock().is_cancelled());
    }

    #[tokio::test]
    async fn test_ask_folds_stream_to_success() {
        let body = concat!(
            "event: status\n",
            "data: {\"step\":\"parsing\",\"message\":\"Analyzing your question...\"}\n\n",
            "event: sql_generated\n",
            "data: {\"sql\":\"SELECT name FROM customers LIMIT 10\"}\n\n",
            "event: sql_success\n",
            "data: {\"row_count\":10,\"execution_time_ms\":12.4}\n\n",
            "event: complete\n",
            "data: {\"query_id\":\"q-1\",\"natural_language_answer\":\"Your top ten customers.\"}\n\n",
        );
        let session = session(&spawn_stream_server(body));

        let record = session.ask("top 10 customers", "db1").await.unwrap();

        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(
            record.sql.as_deref(),
            Some("SELECT name FROM customers LIMIT 10")
        );
        assert_eq!(record.query_id.as_deref(), Some("q-1"));
        assert_eq!(record.answer.as_deref(), Some("Your top ten customers."));
        let execution = record.execution.expect("execution summary set");
        assert!(execution.success);
        assert_eq!(execution.row_count, 10);

        assert_eq!(session.snapshot().state, SessionState::Succeeded);
    }

    #[tokio::test]
    async fn test_server_error_folds_into_failed_record() {
        let body = concat!(
            "data: {\"sql\":\"SELECT 1\"}\n\n",
            "data: {\"error\":\"syntax error\"}\n\n",
            // Must be discarded: the record is already terminal
            "data: {\"sql\":\"SELECT 2\"}\n\n",
        );
        let session = session(&spawn_stream_server(body));

        let record = session.ask("question", "db1").await.unwrap();

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.sql.as_deref(), Some("SELECT 1"));
        assert_eq!(record.error.as_deref(), Some("syntax error"));
        assert_eq!(session.snapshot().state, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_truncated_stream_fails() {
        let body = concat!(
            "data: {\"step\":\"parsing\"}\n\n",
            "data: {\"sql\":\"SELECT 1\"}\n\n",
        );
        let session = session(&spawn_stream_server(body));

        let err = session.ask("question", "db1").await.unwrap_err();
        assert!(matches!(err, GenBiError::Truncated));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Failed);
        let record = snapshot.record.expect("failed record published");
        assert_eq!(record.sql.as_deref(), Some("SELECT 1"));
        assert!(record.error.is_some());
    }

    #[tokio::test]
    async fn test_snapshots_published_while_streaming() {
        let body = concat!(
            "data: {\"step\":\"parsing\",\"message\":\"Analyzing...\"}\n\n",
            "data: {\"chunk\":\"thinking\"}\n\n",
            "data: {\"query_id\":\"q-1\"}\n\n",
        );
        let session = session(&spawn_stream_server(body));
        let mut updates = session.subscribe();

        let record = session.ask("question", "db1").await.unwrap();
        assert_eq!(record.reasoning, "thinking");

        // The receiver observes at least the terminal snapshot
        assert!(updates.has_changed().unwrap());
        let last = updates.borrow_and_update().clone();
        assert_eq!(last.state, SessionState::Succeeded);
    }

    #[tokio::test]
    async fn test_http_error_status_fails_the_session() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response =
                    tiny_http::Response::from_string("database not found").with_status_code(404);
                let _ = request.respond(response);
            }
        });
        let session = session(&format!("http://{addr}"));

        let err = session.ask("question", "missing-db").await.unwrap_err();
        match err {
            GenBiError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "database not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(session.snapshot().state, SessionState::Failed);
    }
}
