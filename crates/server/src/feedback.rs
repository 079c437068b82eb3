use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use intune_agent::error_response;
use intune_core::domain::feedback::{FeedbackRecord, FeedbackSubmission};
use intune_core::InterfaceError;
use serde::Serialize;
use tracing::{debug, info};

pub const FEEDBACK_LOG_TARGET: &str = "intune_server::feedback";

/// Structured sink for feedback records. Constructed once at startup and
/// shared by every request.
pub trait FeedbackSink: Send + Sync {
    fn emit(&self, record: &FeedbackRecord);
}

/// Writes each record as one INFO event on the feedback target, tagged
/// with the logger name it is bound to. Every record field is a typed
/// event field; `text` is omitted when the client sent `null`.
pub struct TracingFeedbackSink {
    logger: String,
}

impl TracingFeedbackSink {
    pub fn new(logger: impl Into<String>) -> Self {
        Self { logger: logger.into() }
    }
}

impl FeedbackSink for TracingFeedbackSink {
    fn emit(&self, record: &FeedbackRecord) {
        info!(
            target: FEEDBACK_LOG_TARGET,
            event_name = "service.feedback.received",
            logger = %self.logger,
            log_type = record.log_type,
            service_name = %record.service_name,
            invocation_id = %record.invocation_id,
            user_id = %record.user_id,
            score = record.score.as_f64(),
            text = record.text.as_deref(),
            "feedback received"
        );
    }
}

#[derive(Clone)]
pub struct FeedbackState {
    sink: Arc<dyn FeedbackSink>,
    service_name: Arc<str>,
}

impl FeedbackState {
    pub fn new(sink: Arc<dyn FeedbackSink>, service_name: &str) -> Self {
        Self { sink, service_name: Arc::from(service_name) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackAck {
    pub status: &'static str,
}

pub fn router(state: FeedbackState) -> Router {
    Router::new().route("/feedback", post(collect_feedback)).with_state(state)
}

/// Decodes the body as JSON whatever the declared content type. Syntax and
/// schema failures both answer 422 with a `detail` message.
pub async fn collect_feedback(State(state): State<FeedbackState>, body: Bytes) -> Response {
    let submission = match serde_json::from_slice::<FeedbackSubmission>(&body) {
        Ok(submission) => submission,
        Err(error) => {
            debug!(
                event_name = "service.feedback.rejected",
                category = ?error.classify(),
                "feedback payload rejected"
            );
            return error_response(InterfaceError::Unprocessable {
                message: format!("invalid feedback payload: {error}"),
            });
        }
    };

    let record = match submission.into_record(&state.service_name) {
        Ok(record) => record,
        Err(error) => return error_response(error.into()),
    };

    state.sink.emit(&record);
    (StatusCode::OK, Json(FeedbackAck { status: "success" })).into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use intune_core::domain::feedback::{FeedbackRecord, FeedbackSubmission};
use intune_core::InterfaceError;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use super::{
        router, FeedbackSink, FeedbackState, TracingFeedbackSink, FEEDBACK_LOG_TARGET,
    };

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        records: Mutex<Vec<FeedbackRecord>>,
    }

    impl RecordingSink {
        pub(crate) fn records(&self) -> Vec<FeedbackRecord> {
            self.records.lock().map(|records| records.clone()).unwrap_or_default()
        }
    }

    impl FeedbackSink for RecordingSink {
        fn emit(&self, record: &FeedbackRecord) {
            if let Ok(mut records) = self.records.lock() {
                records.push(record.clone());
            }
        }
    }

    fn test_router(sink: Arc<RecordingSink>) -> Router {
        router(FeedbackState::new(sink, "intune-ai-agent"))
    }

    async fn post_feedback(router: Router, body: &str) -> (StatusCode, Value) {
        send_feedback(router, Some("application/json"), body).await
    }

    async fn send_feedback(
        router: Router,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method("POST").uri("/feedback");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let response = router
            .oneshot(request.body(Body::from(body.to_string())).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn valid_feedback_is_acknowledged_and_logged_once() {
        let sink = Arc::new(RecordingSink::default());
        let (status, body) = post_feedback(
            test_router(sink.clone()),
            r#"{"score": 4.5, "invocation_id": "abc123", "user_id": "u1"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let emitted = serde_json::to_value(&records[0]).expect("serialize");
        assert_eq!(emitted["score"], json!(4.5));
        assert_eq!(emitted["invocation_id"], "abc123");
        assert_eq!(emitted["user_id"], "u1");
        assert_eq!(emitted["text"], "");
        assert_eq!(emitted["log_type"], "feedback");
        assert_eq!(emitted["service_name"], "intune-ai-agent");
    }

    #[tokio::test]
    async fn matching_constant_fields_are_accepted() {
        let sink = Arc::new(RecordingSink::default());
        let (status, _) = post_feedback(
            test_router(sink.clone()),
            r#"{"score": 1, "invocation_id": "i", "log_type": "feedback",
                "service_name": "intune-ai-agent"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn missing_score_is_unprocessable_and_not_logged() {
        let sink = Arc::new(RecordingSink::default());
        let (status, body) =
            post_feedback(test_router(sink.clone()), r#"{"invocation_id": "abc123"}"#).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap_or_default().contains("score"));
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected_without_logging() {
        let cases = [
            r#"{"score": "high", "invocation_id": "abc123"}"#,
            r#"{"score": 3}"#,
            r#"{"score": 3, "invocation_id": 7}"#,
            r#"{"score": 3, "invocation_id": "i", "log_type": "metric"}"#,
            r#"{"score": 3, "invocation_id": "i", "service_name": "other-service"}"#,
        ];

        for case in cases {
            let sink = Arc::new(RecordingSink::default());
            let (status, _) = post_feedback(test_router(sink.clone()), case).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload: {case}");
            assert!(sink.records().is_empty(), "payload should not be logged: {case}");
        }
    }

    #[tokio::test]
    async fn syntax_errors_are_unprocessable() {
        for case in ["{not json", "", r#"{"score": 4.5, "invocation_id": "abc123""#] {
            let sink = Arc::new(RecordingSink::default());
            let (status, body) = post_feedback(test_router(sink.clone()), case).await;

            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload: {case}");
            assert!(body["detail"].as_str().is_some(), "detail expected for: {case}");
            assert!(sink.records().is_empty());
        }
    }

    #[tokio::test]
    async fn body_is_decoded_as_json_regardless_of_content_type() {
        let body = r#"{"score": 4.5, "invocation_id": "abc123"}"#;
        for content_type in [None, Some("text/plain")] {
            let sink = Arc::new(RecordingSink::default());
            let (status, ack) = send_feedback(test_router(sink.clone()), content_type, body).await;

            assert_eq!(status, StatusCode::OK, "content type: {content_type:?}");
            assert_eq!(ack, json!({"status": "success"}));
            assert_eq!(sink.records().len(), 1);
        }
    }

    #[tokio::test]
    async fn duplicate_submissions_produce_duplicate_entries() {
        let sink = Arc::new(RecordingSink::default());
        let router = test_router(sink.clone());
        let body = r#"{"score": 2, "invocation_id": "dup"}"#;

        post_feedback(router.clone(), body).await;
        post_feedback(router, body).await;

        assert_eq!(sink.records().len(), 2);
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = SharedBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn tracing_sink_emits_one_structured_info_line() {
        let buffer = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt().json().with_writer(buffer.clone()).finish();
        let record = serde_json::from_value::<FeedbackSubmission>(json!({
            "score": 4.5,
            "text": "great",
            "invocation_id": "abc123",
            "user_id": "u1"
        }))
        .expect("submission")
        .into_record("intune-ai-agent")
        .expect("record");

        let sink = TracingFeedbackSink::new("intune_server.feedback");
        tracing::subscriber::with_default(subscriber, || sink.emit(&record));

        let output = buffer.0.lock().map(|bytes| bytes.clone()).unwrap_or_default();
        let text = String::from_utf8(output).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);

        let line: Value = serde_json::from_str(lines[0]).expect("json log line");
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["target"], FEEDBACK_LOG_TARGET);
        assert_eq!(line["fields"]["log_type"], "feedback");
        assert_eq!(line["fields"]["service_name"], "intune-ai-agent");
        assert_eq!(line["fields"]["logger"], "intune_server.feedback");
        assert!(line["fields"]["score"].is_number(), "score should stay numeric: {line}");
        assert_eq!(line["fields"]["score"], json!(4.5));
        assert_eq!(line["fields"]["text"], "great");
        assert_eq!(line["fields"]["invocation_id"], "abc123");
        assert_eq!(line["fields"]["user_id"], "u1");
    }
}
