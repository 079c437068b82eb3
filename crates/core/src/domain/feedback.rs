use serde::{Deserialize, Serialize};
use serde_json::Number;
use thiserror::Error;

pub const FEEDBACK_LOG_TYPE: &str = "feedback";

/// Tag accepted in the `log_type` field. Only `"feedback"` deserializes;
/// anything else is a schema error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTypeTag {
    #[serde(rename = "feedback")]
    Feedback,
}

/// Feedback payload as submitted by a client.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FeedbackSubmission {
    /// Any JSON number; integers stay integers when re-emitted.
    pub score: Number,
    #[serde(default = "default_text")]
    pub text: Option<String>,
    pub invocation_id: String,
    #[serde(default)]
    pub log_type: Option<LogTypeTag>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub user_id: String,
}

fn default_text() -> Option<String> {
    Some(String::new())
}

/// Feedback as emitted to the log sink, with the constant fields stamped.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub score: Number,
    pub text: Option<String>,
    pub invocation_id: String,
    pub log_type: &'static str,
    pub service_name: String,
    pub user_id: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("service_name must be `{expected}`, got `{submitted}`")]
    ServiceNameMismatch { expected: String, submitted: String },
}

impl FeedbackSubmission {
    pub fn into_record(self, service_name: &str) -> Result<FeedbackRecord, FeedbackError> {
        if let Some(submitted) = self.service_name {
            if submitted != service_name {
                return Err(FeedbackError::ServiceNameMismatch {
                    expected: service_name.to_string(),
                    submitted,
                });
            }
        }

        Ok(FeedbackRecord {
            score: self.score,
            text: self.text,
            invocation_id: self.invocation_id,
            log_type: FEEDBACK_LOG_TYPE,
            service_name: service_name.to_string(),
            user_id: self.user_id,
        })
    }
}
