//! Seam to the classification service.

use async_trait::async_trait;
use chrono::Utc;
use foreman_core::config::LlmConfig;
use foreman_core::retry::{parse_retry_after, CallOutcome};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("classifier authentication failed")]
    Auth,
    #[error("classifier rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("classifier returned status {status}")]
    Status { status: u16 },
    #[error("classifier request timed out")]
    Timeout,
    #[error("classifier network error: {0}")]
    Network(String),
    #[error("classifier output malformed: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    pub fn as_call_outcome(&self) -> CallOutcome {
        match self {
            Self::Auth => CallOutcome::HttpStatus(401),
            Self::RateLimited { retry_after_secs: Some(secs) } => {
                CallOutcome::ServerSuppliedDelay(*secs)
            }
            Self::RateLimited { retry_after_secs: None } => CallOutcome::HttpStatus(429),
            Self::Status { status } => CallOutcome::HttpStatus(*status),
            Self::Timeout => CallOutcome::Timeout,
            // Malformed output is treated as a transient fault and re-asked
            // within the attempt budget.
            Self::Network(_) | Self::MalformedResponse(_) => CallOutcome::NetworkError,
        }
    }
}

/// One classification exchange: a context-enriched system prompt plus the raw
/// user text.
#[derive(Clone, Debug)]
pub struct Completion {
    pub system_prompt: String,
    pub user_text: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &Completion) -> Result<String, LlmError>;
}

/// Chat-completions client with a strict JSON-schema response format.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Network(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

fn task_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "task_parameters",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "The task description"
                    },
                    "assignee": {
                        "type": ["string", "null"],
                        "description": "Roster email of the assignee, or null"
                    },
                    "due_date": {
                        "type": ["string", "null"],
                        "description": "Due date in ISO 8601 format"
                    },
                    "priority": {
                        "type": ["string", "null"],
                        "enum": ["Low", "Medium", "High", "Urgent", null],
                        "description": "Task priority level"
                    },
                    "rationale": {
                        "type": "string",
                        "description": "Why the message was interpreted this way"
                    },
                    "confidence": {
                        "type": "number",
                        "description": "Confidence in the interpretation, 0 to 1"
                    }
                },
                "required": ["description", "rationale", "confidence"],
                "additionalProperties": false
            }
        }
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &Completion) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_text },
            ],
            "response_format": task_schema(),
            "temperature": 0.1,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(error.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(LlmError::Auth);
        }
        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| parse_retry_after(raw, Utc::now()));
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !(200..300).contains(&status) {
            return Err(LlmError::Status { status });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;

        payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::MalformedResponse("completion missing message content".to_string())
            })
    }
}
