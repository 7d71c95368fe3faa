//! Retry-driving classification wrapper around an [`LlmClient`].

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use foreman_core::{
    OperationalContext, ParsedTask, Priority, RetryPolicy, SenderProfile, RATIONALE_MAX_CHARS,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::{Completion, LlmClient, LlmError};
use crate::prompt;

const DATE_ONLY_HOUR: u32 = 9;

#[derive(Debug, Deserialize)]
struct RawTask {
    description: String,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default, alias = "dueDate")]
    due_date: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    rationale: String,
    confidence: f64,
}

pub struct IntentClassifier {
    client: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, policy: RetryPolicy::classifier() }
    }

    /// Classify the message text against the current directory snapshot.
    /// Output that fails schema validation counts as a failed attempt and is
    /// re-asked within the same retry budget as transport faults.
    pub async fn classify(
        &self,
        text: &str,
        context: &OperationalContext,
        sender: &SenderProfile,
        now: DateTime<Utc>,
    ) -> Result<ParsedTask, LlmError> {
        let request = Completion {
            system_prompt: prompt::build_system_prompt(context, sender, now),
            user_text: text.to_string(),
        };
        let tz = prompt::sender_timezone(sender);

        let mut attempt: u32 = 1;
        loop {
            let result = match self.client.complete(&request).await {
                Ok(raw) => parse_response(&raw, tz),
                Err(error) => Err(error),
            };

            match result {
                Ok(parsed) => {
                    info!(
                        event_name = "classification_complete",
                        attempt,
                        confidence = parsed.confidence,
                        has_assignee = parsed.assignee_raw.is_some(),
                    );
                    return Ok(parsed);
                }
                Err(error) => {
                    let decision = self.policy.decide(attempt, &error.as_call_outcome());
                    if !decision.retry {
                        return Err(error);
                    }
                    warn!(
                        event_name = "classification_retry",
                        attempt,
                        delay_ms = decision.delay.as_millis() as u64,
                        error = %error,
                    );
                    tokio::time::sleep(decision.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn parse_response(raw: &str, tz: Tz) -> Result<ParsedTask, LlmError> {
    let task: RawTask = serde_json::from_str(raw)
        .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;

    if task.description.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty description".to_string()));
    }
    if !(0.0..=1.0).contains(&task.confidence) {
        return Err(LlmError::MalformedResponse(format!(
            "confidence {} outside [0, 1]",
            task.confidence
        )));
    }

    let due_date = match task.due_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_due_date(raw, tz)?),
        _ => None,
    };

    let mut rationale = task.rationale;
    if rationale.chars().count() > RATIONALE_MAX_CHARS {
        rationale = rationale.chars().take(RATIONALE_MAX_CHARS).collect();
    }

    Ok(ParsedTask {
        description: task.description,
        assignee_raw: task.assignee.filter(|value| !value.trim().is_empty()),
        due_date,
        priority: task.priority.as_deref().and_then(Priority::parse_lenient),
        rationale,
        confidence: task.confidence,
    })
}

/// Accept a full ISO 8601 date-time, or a bare date which is anchored to
/// mid-morning in the sender's local timezone.
fn parse_due_date(raw: &str, tz: Tz) -> Result<DateTime<FixedOffset>, LlmError> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date);
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| LlmError::MalformedResponse(format!("unparsable due date `{raw}`")))?;
    let naive = date
        .and_hms_opt(DATE_ONLY_HOUR, 0, 0)
        .ok_or_else(|| LlmError::MalformedResponse(format!("unparsable due date `{raw}`")))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
        .ok_or_else(|| LlmError::MalformedResponse(format!("due date `{raw}` has no local time")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use foreman_core::{SiteLocation, TeamMember};
    use serde_json::json;

    use super::*;

    struct ScriptedLlm {
        script: Mutex<Vec<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script), calls: Mutex::new(0) })
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &Completion) -> Result<String, LlmError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                match script.first() {
                    Some(Ok(raw)) => Ok(raw.clone()),
                    Some(Err(LlmError::Timeout)) => Err(LlmError::Timeout),
                    Some(Err(LlmError::Auth)) => Err(LlmError::Auth),
                    Some(Err(error)) => Err(LlmError::Network(error.to_string())),
                    None => panic!("empty script"),
                }
            }
        }
    }

    fn context() -> OperationalContext {
        OperationalContext {
            users: vec![TeamMember {
                email: "colin@example.com".to_string(),
                full_name: "Colin".to_string(),
                timezone: "America/Los_Angeles".to_string(),
                enabled: true,
            }],
            sites: vec![SiteLocation::new("Big Sky")],
            fetched_at: Utc::now(),
        }
    }

    fn sender() -> SenderProfile {
        SenderProfile {
            name: "Colin".to_string(),
            email: "colin@example.com".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            sender_id: 3,
        }
    }

    fn valid_payload() -> String {
        json!({
            "description": "check pump at Big Sky",
            "assignee": "colin@example.com",
            "due_date": "2025-06-02",
            "priority": "High",
            "rationale": "direct task statement",
            "confidence": 0.92
        })
        .to_string()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 16, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn valid_response_parses_into_task() {
        let llm = ScriptedLlm::new(vec![Ok(valid_payload())]);
        let classifier = IntentClassifier::new(llm.clone());

        let task = classifier
            .classify("Colin check pump at Big Sky", &context(), &sender(), now())
            .await
            .unwrap();

        assert_eq!(task.description, "check pump at Big Sky");
        assert_eq!(task.assignee_raw.as_deref(), Some("colin@example.com"));
        assert_eq!(task.priority, Some(Priority::High));
        let due = task.due_date.unwrap();
        // Date-only input anchors to 09:00 Pacific.
        assert_eq!(due.format("%Y-%m-%d %H:%M %z").to_string(), "2025-06-02 09:00 -0700");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_output_is_retried_then_succeeds() {
        let llm = ScriptedLlm::new(vec![Ok("not json".to_string()), Ok(valid_payload())]);
        let classifier = IntentClassifier::new(llm.clone());

        let task = classifier.classify("text", &context(), &sender(), now()).await.unwrap();
        assert_eq!(task.confidence, 0.92);
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_exhausts_three_attempts() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::Timeout)]);
        let classifier = IntentClassifier::new(llm.clone());

        let error = classifier.classify("text", &context(), &sender(), now()).await.unwrap_err();
        assert!(matches!(error, LlmError::Timeout));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_not_retried() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::Auth)]);
        let classifier = IntentClassifier::new(llm.clone());

        let error = classifier.classify("text", &context(), &sender(), now()).await.unwrap_err();
        assert!(matches!(error, LlmError::Auth));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_confidence_is_rejected() {
        let payload = json!({
            "description": "check pump",
            "rationale": "r",
            "confidence": 1.4
        })
        .to_string();
        let llm = ScriptedLlm::new(vec![Ok(payload)]);
        let classifier = IntentClassifier::new(llm.clone());

        let error = classifier.classify("text", &context(), &sender(), now()).await.unwrap_err();
        assert!(matches!(error, LlmError::MalformedResponse(_)));
        // Malformed output shares the transient-fault budget.
        assert_eq!(llm.call_count(), 3);
    }
}
