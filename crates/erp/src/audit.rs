//! Best-effort audit trail writes.

use chrono::Utc;
use foreman_core::{AuditLogEntry, RetryPolicy};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::ErpClient;
use crate::transport::ErpRequest;

const AUDIT_PATH: &str = "/api/resource/Task Parser Log";

/// Fire-and-forget audit sink. `submit` detaches the write onto a background
/// task; the returned handle exists so tests can await completion, callers in
/// the pipeline drop it.
pub struct AuditLogger {
    client: ErpClient,
}

impl AuditLogger {
    pub fn new(client: ErpClient) -> Self {
        Self { client }
    }

    pub fn submit(&self, entry: AuditLogEntry) -> JoinHandle<()> {
        let client = self.client.clone();

        tokio::spawn(async move {
            let doc = audit_document(&entry);
            let request = ErpRequest::post(AUDIT_PATH, doc);

            match client.request(&request, RetryPolicy::audit()).await {
                Ok(_) => info!(
                    event_name = "audit_entry_written",
                    source_message_id = %entry.source_message_id,
                    status = entry.status.as_str(),
                ),
                Err(error) => warn!(
                    event_name = "audit_entry_failed",
                    source_message_id = %entry.source_message_id,
                    error = %error,
                ),
            }
        })
    }
}

fn audit_document(entry: &AuditLogEntry) -> Value {
    let parsed_data = entry.parsed.as_ref().map(|task| {
        json!({
            "description": task.parsed.description,
            "assignee_email": task.assignee_email,
            "due_date": task.parsed.due_date.map(|date| date.to_rfc3339()),
            "priority": task.parsed.priority.map(|priority| priority.as_str()),
            "rationale": task.parsed.rationale,
            "confidence": task.parsed.confidence,
            "flagged_for_review": task.flagged_for_review,
        })
        .to_string()
    });

    json!({
        "source_message_id": entry.source_message_id,
        "source_user_id": entry.user_id,
        "original_text": entry.original_text,
        "parsed_data": parsed_data,
        "confidence": entry.confidence,
        "status": entry.status.as_str(),
        "error_message": entry.error_message,
        "created_at": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use foreman_core::InboundMessage;
    use serde_json::json;

    use crate::client::test_support::{Scripted, ScriptedTransport};

    use super::*;

    fn message() -> InboundMessage {
        InboundMessage {
            source_message_id: 42,
            chat_id: 7,
            sender_id: 3,
            username: None,
            first_name: None,
            text: "check pump at Big Sky".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_never_panics_the_task() {
        let transport =
            Arc::new(ScriptedTransport::new(vec![Scripted::Network("refused".to_string())]));
        let logger = AuditLogger::new(ErpClient::new(transport.clone()));

        let handle = logger.submit(AuditLogEntry::failed(&message(), None, "classifier gave up"));
        handle.await.expect("audit task must complete cleanly");

        // One retry on top of the initial attempt.
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_write_issues_one_call() {
        let transport = Arc::new(ScriptedTransport::new(vec![Scripted::Respond(
            200,
            json!({ "data": { "name": "TPL-0001" } }),
        )]));
        let logger = AuditLogger::new(ErpClient::new(transport.clone()));

        let handle = logger.submit(AuditLogEntry::failed(&message(), None, "boom"));
        handle.await.expect("audit task must complete cleanly");

        assert_eq!(transport.call_count(), 1);
    }
}
