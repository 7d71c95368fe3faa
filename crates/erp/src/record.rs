//! Task record creation in the system of record.

use foreman_core::{PersistenceError, Priority, ResolvedTask, RetryPolicy, TaskRecord};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::ErpClient;
use crate::transport::ErpRequest;

const RECORD_PATH: &str = "/api/resource/Maintenance Visit";
const CUSTOMER: &str = "Field Operations";

pub struct RecordService {
    client: ErpClient,
}

impl RecordService {
    pub fn new(client: ErpClient) -> Self {
        Self { client }
    }

    /// Create the task record, returning the server-assigned id echoed into a
    /// [`TaskRecord`]. Validation failures carry the server's own message(s).
    pub async fn create(
        &self,
        task: &ResolvedTask,
        source_message_id: i64,
    ) -> Result<TaskRecord, PersistenceError> {
        let due_date_local = task
            .parsed
            .due_date
            .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string());
        let priority = task.parsed.priority.unwrap_or(Priority::Medium);

        let mut doc = json!({
            "mntc_work_details": task.parsed.description,
            "custom_assigned_to": task.assignee_email,
            "mntc_date": due_date_local,
            "custom_priority": priority.as_str(),
            "custom_parse_rationale": task.parsed.rationale,
            "custom_parse_confidence": task.parsed.confidence,
            "customer": CUSTOMER,
            "maintenance_type": "Preventive",
            "completion_status": "Pending",
            "docstatus": 0,
            "custom_source_message_id": source_message_id.to_string(),
        });

        if task.flagged_for_review {
            doc["custom_flagged_for_review"] = json!(true);
            warn!(
                event_name = "low_confidence_parse",
                confidence = task.parsed.confidence,
                rationale = %task.parsed.rationale,
            );
        }

        let request = ErpRequest::post(RECORD_PATH, doc);
        let body = self.client.request(&request, RetryPolicy::erp()).await?;

        let id = body
            .get("data")
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PersistenceError::Unknown("create response missing record name".to_string())
            })?
            .to_string();

        info!(
            event_name = "task_record_created",
            record_id = %id,
            assignee = task.assignee_email.as_deref().unwrap_or("unassigned"),
            priority = priority.as_str(),
        );

        Ok(TaskRecord {
            id,
            description: task.parsed.description.clone(),
            assignee_email: task.assignee_email.clone(),
            due_date_local,
            priority,
            confidence: task.parsed.confidence,
            flagged_for_review: task.flagged_for_review,
            source_message_id: source_message_id.to_string(),
        })
    }
}
