//! The pipeline state machine.
//!
//! One invocation walks Received through Validated, Classified, Resolved,
//! Persisted, Notified and Audited; every failure branch short-circuits to the
//! notification step with a specific user-facing message. Whatever happens,
//! the invocation sends exactly one reply and submits exactly one audit entry,
//! and no error escapes `handle`.

use std::sync::Arc;

use chrono::Utc;
use foreman_core::errors::InputValidationError;
use foreman_core::{
    AuditLogEntry, InboundMessage, PersistenceError, PipelineError, ResolvedTask, TaskRecord,
};
use foreman_agent::IntentClassifier;
use foreman_erp::{AuditLogger, ContextCache, DirectoryFetcher, RecordService};
use foreman_telegram::format;
use foreman_telegram::Notifier;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    cache: ContextCache,
    fetcher: DirectoryFetcher,
    classifier: IntentClassifier,
    records: RecordService,
    audit: AuditLogger,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug)]
pub enum PipelineResult {
    /// Slash command or otherwise unprocessable input, answered with a fixed
    /// informational reply.
    Rejected,
    Created(TaskRecord),
    Failed(PipelineError),
}

/// Result of one invocation. The audit write is detached; the handle is
/// surfaced so tests can await its completion.
pub struct PipelineOutcome {
    pub result: PipelineResult,
    pub audit: JoinHandle<()>,
}

impl Orchestrator {
    pub fn new(
        cache: ContextCache,
        fetcher: DirectoryFetcher,
        classifier: IntentClassifier,
        records: RecordService,
        audit: AuditLogger,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { cache, fetcher, classifier, records, audit, notifier }
    }

    pub async fn handle(&self, message: InboundMessage) -> PipelineOutcome {
        let correlation_id = Uuid::new_v4();
        info!(
            event_name = "message_received",
            %correlation_id,
            source_message_id = message.source_message_id,
            chat_id = message.chat_id,
        );

        if message.is_command() {
            info!(event_name = "command_rejected", %correlation_id, command = %message.text);
            self.notify(message.chat_id, format::command_reply()).await;
            let audit =
                self.audit.submit(AuditLogEntry::failed(&message, None, "slash command rejected"));
            return PipelineOutcome { result: PipelineResult::Rejected, audit };
        }

        let context = self.cache.get(&self.fetcher).await;
        let sender = context.resolve_sender(
            message.username.as_deref(),
            message.first_name.as_deref(),
            message.sender_id,
        );

        let parsed = match self
            .classifier
            .classify(&message.text, &context, &sender, Utc::now())
            .await
        {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(event_name = "classification_failed", %correlation_id, error = %error);
                self.notify(message.chat_id, format::classification_failed_message()).await;
                let audit =
                    self.audit.submit(AuditLogEntry::failed(&message, None, error.to_string()));
                return PipelineOutcome {
                    result: PipelineResult::Failed(PipelineError::Classification(
                        error.to_string(),
                    )),
                    audit,
                };
            }
        };

        if let Err(error) = parsed.validate_description() {
            warn!(event_name = "description_rejected", %correlation_id, error = %error);
            let reply = match &error {
                InputValidationError::DescriptionTooLong { .. } => {
                    format::description_too_long_message()
                }
                InputValidationError::EmptyDescription => {
                    format::classification_failed_message().to_string()
                }
            };
            self.notify(message.chat_id, &reply).await;
            let audit = self.audit.submit(AuditLogEntry::failed(&message, None, error.to_string()));
            return PipelineOutcome {
                result: PipelineResult::Failed(PipelineError::Validation(error)),
                audit,
            };
        }

        let resolved = match ResolvedTask::resolve(parsed, &context) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(event_name = "assignee_unresolved", %correlation_id, requested = %error.requested);
                self.notify(message.chat_id, &format::assignee_not_found_message(&error)).await;
                let audit =
                    self.audit.submit(AuditLogEntry::failed(&message, None, error.to_string()));
                return PipelineOutcome {
                    result: PipelineResult::Failed(PipelineError::AssigneeNotFound(error)),
                    audit,
                };
            }
        };

        match self.records.create(&resolved, message.source_message_id).await {
            Ok(record) => {
                info!(event_name = "pipeline_complete", %correlation_id, record_id = %record.id);
                self.notify(message.chat_id, &format::success_message(&record)).await;
                let audit = self.audit.submit(AuditLogEntry::success(&message, resolved));
                PipelineOutcome { result: PipelineResult::Created(record), audit }
            }
            Err(error) => {
                warn!(event_name = "persistence_failed", %correlation_id, error = %error);
                let reply = match &error {
                    PersistenceError::Validation { messages } => {
                        format::validation_failed_message(messages)
                    }
                    _ => format::persistence_failed_message().to_string(),
                };
                self.notify(message.chat_id, &reply).await;
                let audit = self.audit.submit(AuditLogEntry::failed(
                    &message,
                    Some(resolved),
                    error.to_string(),
                ));
                PipelineOutcome {
                    result: PipelineResult::Failed(PipelineError::Persistence(error)),
                    audit,
                }
            }
        }
    }

    /// Notification failures are logged and swallowed; the reply is
    /// best-effort once the outcome is decided.
    async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(error) = self.notifier.send(chat_id, text).await {
            warn!(event_name = "notify_failed", chat_id, error = %error);
        }
    }
}
