//! Domain model for the task-ingestion pipeline.
//!
//! Everything here is plain data. One pipeline invocation owns the
//! `ParsedTask`/`ResolvedTask`/`TaskRecord`/`AuditLogEntry` values it creates;
//! only `OperationalContext` snapshots are shared across invocations, and those
//! are replaced wholesale rather than mutated.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AssigneeResolutionError, InputValidationError};

pub const DESCRIPTION_MAX_CHARS: usize = 5000;
pub const RATIONALE_MAX_CHARS: usize = 2000;

/// Confidence threshold below which a created record is flagged for review.
pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub email: String,
    pub full_name: String,
    pub timezone: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub name: String,
}

impl SiteLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Snapshot of the operational directory. Immutable once constructed; the
/// cache replaces the whole snapshot on refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationalContext {
    pub users: Vec<TeamMember>,
    pub sites: Vec<SiteLocation>,
    pub fetched_at: DateTime<Utc>,
}

impl OperationalContext {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.fetched_at < ttl
    }

    pub fn enabled_members(&self) -> impl Iterator<Item = &TeamMember> {
        self.users.iter().filter(|member| member.enabled)
    }

    /// Resolve a classifier-supplied assignee to a roster email.
    ///
    /// Names match case-insensitively against an enabled member's full name or
    /// email local-part. A value containing `@` must equal an enabled member's
    /// email. Unknown assignees carry the valid roster names in the error so
    /// the user reply can list them.
    pub fn resolve_assignee(&self, raw: &str) -> Result<String, AssigneeResolutionError> {
        let needle = raw.trim().to_lowercase();

        let matched = self.enabled_members().find(|member| {
            if needle.contains('@') {
                member.email.to_lowercase() == needle
            } else {
                member.full_name.to_lowercase() == needle
                    || member
                        .email
                        .split('@')
                        .next()
                        .is_some_and(|local| local.to_lowercase().starts_with(&needle))
            }
        });

        match matched {
            Some(member) => Ok(member.email.clone()),
            None => Err(AssigneeResolutionError {
                requested: raw.trim().to_string(),
                valid_assignees: self
                    .enabled_members()
                    .map(|member| member.full_name.clone())
                    .collect(),
            }),
        }
    }

    /// Match the chat sender to a roster member by username or first name,
    /// falling back to the first enabled member when nothing matches.
    pub fn resolve_sender(
        &self,
        username: Option<&str>,
        first_name: Option<&str>,
        sender_id: i64,
    ) -> SenderProfile {
        let username = username.map(str::to_lowercase);
        let first_name = first_name.map(str::to_lowercase);

        let matched = self.users.iter().find(|member| {
            let name = member.full_name.to_lowercase();
            username.as_deref() == Some(name.as_str())
                || first_name.as_deref() == Some(name.as_str())
        });

        let member = matched.or_else(|| self.enabled_members().next()).or(self.users.first());

        match member {
            Some(member) => SenderProfile {
                name: member.full_name.clone(),
                email: member.email.clone(),
                timezone: member.timezone.clone(),
                sender_id,
            },
            None => SenderProfile {
                name: "Unknown".to_string(),
                email: "unknown@example.invalid".to_string(),
                timezone: "UTC".to_string(),
                sender_id,
            },
        }
    }
}

/// The roster member a chat message was attributed to. Drives the local-time
/// framing of the classification prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderProfile {
    pub name: String,
    pub email: String,
    pub timezone: String,
    pub sender_id: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }

    /// Lenient parse for classifier output; anything unrecognized maps to None
    /// and the record layer defaults it to Medium.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Structured classification result, produced once per invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTask {
    pub description: String,
    pub assignee_raw: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
    pub priority: Option<Priority>,
    pub rationale: String,
    pub confidence: f64,
}

impl ParsedTask {
    pub fn validate_description(&self) -> Result<(), InputValidationError> {
        let trimmed = self.description.trim();
        if trimmed.is_empty() {
            return Err(InputValidationError::EmptyDescription);
        }
        let chars = self.description.chars().count();
        if chars > DESCRIPTION_MAX_CHARS {
            return Err(InputValidationError::DescriptionTooLong { chars });
        }
        Ok(())
    }
}

/// A `ParsedTask` with the assignee resolved against the directory and the
/// review flag computed from confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTask {
    pub parsed: ParsedTask,
    pub assignee_email: Option<String>,
    pub flagged_for_review: bool,
}

impl ResolvedTask {
    pub fn resolve(
        parsed: ParsedTask,
        context: &OperationalContext,
    ) -> Result<Self, AssigneeResolutionError> {
        let assignee_email = match parsed.assignee_raw.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(context.resolve_assignee(raw)?),
            _ => None,
        };
        let flagged_for_review = parsed.confidence < REVIEW_CONFIDENCE_THRESHOLD;
        Ok(Self { parsed, assignee_email, flagged_for_review })
    }
}

/// Handle to the record created in the external system, echoing the persisted
/// fields alongside the server-assigned id.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub description: String,
    pub assignee_email: Option<String>,
    pub due_date_local: Option<String>,
    pub priority: Priority,
    pub confidence: f64,
    pub flagged_for_review: bool,
    pub source_message_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// One audit entry per invocation, written best-effort after the reply.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditLogEntry {
    pub source_message_id: String,
    pub user_id: String,
    pub original_text: String,
    pub parsed: Option<ResolvedTask>,
    pub confidence: f64,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

impl AuditLogEntry {
    pub fn success(message: &InboundMessage, resolved: ResolvedTask) -> Self {
        Self {
            source_message_id: message.source_message_id.to_string(),
            user_id: message.sender_id.to_string(),
            original_text: message.text.clone(),
            confidence: resolved.parsed.confidence,
            parsed: Some(resolved),
            status: AuditStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(
        message: &InboundMessage,
        parsed: Option<ResolvedTask>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            source_message_id: message.source_message_id.to_string(),
            user_id: message.sender_id.to_string(),
            original_text: message.text.clone(),
            confidence: parsed.as_ref().map_or(0.0, |task| task.parsed.confidence),
            parsed,
            status: AuditStatus::Failed,
            error_message: Some(error_message.into()),
        }
    }
}

/// Normalized inbound chat message, already stripped of transport framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub source_message_id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: String,
}

impl InboundMessage {
    pub fn is_command(&self) -> bool {
        self.text.starts_with('/')
    }
}
