//! User-facing reply texts.

use foreman_core::{AssigneeResolutionError, Priority, TaskRecord};

const DESCRIPTION_PREVIEW_CHARS: usize = 100;
const CONFIDENCE_NOTE_THRESHOLD: f64 = 0.7;

pub fn command_reply() -> &'static str {
    "Commands are not yet implemented. Please send a task description."
}

pub fn success_message(record: &TaskRecord) -> String {
    let mut message = String::from("\u{2705} *Task Created Successfully*\n\n");

    let preview: String = record.description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    message.push_str(&format!("\u{1F4CB} *Description:* {preview}"));
    if record.description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        message.push_str("...");
    }

    if let Some(assignee) = &record.assignee_email {
        let name = assignee.split('@').next().unwrap_or(assignee);
        message.push_str(&format!("\n\u{1F464} *Assigned to:* {name}"));
    }

    if let Some(due) = &record.due_date_local {
        message.push_str(&format!("\n\u{1F4C5} *Due:* {due}"));
    }

    let emoji = match record.priority {
        Priority::Urgent => "\u{1F534}",
        Priority::High => "\u{1F7E0}",
        Priority::Medium => "\u{1F7E1}",
        Priority::Low => "\u{1F7E2}",
    };
    message.push_str(&format!("\n{emoji} *Priority:* {}", record.priority.as_str()));

    if record.confidence < CONFIDENCE_NOTE_THRESHOLD {
        message.push_str(&format!(
            "\n\n\u{26A0}\u{FE0F} *Note:* Task flagged for review (confidence: {:.0}%)",
            record.confidence * 100.0
        ));
    }

    message.push_str(&format!("\n\n*Task ID:* {}", record.id));
    message
}

pub fn classification_failed_message() -> &'static str {
    "\u{274C} Sorry, I had trouble understanding your request. Please try again or rephrase."
}

pub fn description_too_long_message() -> String {
    format!(
        "\u{274C} Description exceeds maximum length ({} characters). Please shorten it.",
        foreman_core::DESCRIPTION_MAX_CHARS
    )
}

pub fn assignee_not_found_message(error: &AssigneeResolutionError) -> String {
    format!(
        "\u{274C} User '{}' not found.\n\nValid assignees: {}",
        error.requested,
        error.valid_assignees.join(", ")
    )
}

/// Validation failures carry the server's own wording, verbatim.
pub fn validation_failed_message(messages: &[String]) -> String {
    format!(
        "\u{274C} Task creation failed:\n\n{}\n\nPlease check your input and try again.",
        messages.join("\n")
    )
}

pub fn persistence_failed_message() -> &'static str {
    "\u{274C} Failed to create task. Please try again in a moment."
}
