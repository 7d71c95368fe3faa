//! System prompt assembly for the classifier.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use foreman_core::{OperationalContext, SenderProfile};

pub fn sender_timezone(sender: &SenderProfile) -> Tz {
    sender.timezone.parse().unwrap_or(Tz::UTC)
}

/// Build the context-enriched system prompt: current time framed in the
/// sender's local timezone and in UTC, the team roster, and the site list.
pub fn build_system_prompt(
    context: &OperationalContext,
    sender: &SenderProfile,
    now: DateTime<Utc>,
) -> String {
    let tz = sender_timezone(sender);
    let local = now.with_timezone(&tz);

    let mut roster = String::new();
    for member in context.enabled_members() {
        roster.push_str(&format!(
            "- {} <{}> ({})\n",
            member.full_name, member.email, member.timezone
        ));
    }

    let mut sites = String::new();
    for site in &context.sites {
        sites.push_str(&format!("- {}\n", site.name));
    }

    format!(
        "You are a task extraction assistant for a field operations team. \
Extract task parameters from the user's message.\n\
\n\
Current time for {sender_name} ({tz_name}): {local_time}\n\
Current time in UTC: {utc_time}\n\
\n\
Team roster:\n{roster}\n\
Known sites:\n{sites}\n\
Rules:\n\
- description: the main task description, kept close to the user's wording.\n\
- assignee: the roster email of the person the task is for, matched \
case-insensitively by first name or email; null if nobody is named.\n\
- due_date: ISO 8601 date-time; resolve relative phrases (tomorrow, Friday, \
in two hours) against the sender's local time above; null if no deadline \
is given.\n\
- priority: one of Low, Medium, High, Urgent; null if not stated or clearly \
implied.\n\
- rationale: one sentence on why you read the message this way.\n\
- confidence: your confidence in this interpretation, from 0 to 1.",
        sender_name = sender.name,
        tz_name = tz.name(),
        local_time = local.format("%A, %Y-%m-%d %H:%M"),
        utc_time = now.format("%Y-%m-%d %H:%M"),
        roster = roster,
        sites = sites,
    )
}
