pub mod config;
pub mod domain;
pub mod errors;
pub mod retry;
pub mod secrets;

pub use domain::{
    AuditLogEntry, AuditStatus, InboundMessage, OperationalContext, ParsedTask, Priority,
    ResolvedTask, SenderProfile, SiteLocation, TaskRecord, TeamMember, DESCRIPTION_MAX_CHARS,
    RATIONALE_MAX_CHARS,
};
pub use errors::{AssigneeResolutionError, InputValidationError, PersistenceError, PipelineError};
pub use retry::{Backoff, CallOutcome, RetryDecision, RetryPolicy};
pub use secrets::mask_secret;
