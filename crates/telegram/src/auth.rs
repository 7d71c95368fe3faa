//! Webhook secret validation.

use foreman_core::mask_secret;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Compare the header-supplied secret against the configured one. A missing
/// configured secret disables the check entirely.
pub fn validate_secret(provided: Option<&str>, expected: Option<&SecretString>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    match provided {
        Some(provided) if provided == expected.expose_secret() => true,
        Some(provided) => {
            warn!(
                event_name = "webhook_secret_mismatch",
                provided = %mask_secret(provided),
            );
            false
        }
        None => {
            warn!(event_name = "webhook_secret_missing");
            false
        }
    }
}
