//! Secret masking for log output.

const MAX_FILL: usize = 20;

/// Mask a secret with the two-character reveal policy: inputs of length >= 6
/// keep their first and last two characters, everything shorter collapses to
/// `***`. The fill length is capped so log lines stay bounded.
pub fn mask_secret(secret: &str) -> String {
    if secret.len() < 6 {
        return "***".to_string();
    }

    let first: String = secret.chars().take(2).collect();
    let last: String = secret.chars().rev().take(2).collect::<Vec<_>>().into_iter().rev().collect();
    let fill = "\u{2022}".repeat((secret.chars().count() - 4).min(MAX_FILL));

    format!("{first}{fill}{last}")
}
