//! Directory fan-out: team roster and site list.
//!
//! The two reads run concurrently and fail independently. Either side that
//! exhausts its retries, or comes back empty, is replaced by a built-in
//! fallback list so the pipeline keeps working through directory outages.

use chrono::Utc;
use foreman_core::{OperationalContext, RetryPolicy, SiteLocation, TeamMember};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::ErpClient;
use crate::transport::ErpRequest;

const DEFAULT_TIMEZONE: &str = "America/New_York";

fn fallback_users() -> Vec<TeamMember> {
    let roster = [
        ("joel@example.com", "Joel", "America/New_York"),
        ("bryan@example.com", "Bryan", "America/New_York"),
        ("taylor@example.com", "Taylor", "America/Chicago"),
        ("colin@example.com", "Colin", "America/Los_Angeles"),
    ];
    roster
        .into_iter()
        .map(|(email, full_name, timezone)| TeamMember {
            email: email.to_string(),
            full_name: full_name.to_string(),
            timezone: timezone.to_string(),
            enabled: true,
        })
        .collect()
}

fn fallback_sites() -> Vec<SiteLocation> {
    ["Big Sky", "Viper", "Crystal Peak", "Thunder Ridge"]
        .into_iter()
        .map(SiteLocation::new)
        .collect()
}

#[derive(Debug, Deserialize)]
struct UserRow {
    name: Option<String>,
    email: Option<String>,
    full_name: Option<String>,
    time_zone: Option<String>,
    enabled: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    name: Option<String>,
    location_name: Option<String>,
}

pub struct DirectoryFetcher {
    client: ErpClient,
    email_domain_filter: Option<String>,
}

impl DirectoryFetcher {
    pub fn new(client: ErpClient, email_domain_filter: Option<String>) -> Self {
        Self { client, email_domain_filter }
    }

    /// Fetch both directory lists concurrently and join the results.
    pub async fn fetch(&self) -> OperationalContext {
        let (users, sites) = tokio::join!(self.fetch_users(), self.fetch_sites());
        OperationalContext { users, sites, fetched_at: Utc::now() }
    }

    async fn fetch_users(&self) -> Vec<TeamMember> {
        let mut filters = vec![vec![
            Value::from("enabled"),
            Value::from("="),
            Value::from(1),
        ]];
        if let Some(domain) = &self.email_domain_filter {
            filters.push(vec![
                Value::from("name"),
                Value::from("like"),
                Value::from(format!("%{domain}")),
            ]);
        }

        let request = ErpRequest::get("/api/resource/User")
            .with_query("fields", r#"["name", "email", "full_name", "time_zone", "enabled"]"#)
            .with_query("filters", serde_json::to_string(&filters).unwrap_or_default())
            .with_query("limit_page_length", "50");

        let body = match self.client.request(&request, RetryPolicy::erp()).await {
            Ok(body) => body,
            Err(error) => {
                warn!(event_name = "directory_users_fallback", error = %error);
                return fallback_users();
            }
        };

        let rows: Vec<UserRow> = body
            .get("data")
            .cloned()
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default();

        if rows.is_empty() {
            warn!(event_name = "directory_users_empty");
            return fallback_users();
        }

        let users: Vec<TeamMember> = rows.into_iter().filter_map(map_user_row).collect();
        info!(event_name = "directory_users_fetched", count = users.len());
        if users.is_empty() { fallback_users() } else { users }
    }

    async fn fetch_sites(&self) -> Vec<SiteLocation> {
        let request = ErpRequest::get("/api/resource/Location")
            .with_query("fields", r#"["name", "location_name"]"#)
            .with_query("filters", r#"[["is_group", "=", 0], ["disabled", "=", 0]]"#)
            .with_query("limit_page_length", "100");

        let body = match self.client.request(&request, RetryPolicy::erp()).await {
            Ok(body) => body,
            Err(error) => {
                warn!(event_name = "directory_sites_fallback", error = %error);
                return fallback_sites();
            }
        };

        let rows: Vec<SiteRow> = body
            .get("data")
            .cloned()
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default();

        let sites: Vec<SiteLocation> = rows
            .into_iter()
            .filter_map(|row| row.location_name.or(row.name))
            .filter(|name| !name.trim().is_empty())
            .map(SiteLocation::new)
            .collect();

        if sites.is_empty() {
            warn!(event_name = "directory_sites_empty");
            return fallback_sites();
        }

        info!(event_name = "directory_sites_fetched", count = sites.len());
        sites
    }
}

fn map_user_row(row: UserRow) -> Option<TeamMember> {
    let email = row.email.or(row.name).filter(|value| !value.trim().is_empty())?;

    // Display names use the first word of the full name, falling back to the
    // email local part.
    let full_name = row
        .full_name
        .as_deref()
        .and_then(|name| name.split_whitespace().next())
        .map(str::to_string)
        .or_else(|| email.split('@').next().map(str::to_string))?;

    Some(TeamMember {
        email,
        full_name,
        timezone: row
            .time_zone
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        enabled: row.enabled == Some(1),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::client::test_support::{Scripted, ScriptedTransport};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn network_outage_yields_fallback_lists() {
        let transport =
            Arc::new(ScriptedTransport::new(vec![Scripted::Network("refused".to_string())]));
        let fetcher = DirectoryFetcher::new(ErpClient::new(transport), None);

        let context = fetcher.fetch().await;

        assert_eq!(context.users.len(), 4);
        assert!(context.users.iter().any(|member| member.email == "colin@example.com"));
        assert_eq!(context.sites.len(), 4);
        assert!(context.sites.iter().any(|site| site.name == "Big Sky"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_directory_response_yields_fallback() {
        let transport = Arc::new(ScriptedTransport::new(vec![Scripted::Respond(
            200,
            json!({ "data": [] }),
        )]));
        let fetcher = DirectoryFetcher::new(ErpClient::new(transport), None);

        let context = fetcher.fetch().await;
        assert_eq!(context.users.len(), 4);
        assert_eq!(context.sites.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rows_map_to_roster_members() {
        // Both fan-out calls replay the same scripted response; only the
        // roster assertions matter here.
        let transport = Arc::new(ScriptedTransport::new(vec![Scripted::Respond(
            200,
            json!({
                "data": [
                    {
                        "name": "colin@example.com",
                        "email": "colin@example.com",
                        "full_name": "Colin Verde",
                        "time_zone": "America/Los_Angeles",
                        "enabled": 1
                    },
                    { "name": "bare@example.com", "enabled": 0 }
                ]
            }),
        )]));
        let fetcher = DirectoryFetcher::new(ErpClient::new(transport), None);

        let context = fetcher.fetch().await;

        let colin = context
            .users
            .iter()
            .find(|member| member.email == "colin@example.com")
            .expect("colin mapped");
        assert_eq!(colin.full_name, "Colin");
        assert!(colin.enabled);

        let bare = context
            .users
            .iter()
            .find(|member| member.email == "bare@example.com")
            .expect("bare mapped");
        assert_eq!(bare.full_name, "bare");
        assert_eq!(bare.timezone, DEFAULT_TIMEZONE);
        assert!(!bare.enabled);
    }
}
