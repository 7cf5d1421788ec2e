//! Status command implementation.

use serde::Serialize;
use tessera_auth::{AuthService, Settings};
use tessera_store::{redact_url, OpenedStore};

/// What the process bound at startup.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// `postgres` or `memory`.
    pub backend: String,
    /// Configured server, credentials redacted.
    pub database_url: String,
    /// Configured database name.
    pub database_name: String,
    /// Why the fallback store was bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Number of stored users.
    pub user_count: u64,
    /// Token lifetime in hours.
    pub token_expiry_hours: u64,
    /// True if tokens are signed with the built-in secret.
    pub default_secret: bool,
}

/// Runs the status command.
pub fn run(
    service: &AuthService,
    opened: &OpenedStore,
    settings: &Settings,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = StatusReport {
        backend: opened.backend.to_string(),
        database_url: redact_url(&settings.store.database_url),
        database_name: settings.store.database_name.clone(),
        fallback_reason: opened.fallback_reason.clone(),
        user_count: service.users().count()?,
        token_expiry_hours: settings.auth.token_expiry_hours,
        default_secret: settings.auth.uses_default_secret(),
    };

    match format {
        "json" => super::print_json(&report)?,
        _ => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &StatusReport) {
    println!("Backend:       {}", report.backend);
    println!("Database URL:  {}", report.database_url);
    println!("Database name: {}", report.database_name);
    if let Some(reason) = &report.fallback_reason {
        println!("Fallback:      {reason}");
    }
    println!("Users:         {}", report.user_count);
    println!("Token expiry:  {}h", report.token_expiry_hours);
    if report.default_secret {
        println!("Warning:       tokens are signed with the default secret");
    }
}
