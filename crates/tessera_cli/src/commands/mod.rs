//! CLI command implementations.

pub mod login;
pub mod register;
pub mod status;
pub mod whoami;

use serde::Serialize;
use tessera_auth::AuthSession;

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a session in the requested format.
pub fn print_session(session: &AuthSession, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => print_json(session)?,
        _ => {
            println!("User:  {} ({})", session.user.username, session.user.id);
            println!("Token: {}", session.token);
        }
    }
    Ok(())
}
