//! Login command implementation.

use tessera_auth::AuthService;

/// Runs the login command.
pub fn run(
    service: &AuthService,
    username: &str,
    password: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = service.login(username, password)?;
    super::print_session(&session, format)
}
