//! Register command implementation.

use tessera_auth::AuthService;

/// Runs the register command.
pub fn run(
    service: &AuthService,
    username: &str,
    password: &str,
    email: Option<&str>,
    name: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = service.register(username, password, email, name)?;
    super::print_session(&session, format)
}
