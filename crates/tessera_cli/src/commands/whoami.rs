//! Whoami command implementation.

use tessera_auth::{AuthService, UserRecord};

/// Runs the whoami command.
///
/// Accepts a bare token or a full `Bearer <token>` header value.
pub fn run(service: &AuthService, input: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = resolve(service, input)?;
    match format {
        "json" => super::print_json(&user)?,
        _ => print_text_output(&user),
    }
    Ok(())
}

fn resolve(service: &AuthService, input: &str) -> tessera_auth::AuthResult<UserRecord> {
    if input.split_whitespace().count() > 1 {
        service.current_user_from_header(input)
    } else {
        service.current_user(input.trim())
    }
}

fn print_text_output(user: &UserRecord) {
    println!("Id:         {}", user.id);
    println!("Username:   {}", user.username);
    if let Some(name) = &user.name {
        println!("Name:       {name}");
    }
    if let Some(email) = &user.email {
        println!("Email:      {email}");
    }
    if let Some(created) = user.created_at {
        println!("Created:    {}", created.to_rfc3339());
    }
    match user.last_login {
        Some(at) => println!("Last login: {}", at.to_rfc3339()),
        None => println!("Last login: never"),
    }
}
