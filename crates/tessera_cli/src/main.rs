//! Tessera CLI
//!
//! Account and session tools for Tessera.
//!
//! Configuration comes from the environment (or a `.env` file); see
//! [`tessera_auth::Settings::from_env`]. When PostgreSQL is unreachable the
//! in-memory store is used and nothing persists past the process, apart
//! from the seeded fixture accounts.
//!
//! # Commands
//!
//! - `status` - Show which backend was bound
//! - `register` - Create an account and print a token
//! - `login` - Check credentials and print a token
//! - `whoami` - Resolve a token to its user

mod commands;

use clap::{Parser, Subcommand};
use tessera_auth::{AuthService, Settings};
use tracing_subscriber::EnvFilter;

/// Tessera account and session tools.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bound backend and user count
    Status,

    /// Create an account and print a session token
    Register {
        /// Login name
        username: String,

        /// Password
        password: String,

        /// Email address
        #[arg(short, long)]
        email: Option<String>,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Check credentials and print a session token
    Login {
        /// Login name
        username: String,

        /// Password
        password: String,
    },

    /// Resolve a token, or a `Bearer <token>` header value, to its user
    Whoami {
        /// Token or Authorization header value
        token: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Tessera CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let (service, opened) = AuthService::start(&settings)?;

    match cli.command {
        Commands::Status => commands::status::run(&service, &opened, &settings, &cli.format)?,
        Commands::Register {
            username,
            password,
            email,
            name,
        } => commands::register::run(
            &service,
            &username,
            &password,
            email.as_deref(),
            name.as_deref(),
            &cli.format,
        )?,
        Commands::Login { username, password } => {
            commands::login::run(&service, &username, &password, &cli.format)?
        }
        Commands::Whoami { token } => commands::whoami::run(&service, &token, &cli.format)?,
        Commands::Version => {}
    }

    Ok(())
}
