//! Mandir Bazaar CLI - database migrations and out-of-band management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! mandir-cli migrate
//!
//! # Grant or revoke a role
//! mandir-cli roles grant -e pujari@example.org -r vendor
//! mandir-cli roles revoke -e pujari@example.org -r vendor
//!
//! # List a user's roles
//! mandir-cli roles list -e pujari@example.org
//!
//! # Toggle maintenance mode
//! mandir-cli maintenance on
//! mandir-cli maintenance off
//! ```
//!
//! All commands read `MANDIR_DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mandir-cli")]
#[command(author, version, about = "Mandir Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage role grants
    Roles {
        #[command(subcommand)]
        action: RoleAction,
    },
    /// Turn maintenance mode on or off
    Maintenance {
        #[command(subcommand)]
        state: MaintenanceState,
    },
}

#[derive(Subcommand)]
enum RoleAction {
    /// Grant a role to a user
    Grant {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Role (`admin`, `vendor`, `customer`)
        #[arg(short, long)]
        role: String,
    },
    /// Revoke a role from a user
    Revoke {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Role (`admin`, `vendor`, `customer`)
        #[arg(short, long)]
        role: String,
    },
    /// List a user's roles
    List {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum MaintenanceState {
    /// Show the maintenance page to visitors
    On,
    /// Serve the site normally
    Off,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Roles { action } => match action {
            RoleAction::Grant { email, role } => commands::roles::grant(&email, &role).await?,
            RoleAction::Revoke { email, role } => commands::roles::revoke(&email, &role).await?,
            RoleAction::List { email } => commands::roles::list(&email).await?,
        },
        Commands::Maintenance { state } => {
            commands::maintenance::set(matches!(state, MaintenanceState::On)).await?;
        }
    }
    Ok(())
}
