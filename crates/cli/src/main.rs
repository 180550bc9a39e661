//! Cartwheel CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cw-cli migrate
//!
//! # Create a staff user (password read from CW_ADMIN_PASSWORD)
//! CW_ADMIN_PASSWORD=... cw-cli users create-admin -e admin@example.com -u admin
//!
//! # Load categories and products from YAML
//! cw-cli seed catalog catalog.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a staff user. The password is read from `CW_ADMIN_PASSWORD`.
    CreateAdmin {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert categories and products from a YAML file
    Catalog {
        /// Path to the YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Users { action } => match action {
            UserAction::CreateAdmin { email, username } => {
                commands::admin::create_admin(&email, &username).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&file).await?;
            }
        },
    }
    Ok(())
}
