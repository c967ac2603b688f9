//! Address Book CLI - operator commands
//!
//! Usage:
//!   address-book migrate
//!   address-book account create --username <name> --email <email> --password <password>
//!   address-book account delete <username>

use address_api::audit::{audit_log, AuditEvent};
use address_api::state::AppState;
use address_core::config::{AppConfig, StorageBackend};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "address-book")]
#[command(about = "Address book operator CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create an account
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Delete an account with its token and all of its addresses
    Delete {
        /// Username or email of the account
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "address_cli=info,address_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.database.backend != StorageBackend::Postgres {
        bail!("the CLI operates on PostgreSQL; set STORAGE_BACKEND=postgres");
    }

    // Connecting applies pending migrations
    let state = AppState::postgres(config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    match cli.command {
        Commands::Migrate => {
            println!("Migrations applied");
        }
        Commands::Account { action } => match action {
            AccountAction::Create {
                username,
                email,
                password,
            } => {
                let account = state
                    .auth
                    .register_account(&username, &email, &password)
                    .await?;
                audit_log(&AuditEvent::AccountCreated {
                    account_id: account.id.as_uuid(),
                    username: account.username.clone(),
                });
                println!("Created account {} ({})", account.username, account.id);
            }
            AccountAction::Delete { username } => {
                let account = state.auth.find_account(&username).await?;
                let removed = state.addresses.purge_owner(account.id).await?;
                state.auth.delete_account(&account).await?;
                audit_log(&AuditEvent::AccountDeleted {
                    account_id: account.id.as_uuid(),
                    username: account.username.clone(),
                    addresses_removed: removed,
                });
                println!(
                    "Deleted account {} and {} address(es)",
                    account.username, removed
                );
            }
        },
    }

    Ok(())
}
