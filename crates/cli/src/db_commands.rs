use std::path::Path;

use {botdeck_audit::store_sqlite::SqliteAuditStore, clap::Subcommand};

use crate::config_commands;

#[derive(Subcommand)]
pub enum DbAction {
    /// Create the audit tables and apply pending migrations.
    Migrate,
}

pub async fn handle_db(action: &DbAction, explicit: Option<&Path>) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => run_migrations(explicit).await,
    }
}

async fn run_migrations(explicit: Option<&Path>) -> anyhow::Result<()> {
    let config = config_commands::load(explicit)?.config;
    let url = &config.database.url;

    println!("Running migrations on {url}...");
    // Opening the store applies every pending migration.
    SqliteAuditStore::new(url, 1).await?;
    println!("Migrations complete.");

    Ok(())
}
