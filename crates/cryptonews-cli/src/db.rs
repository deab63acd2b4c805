use clap::Subcommand;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Verify connectivity and create the schema
    Init,
    /// Apply pending migrations
    Upgrade,
}

/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub(crate) async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Init => {
            cryptonews_db::health_check(pool).await?;
            let applied = cryptonews_db::run_migrations(pool).await?;
            tracing::info!(applied, "database initialised");
            println!("database ready ({applied} migrations applied)");
        }
        DbCommands::Upgrade => {
            let applied = cryptonews_db::run_migrations(pool).await?;
            tracing::info!(applied, "migrations applied");
            println!("applied {applied} pending migrations");
        }
    }
    Ok(())
}
