mod config;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::{AccessContext, AccessRule, Actor, Role, Tier, has_tier_access};
use platform_db::{DbPool, VendorDirectory, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "access-server", version, about = "Vendor tier access service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert demo users and vendors.
    Seed,
    /// Evaluate a tier check for one actor and print the decision.
    Check(CheckCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct CheckCommand {
    #[arg(long)]
    actor_id: Option<String>,
    #[arg(long, help = "admin, vendor or any other role name")]
    role: Option<Role>,
    #[arg(long, help = "Minimum tier: free, tier1 or tier2")]
    tier: Tier,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up(&app_config).await,
            MigrateCommand::Down => migrate_down(&app_config).await,
        },
        Command::Seed => run_seed(&app_config).await,
        Command::Check(cmd) => run_check(cmd, &app_config).await,
    }
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    connect(&config.database)
        .await
        .context("failed to connect to database")
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let state = AppState {
        store: Arc::new(VendorDirectory::new(pool)),
        config,
    };
    http::serve((&cmd).into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `access-server migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    let seeded = platform_db::seed_fixtures(&pool).await?;
    for entry in seeded {
        let tier = entry
            .vendor
            .map(|vendor| platform_db::tier_from_entity(vendor.tier).to_string())
            .unwrap_or_else(|| "-".into());
        println!("{}\t{}\t{}\t{}", entry.user.id, entry.user.role, tier, entry.user.email);
    }
    Ok(())
}

async fn run_check(cmd: CheckCommand, config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    let store = VendorDirectory::new(pool);
    let actor = cmd.role.map(|role| Actor {
        id: cmd.actor_id.clone(),
        role,
    });
    let ctx = AccessContext::new(actor.as_ref()).with_store(&store);
    let allowed = has_tier_access(cmd.tier).evaluate(&ctx).await?;
    info!(tier = %cmd.tier, allowed, "tier check evaluated");
    println!("{}", if allowed { "allow" } else { "deny" });
    Ok(())
}
