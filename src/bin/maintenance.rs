use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use casebook::auth::bootstrap;
use casebook::config::AppConfig;
use casebook::db;
use casebook::storage::{LocalDiskStorage, ObjectStorage};

const USAGE: &str = "Usage: maintenance <storage-stats|bootstrap-admin>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("storage-stats") => storage_stats().await?,
        Some("bootstrap-admin") => bootstrap_admin()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn storage_stats() -> Result<()> {
    let config = AppConfig::from_env()?;
    let limits = config.storage_limits();
    let storage = LocalDiskStorage::new(config.upload_dir.clone());

    let used = storage
        .used_bytes()
        .await
        .context("failed to measure upload directory")?;
    let stats = limits.stats(used);

    println!("Upload directory: {}", storage.root().display());
    println!("Limit:  {} bytes", stats.total);
    println!("Used:   {} bytes ({:.2}%)", stats.used, stats.usage_percent);
    println!("Free:   {} bytes", stats.free);
    Ok(())
}

fn bootstrap_admin() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;

    let mut conn = pool.get().context("failed to get database connection")?;
    let created = bootstrap::ensure_admin(&mut conn, config.admin_password.as_deref())
        .map_err(|err| anyhow::anyhow!("admin bootstrap failed: {err:?}"))?;

    if created {
        println!("Admin account created.");
    } else {
        println!("Admin account already exists.");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
