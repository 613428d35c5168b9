use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use casebook::auth::jwt::JwtService;
use casebook::config::AppConfig;
use casebook::db;
use casebook::mail::mailer_from_config;
use casebook::routes;
use casebook::state::AppState;
use casebook::storage::LocalDiskStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        upload_dir = %config.upload_dir.display(),
        max_file_size = config.max_file_size,
        storage_limit = config.storage_limit,
        mail_enabled = config.mail_relay_url.is_some(),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    if applied > 0 {
        tracing::info!(applied, "applied database migrations");
    }

    let storage = LocalDiskStorage::new(config.upload_dir.clone());
    storage.ensure_root().await?;
    let mailer = mailer_from_config(&config);
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(pool, config, Arc::new(storage), mailer, jwt);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
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
