use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::AppResult,
    mail::Mailer,
    quota::StorageLimits,
    storage::ObjectStorage,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub limits: Arc<StorageLimits>,
    pub mailer: Arc<dyn Mailer>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        jwt: JwtService,
    ) -> Self {
        let limits = Arc::new(config.storage_limits());
        Self {
            pool,
            config: Arc::new(config),
            storage,
            limits,
            mailer,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        Ok(self.pool.get()?)
    }
}
