use std::sync::Arc;

use crate::{
    config::{Config, WORKER_POOL_SIZE, WORKER_TIMEOUT_SECS},
    utils::{cache::TtlCache, worker_pool::WorkerPool},
};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub cache: Arc<TtlCache>,
    pub workers: WorkerPool,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            pool,
            config,
            cache: Arc::new(TtlCache::new()),
            workers: WorkerPool::new(
                WORKER_POOL_SIZE,
                std::time::Duration::from_secs(WORKER_TIMEOUT_SECS),
            ),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<TtlCache> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}
