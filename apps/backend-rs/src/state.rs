use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db::create_pool;
use crate::repository::{BillingStore, MemoryStore, PgStore};
use crate::services::billing::BillingService;
use crate::services::properties::PropertyService;
use crate::services::readings::ReadingService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub billing: BillingService,
    pub properties: PropertyService,
    pub readings: ReadingService,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, sqlx::Error> {
        let db_pool = create_pool(&config)?;
        let store: Arc<dyn BillingStore> = match &db_pool {
            Some(pool) => Arc::new(PgStore::new(
                pool.clone(),
                config.building_cache_ttl(),
                config.building_cache_max_entries,
            )),
            None => {
                tracing::warn!("DATABASE_URL is not set, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(config, db_pool, store))
    }

    pub fn with_store(
        config: AppConfig,
        db_pool: Option<PgPool>,
        store: Arc<dyn BillingStore>,
    ) -> Self {
        let billing_tz = config.billing_tz();
        Self {
            billing: BillingService::new(store.clone(), billing_tz),
            properties: PropertyService::new(store.clone()),
            readings: ReadingService::new(store),
            config: Arc::new(config),
            db_pool,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::with_store(AppConfig::for_tests(), None, Arc::new(MemoryStore::new()))
    }
}
