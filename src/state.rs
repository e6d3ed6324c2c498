use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    applications::{
        memory::MemoryApplicationStore,
        repo::{ApplicationStore, PgApplicationStore},
    },
    auth::{
        jwt::JwtKeys,
        memory::MemoryUserStore,
        repo::{PgUserStore, UserStore},
        services::{LogDelivery, ResetCodeDelivery},
    },
    config::AppConfig,
    db,
    documents::{
        memory::MemoryDocumentStore,
        repo::{DocumentStore, PgDocumentStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub applications: Arc<dyn ApplicationStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub reset_delivery: Arc<dyn ResetCodeDelivery>,
}

impl AppState {
    /// Postgres-backed state when `DATABASE_URL` is set, in-memory otherwise.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let Some(url) = config.database_url.clone() else {
            warn!("DATABASE_URL not set; records are kept in memory and lost on restart");
            return Ok(Self::in_memory(config));
        };

        let pool = db::connect(&url, config.max_connections).await?;
        db::migrate(&pool).await?;
        info!("database ready");

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgApplicationStore::new(pool.clone())),
            Arc::new(PgDocumentStore::new(pool)),
            Arc::new(LogDelivery),
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        applications: Arc<dyn ApplicationStore>,
        documents: Arc<dyn DocumentStore>,
        reset_delivery: Arc<dyn ResetCodeDelivery>,
    ) -> Self {
        let jwt = JwtKeys::from_config(&config.jwt);
        Self {
            config: Arc::new(config),
            jwt,
            users,
            applications,
            documents,
            reset_delivery,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryApplicationStore::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(LogDelivery),
        )
    }

    /// Fresh in-memory state with the fixed test configuration.
    pub fn fake() -> Self {
        Self::in_memory(AppConfig::for_tests())
    }
}
