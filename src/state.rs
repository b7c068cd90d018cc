use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.backend {
            StoreBackend::Postgres => {
                let pg = PgStore::connect(&config.database_url, config.max_connections).await?;
                // Run migrations if present
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migrations folder not found or migration failed; continuing");
                }
                Arc::new(pg) as Arc<dyn Store>
            }
            StoreBackend::Memory => {
                warn!("using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };
        info!(backend = ?config.backend, "store ready");

        Ok(Self { store, config })
    }

    /// State over an empty in-memory store with fixed test settings.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(MemoryStore::new()))
    }

    #[cfg(test)]
    pub fn fake_with(store: Arc<dyn Store>) -> Self {
        use crate::config::{JwtConfig, PaginationConfig};

        let config = Arc::new(AppConfig {
            backend: StoreBackend::Memory,
            database_url: String::new(),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            pagination: PaginationConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
        });
        Self { store, config }
    }
}
