//! Storage backends.
//!
//! Each feature declares its repository trait next to its SQL (`accounts::repo`,
//! `posts::repo`, `notifications::repo`); [`Store`] bundles them so handlers can
//! hold a single `Arc<dyn Store>`. [`PgStore`] is the production backend and
//! [`MemoryStore`] keeps everything in process for tests and local runs.

mod memory;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    accounts::repo::AccountRepo, notifications::repo::NotificationRepo, posts::repo::PostRepo,
};

pub use memory::MemoryStore;

pub trait Store: AccountRepo + PostRepo + NotificationRepo + Send + Sync {}

impl<T> Store for T where T: AccountRepo + PostRepo + NotificationRepo + Send + Sync {}

#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")
    }
}
