//! Database pool over the `Any` driver, so the same binary runs against
//! PostgreSQL or SQLite.

use std::sync::Once;

use axum::extract::FromRef;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::AppState;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://janua.db?mode=rwc";
pub const DEFAULT_POOL_SIZE: u32 = 10;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

static DRIVERS: Once = Once::new();

/// Custom db structure to pass to Axum.
#[derive(Clone)]
pub struct Database {
    pub pool: AnyPool,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Database {
        state.db.clone()
    }
}

impl Database {
    /// Init database connection pool.
    pub async fn new(url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new()
            .max_connections(pool_size)
            .connect(url)
            .await?;

        let backend = url.split(':').next().unwrap_or("unknown");
        tracing::info!(%backend, %pool_size, "database pool ready");

        Ok(Self { pool })
    }

    /// Apply the schema. Statements are idempotent, so running on every
    /// start is fine.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;

        Ok(())
    }
}
