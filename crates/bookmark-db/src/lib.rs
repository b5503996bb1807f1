//! # bookmark-db
//!
//! PostgreSQL storage for the bookmark service: the pool, keyset page
//! queries rendered from planned [`OrderedQuery`] values, the production
//! [`PgBookmarkRepository`] and an in-memory [`MemoryBookmarkRepository`]
//! with the same ordering semantics.
//!
//! ```rust,ignore
//! use bookmark_db::{BookmarkFilter, Database, Paginator, PoolConfig};
//!
//! let db = Database::connect_with_config(url, PoolConfig::new().max_connections(4)).await?;
//! db.migrate().await?;
//! let page = Paginator::default()
//!     .list(&db.bookmarks, &BookmarkFilter::default(), None, Some(20))
//!     .await?;
//! ```

pub mod bookmarks;
pub mod memory;
pub mod pool;
pub mod query;

// Test fixtures for integration tests (in tests/); they migrate a scratch schema.
#[cfg(feature = "migrations")]
pub mod test_fixtures;

use std::sync::Arc;
#[cfg(feature = "migrations")]
use std::time::Instant;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::PgPool;
#[cfg(feature = "migrations")]
use tracing::info;

pub use bookmark_core::*;

pub use bookmarks::PgBookmarkRepository;
pub use memory::MemoryBookmarkRepository;
pub use pool::{create_pool_with_config, log_pool_metrics, PoolConfig};
pub use query::{BookmarkQueryBuilder, QueryParam};

/// Current time at the microsecond precision PostgreSQL stores.
///
/// Values handed back from a write then compare equal to the same row read later.
pub(crate) fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Embedded schema migrations from the workspace `migrations/` directory.
#[cfg(feature = "migrations")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// A pool and the repositories sharing it.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
    pub bookmarks: PgBookmarkRepository,
}

impl Database {
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            bookmarks: PgBookmarkRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        create_pool_with_config(url, config).await.map(Self::from_pool)
    }

    /// Apply migrations not yet recorded in `_sqlx_migrations`.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        let start = Instant::now();
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "db",
            op = "migrate",
            known_migrations = MIGRATOR.iter().count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Schema up to date"
        );
        Ok(())
    }

    /// The bookmark repository as a shareable trait object.
    pub fn repository(&self) -> Arc<dyn BookmarkRepository> {
        Arc::new(self.bookmarks.clone())
    }
}
