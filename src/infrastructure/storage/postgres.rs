//! PostgreSQL connection pool and transaction handling

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use crate::domain::{Conn, StoreError, TransactionError, TransactionManager, TxState, UnitOfWork};

/// Transaction type carried by PostgreSQL units of work
pub type PgTx = Transaction<'static, Postgres>;

/// PostgreSQL storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/authgate".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }
}

/// Map a driver error to a store error, recognising constraint violations
pub(crate) fn map_sqlx_error(context: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::conflict(format!("{}: {}", context, db_err.message()));
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::not_found(format!("{}: {}", context, db_err.message()));
        }
    }

    StoreError::database(format!("{}: {}", context, err))
}

/// Connection used for a single store call
pub(crate) enum Acquired<'a> {
    Pooled(PoolConnection<Postgres>),
    Tx(&'a mut PgTx),
}

impl Deref for Acquired<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Pooled(conn) => conn,
            Self::Tx(tx) => tx,
        }
    }
}

impl DerefMut for Acquired<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Pooled(conn) => conn,
            Self::Tx(tx) => tx,
        }
    }
}

/// Shared PostgreSQL pool; stores built on it share one transaction type
#[derive(Debug, Clone)]
pub struct PostgresDb {
    pool: PgPool,
}

impl PostgresDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");

        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve where a store call runs
    pub(crate) async fn acquire<'a>(&self, conn: Conn<'a, PgTx>) -> Result<Acquired<'a>, StoreError> {
        match conn {
            Conn::Pool => self
                .pool
                .acquire()
                .await
                .map(Acquired::Pooled)
                .map_err(|e| map_sqlx_error("acquire connection", e)),
            Conn::Tx(uow) => Ok(Acquired::Tx(uow.connection()?)),
        }
    }
}

#[async_trait]
impl TransactionManager for PostgresDb {
    type Tx = PgTx;

    async fn start_tx(&self) -> Result<UnitOfWork<PgTx>, TransactionError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TransactionError::begin(e.to_string()))?;

        let uow = UnitOfWork::new(tx);
        debug!(unit_of_work = %uow.id(), "Transaction started");
        Ok(uow)
    }

    async fn commit_tx(&self, uow: &mut UnitOfWork<PgTx>) -> Result<(), TransactionError> {
        let tx = uow
            .release(TxState::Committed)
            .ok_or(TransactionError::NoActiveTransaction)?;

        if let Err(e) = tx.commit().await {
            // A failed COMMIT leaves nothing to roll back
            uow.mark(TxState::RolledBack);
            return Err(TransactionError::commit(e.to_string()));
        }

        debug!(unit_of_work = %uow.id(), "Transaction committed");
        Ok(())
    }

    async fn rollback_tx(&self, uow: &mut UnitOfWork<PgTx>) -> Result<(), TransactionError> {
        let Some(tx) = uow.release(TxState::RolledBack) else {
            return Ok(());
        };

        tx.rollback()
            .await
            .map_err(|e| TransactionError::rollback(e.to_string()))?;

        debug!(unit_of_work = %uow.id(), "Transaction rolled back");
        Ok(())
    }
}
