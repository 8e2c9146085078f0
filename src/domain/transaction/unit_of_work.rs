//! Unit of work: one logical operation bound to one database transaction

use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Transaction lifecycle failures
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("no active transaction")]
    NoActiveTransaction,

    #[error("start transaction: {message}")]
    Begin { message: String },

    #[error("commit transaction: {message}")]
    Commit { message: String },

    #[error("rollback transaction: {message}")]
    Rollback { message: String },

    #[error("operation deadline of {}ms exceeded", .timeout.as_millis())]
    DeadlineExceeded { timeout: Duration },
}

impl TransactionError {
    pub fn begin(message: impl Into<String>) -> Self {
        Self::Begin {
            message: message.into(),
        }
    }

    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    pub fn rollback(message: impl Into<String>) -> Self {
        Self::Rollback {
            message: message.into(),
        }
    }
}

/// Lifecycle state of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// Handle to a single open transaction.
///
/// The handle is owned by the operation that started it and is lent to store
/// calls through [`Conn::Tx`]. It cannot be cloned, so two operations can
/// never share it. Committing or rolling back releases the inner transaction;
/// a released handle refuses further use. Dropping a handle that is still
/// active drops the inner transaction, which backends treat as a rollback.
pub struct UnitOfWork<T> {
    id: Uuid,
    tx: Option<T>,
    state: TxState,
}

impl<T> UnitOfWork<T> {
    pub fn new(tx: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx: Some(tx),
            state: TxState::Active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// The connection bound to this unit of work
    pub fn connection(&mut self) -> Result<&mut T, TransactionError> {
        self.tx.as_mut().ok_or(TransactionError::NoActiveTransaction)
    }

    /// Detach the inner transaction, recording how it is being finished.
    ///
    /// Returns `None` when the unit of work was already released.
    pub fn release(&mut self, outcome: TxState) -> Option<T> {
        let tx = self.tx.take()?;
        self.state = outcome;
        Some(tx)
    }

    /// Record the final state after the backend reported the outcome
    pub fn mark(&mut self, state: TxState) {
        self.state = state;
    }
}

impl<T> Debug for UnitOfWork<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl<T> Drop for UnitOfWork<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(unit_of_work = %self.id, "Unit of work dropped while active; discarding transaction");
        }
    }
}

/// Where a store call runs: on a pooled connection or inside a unit of work
#[derive(Debug)]
pub enum Conn<'a, T> {
    Pool,
    Tx(&'a mut UnitOfWork<T>),
}

impl<'a, T> From<&'a mut UnitOfWork<T>> for Conn<'a, T> {
    fn from(uow: &'a mut UnitOfWork<T>) -> Self {
        Self::Tx(uow)
    }
}

/// Starts and finishes units of work against a backend
#[async_trait]
pub trait TransactionManager: Send + Sync + Debug {
    /// Backend transaction carried by a unit of work
    type Tx: Send + 'static;

    /// Begin a new transaction
    async fn start_tx(&self) -> Result<UnitOfWork<Self::Tx>, TransactionError>;

    /// Commit the transaction; fails with `NoActiveTransaction` if already released
    async fn commit_tx(&self, uow: &mut UnitOfWork<Self::Tx>) -> Result<(), TransactionError>;

    /// Roll back the transaction; a released unit of work is a no-op
    async fn rollback_tx(&self, uow: &mut UnitOfWork<Self::Tx>) -> Result<(), TransactionError>;
}
