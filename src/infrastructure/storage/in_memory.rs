//! In-memory database with transactional semantics
//!
//! Useful for testing and development. Data is lost when the process terminates.
//! Units of work read from a private working copy and record their writes in a
//! journal; commit replays the journal against the live tables under the same
//! constraint checks, so a transaction either applies completely or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{
    Conn, NewUser, Role, StoreError, TransactionError, TransactionManager, TxState, UnitOfWork,
    User, UserUpdate,
};

/// Rows held by the in-memory database
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: BTreeMap<i64, User>,
    pub roles: BTreeMap<i64, Role>,
    /// (user_id, role_id)
    pub user_roles: BTreeSet<(i64, i64)>,
}

/// A single write, replayable against any copy of the tables
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    InsertUser(User),
    UpdateUser {
        id: i64,
        update: UserUpdate,
        at: DateTime<Utc>,
    },
    DeleteUser {
        id: i64,
        at: DateTime<Utc>,
    },
    InsertRole(Role),
    SetRole {
        user_id: i64,
        role_id: i64,
    },
    RemoveRole {
        user_id: i64,
        role_id: i64,
    },
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    /// Apply a mutation, checking constraints before anything changes
    pub(crate) fn apply(&mut self, mutation: &Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::InsertUser(user) => {
                if self.email_taken(&user.email, None) {
                    return Err(StoreError::conflict(format!(
                        "email '{}' already registered",
                        user.email
                    )));
                }
                if self.username_taken(&user.username, None) {
                    return Err(StoreError::conflict(format!(
                        "username '{}' already taken",
                        user.username
                    )));
                }
                self.users.insert(user.id, user.clone());
            }
            Mutation::UpdateUser { id, update, at } => {
                if !self.users.get(id).is_some_and(|u| !u.is_deleted) {
                    return Err(StoreError::not_found(format!("user {}", id)));
                }
                if self.email_taken(&update.email, Some(*id)) {
                    return Err(StoreError::conflict(format!(
                        "email '{}' already registered",
                        update.email
                    )));
                }
                if self.username_taken(&update.username, Some(*id)) {
                    return Err(StoreError::conflict(format!(
                        "username '{}' already taken",
                        update.username
                    )));
                }
                if let Some(user) = self.users.get_mut(id) {
                    user.email = update.email.clone();
                    user.username = update.username.clone();
                    user.first_name = update.first_name.clone();
                    user.middle_name = update.middle_name.clone();
                    user.last_name = update.last_name.clone();
                    user.updated_at = *at;
                }
            }
            Mutation::DeleteUser { id, at } => match self.users.get_mut(id) {
                Some(user) if !user.is_deleted => {
                    user.is_deleted = true;
                    user.updated_at = *at;
                }
                _ => return Err(StoreError::not_found(format!("user {}", id))),
            },
            Mutation::InsertRole(role) => {
                if self.roles.values().any(|r| r.name == role.name) {
                    return Err(StoreError::conflict(format!(
                        "role '{}' already exists",
                        role.name
                    )));
                }
                self.roles.insert(role.id, role.clone());
            }
            Mutation::SetRole { user_id, role_id } => {
                if !self.users.contains_key(user_id) {
                    return Err(StoreError::not_found(format!("user {}", user_id)));
                }
                if !self.roles.contains_key(role_id) {
                    return Err(StoreError::not_found(format!("role {}", role_id)));
                }
                if !self.user_roles.insert((*user_id, *role_id)) {
                    return Err(StoreError::conflict(format!(
                        "user {} already has role {}",
                        user_id, role_id
                    )));
                }
            }
            Mutation::RemoveRole { user_id, role_id } => {
                if !self.user_roles.remove(&(*user_id, *role_id)) {
                    return Err(StoreError::not_found(format!(
                        "role {} of user {}",
                        role_id, user_id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Transaction of the in-memory database
#[derive(Debug)]
pub struct MemoryTx {
    working: Tables,
    journal: Vec<Mutation>,
}

/// Operations that can be made to fail or stall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    StartTx,
    CommitTx,
    RollbackTx,
    InsertUser,
    FindUser,
    UpdateUser,
    DeleteUser,
    ListUsers,
    SetRole,
    RemoveRole,
    InsertRole,
    FindRole,
    ListRoles,
    ListUserRoles,
}

/// Injected behaviour at a fail point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Delay(Duration),
}

/// Shared in-memory database; user and role stores built on one instance share transactions
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<HashMap<FailPoint, Fault>>>,
    user_seq: Arc<AtomicI64>,
    role_seq: Arc<AtomicI64>,
}

impl Debug for MemoryDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDb").finish_non_exhaustive()
    }
}

impl MemoryDb {
    /// Creates a new empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database with the given roles already present
    pub fn with_roles(names: &[&str]) -> Self {
        let mut db = Self::new();
        let mut tables = Tables::default();
        for name in names {
            let role = Role {
                id: db.next_role_id(),
                name: name.to_string(),
                created_at: Utc::now(),
            };
            tables.roles.insert(role.id, role);
        }
        db.tables = Arc::new(RwLock::new(tables));
        db
    }

    pub(crate) fn next_user_id(&self) -> i64 {
        self.user_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_role_id(&self) -> i64 {
        self.role_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make an operation fail or stall until [`MemoryDb::clear_faults`]
    pub async fn inject(&self, point: FailPoint, fault: Fault) {
        self.faults.write().await.insert(point, fault);
    }

    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    /// Copy of the committed tables
    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }

    /// Honour an injected fault; `Err` carries the failure message
    async fn hit(&self, point: FailPoint) -> Result<(), String> {
        let fault = self.faults.read().await.get(&point).copied();

        match fault {
            Some(Fault::Error) => Err(format!("injected failure at {:?}", point)),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Gate a store call on its fail point
    pub(crate) async fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        self.hit(point).await.map_err(StoreError::database)
    }

    /// Run a read against the tables visible to `conn`
    pub(crate) async fn read<R>(
        &self,
        conn: Conn<'_, MemoryTx>,
        f: impl FnOnce(&Tables) -> R + Send,
    ) -> Result<R, StoreError> {
        match conn {
            Conn::Pool => Ok(f(&*self.tables.read().await)),
            Conn::Tx(uow) => Ok(f(&uow.connection()?.working)),
        }
    }

    /// Apply a write: immediately on the pool, or journaled inside a unit of work
    pub(crate) async fn write(
        &self,
        conn: Conn<'_, MemoryTx>,
        mutation: Mutation,
    ) -> Result<(), StoreError> {
        match conn {
            Conn::Pool => self.tables.write().await.apply(&mutation),
            Conn::Tx(uow) => {
                let tx = uow.connection()?;
                tx.working.apply(&mutation)?;
                tx.journal.push(mutation);
                Ok(())
            }
        }
    }

    pub(crate) fn new_user(&self, user: &NewUser) -> User {
        let now = Utc::now();

        User {
            id: self.next_user_id(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            middle_name: user.middle_name.clone(),
            last_name: user.last_name.clone(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }
}

#[async_trait]
impl TransactionManager for MemoryDb {
    type Tx = MemoryTx;

    async fn start_tx(&self) -> Result<UnitOfWork<MemoryTx>, TransactionError> {
        self.hit(FailPoint::StartTx)
            .await
            .map_err(TransactionError::begin)?;

        let working = self.tables.read().await.clone();
        let uow = UnitOfWork::new(MemoryTx {
            working,
            journal: Vec::new(),
        });

        debug!(unit_of_work = %uow.id(), "Transaction started");
        Ok(uow)
    }

    async fn commit_tx(&self, uow: &mut UnitOfWork<MemoryTx>) -> Result<(), TransactionError> {
        let tx = uow
            .release(TxState::Committed)
            .ok_or(TransactionError::NoActiveTransaction)?;

        if let Err(message) = self.hit(FailPoint::CommitTx).await {
            uow.mark(TxState::RolledBack);
            return Err(TransactionError::commit(message));
        }

        let mut live = self.tables.write().await;
        let mut next = live.clone();
        for mutation in &tx.journal {
            if let Err(e) = next.apply(mutation) {
                uow.mark(TxState::RolledBack);
                return Err(TransactionError::commit(e.to_string()));
            }
        }
        *live = next;

        debug!(unit_of_work = %uow.id(), writes = tx.journal.len(), "Transaction committed");
        Ok(())
    }

    async fn rollback_tx(&self, uow: &mut UnitOfWork<MemoryTx>) -> Result<(), TransactionError> {
        if !uow.is_active() {
            return Ok(());
        }

        self.hit(FailPoint::RollbackTx)
            .await
            .map_err(TransactionError::rollback)?;

        if let Some(tx) = uow.release(TxState::RolledBack) {
            debug!(unit_of_work = %uow.id(), discarded = tx.journal.len(), "Transaction rolled back");
        }

        Ok(())
    }
}
