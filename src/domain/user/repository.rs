//! User store trait

use async_trait::async_trait;

use super::entity::{NewUser, User, UserUpdate};
use crate::domain::error::StoreError;
use crate::domain::transaction::{Conn, TransactionManager};

/// Persistence capabilities for users and their role assignments.
///
/// Every call takes a [`Conn`]: `Conn::Pool` runs on its own pooled
/// connection, `Conn::Tx` runs inside the caller's unit of work.
#[async_trait]
pub trait UserStore: TransactionManager {
    /// Insert a user and return its generated id
    async fn insert_one(&self, conn: Conn<'_, Self::Tx>, user: &NewUser) -> Result<i64, StoreError>;

    /// Find a user by id, including soft-deleted ones
    async fn find_one_by_id(&self, conn: Conn<'_, Self::Tx>, id: i64) -> Result<Option<User>, StoreError>;

    /// Find a user by its unique email
    async fn find_one_by_email(
        &self,
        conn: Conn<'_, Self::Tx>,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Update profile fields; `NotFound` when no live user matched
    async fn update_one(
        &self,
        conn: Conn<'_, Self::Tx>,
        id: i64,
        update: &UserUpdate,
    ) -> Result<(), StoreError>;

    /// Soft-delete a user; `NotFound` when no live user matched
    async fn delete_one(&self, conn: Conn<'_, Self::Tx>, id: i64) -> Result<(), StoreError>;

    /// List all live users
    async fn list_all(&self, conn: Conn<'_, Self::Tx>) -> Result<Vec<User>, StoreError>;

    /// Assign a role to a user
    async fn set_role(&self, conn: Conn<'_, Self::Tx>, user_id: i64, role_id: i64) -> Result<(), StoreError>;

    /// Remove a role assignment; `NotFound` when the pair did not exist
    async fn remove_role(
        &self,
        conn: Conn<'_, Self::Tx>,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), StoreError>;
}
