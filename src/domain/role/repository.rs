//! Role store trait

use async_trait::async_trait;

use super::entity::Role;
use crate::domain::error::StoreError;
use crate::domain::transaction::{Conn, TransactionManager};

/// Persistence capabilities for roles
#[async_trait]
pub trait RoleStore: TransactionManager {
    /// Insert a role and return its generated id
    async fn insert_one(&self, conn: Conn<'_, Self::Tx>, name: &str) -> Result<i64, StoreError>;

    /// Find a role by id
    async fn find_one_by_id(&self, conn: Conn<'_, Self::Tx>, id: i64) -> Result<Option<Role>, StoreError>;

    /// Find a role by its unique name
    async fn find_one_by_name(
        &self,
        conn: Conn<'_, Self::Tx>,
        name: &str,
    ) -> Result<Option<Role>, StoreError>;

    /// List all roles
    async fn list_all(&self, conn: Conn<'_, Self::Tx>) -> Result<Vec<Role>, StoreError>;

    /// List the roles currently assigned to a user
    async fn list_user_roles(&self, conn: Conn<'_, Self::Tx>, user_id: i64) -> Result<Vec<Role>, StoreError>;
}
