//! In-memory role store implementation

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Conn, Role, RoleStore, StoreError, TransactionError, TransactionManager, UnitOfWork};
use crate::infrastructure::storage::{FailPoint, MemoryDb, MemoryTx, Mutation};

/// In-memory implementation of RoleStore
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    db: MemoryDb,
}

impl InMemoryRoleStore {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionManager for InMemoryRoleStore {
    type Tx = MemoryTx;

    async fn start_tx(&self) -> Result<UnitOfWork<MemoryTx>, TransactionError> {
        self.db.start_tx().await
    }

    async fn commit_tx(&self, uow: &mut UnitOfWork<MemoryTx>) -> Result<(), TransactionError> {
        self.db.commit_tx(uow).await
    }

    async fn rollback_tx(&self, uow: &mut UnitOfWork<MemoryTx>) -> Result<(), TransactionError> {
        self.db.rollback_tx(uow).await
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn insert_one(&self, conn: Conn<'_, MemoryTx>, name: &str) -> Result<i64, StoreError> {
        self.db.check(FailPoint::InsertRole).await?;

        let role = Role {
            id: self.db.next_role_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = role.id;
        self.db.write(conn, Mutation::InsertRole(role)).await?;

        Ok(id)
    }

    async fn find_one_by_id(
        &self,
        conn: Conn<'_, MemoryTx>,
        id: i64,
    ) -> Result<Option<Role>, StoreError> {
        self.db.check(FailPoint::FindRole).await?;
        self.db.read(conn, |t| t.roles.get(&id).cloned()).await
    }

    async fn find_one_by_name(
        &self,
        conn: Conn<'_, MemoryTx>,
        name: &str,
    ) -> Result<Option<Role>, StoreError> {
        self.db.check(FailPoint::FindRole).await?;
        self.db
            .read(conn, |t| t.roles.values().find(|r| r.name == name).cloned())
            .await
    }

    async fn list_all(&self, conn: Conn<'_, MemoryTx>) -> Result<Vec<Role>, StoreError> {
        self.db.check(FailPoint::ListRoles).await?;
        self.db
            .read(conn, |t| t.roles.values().cloned().collect())
            .await
    }

    async fn list_user_roles(
        &self,
        conn: Conn<'_, MemoryTx>,
        user_id: i64,
    ) -> Result<Vec<Role>, StoreError> {
        self.db.check(FailPoint::ListUserRoles).await?;
        self.db
            .read(conn, |t| {
                t.user_roles
                    .iter()
                    .filter(|(uid, _)| *uid == user_id)
                    .filter_map(|(_, role_id)| t.roles.get(role_id).cloned())
                    .collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewUser, UserStore};
    use crate::infrastructure::user::InMemoryUserStore;

    #[tokio::test]
    async fn test_seeded_roles() {
        let store = InMemoryRoleStore::new(MemoryDb::with_roles(&["default", "admin"]));

        let default = store.find_one_by_name(Conn::Pool, "default").await.unwrap().unwrap();
        assert_eq!(default.id, 1);
        assert_eq!(store.find_one_by_id(Conn::Pool, 2).await.unwrap().unwrap().name, "admin");
        assert!(store.find_one_by_name(Conn::Pool, "Default").await.unwrap().is_none());
        assert_eq!(store.list_all(Conn::Pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_role_and_conflict() {
        let store = InMemoryRoleStore::new(MemoryDb::with_roles(&["default"]));

        let id = store.insert_one(Conn::Pool, "auditor").await.unwrap();
        assert_eq!(id, 2);

        let err = store.insert_one(Conn::Pool, "auditor").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_user_roles_follows_assignments() {
        let db = MemoryDb::with_roles(&["default", "admin"]);
        let users = InMemoryUserStore::new(db.clone());
        let roles = InMemoryRoleStore::new(db);

        let user_id = users
            .insert_one(
                Conn::Pool,
                &NewUser {
                    email: "ada@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    username: "ada".to_string(),
                    first_name: String::new(),
                    middle_name: String::new(),
                    last_name: String::new(),
                },
            )
            .await
            .unwrap();

        users.set_role(Conn::Pool, user_id, 1).await.unwrap();
        users.set_role(Conn::Pool, user_id, 2).await.unwrap();
        let names: Vec<String> = roles
            .list_user_roles(Conn::Pool, user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["default", "admin"]);

        users.remove_role(Conn::Pool, user_id, 2).await.unwrap();
        assert_eq!(roles.list_user_roles(Conn::Pool, user_id).await.unwrap().len(), 1);
    }
}
