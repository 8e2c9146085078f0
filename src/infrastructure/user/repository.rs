//! In-memory user store implementation

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    Conn, NewUser, StoreError, TransactionError, TransactionManager, UnitOfWork, User, UserStore,
    UserUpdate,
};
use crate::infrastructure::storage::{FailPoint, MemoryDb, MemoryTx, Mutation};

/// In-memory implementation of UserStore
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    db: MemoryDb,
}

impl InMemoryUserStore {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionManager for InMemoryUserStore {
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
impl UserStore for InMemoryUserStore {
    async fn insert_one(&self, conn: Conn<'_, MemoryTx>, user: &NewUser) -> Result<i64, StoreError> {
        self.db.check(FailPoint::InsertUser).await?;

        let user = self.db.new_user(user);
        let id = user.id;
        self.db.write(conn, Mutation::InsertUser(user)).await?;

        Ok(id)
    }

    async fn find_one_by_id(
        &self,
        conn: Conn<'_, MemoryTx>,
        id: i64,
    ) -> Result<Option<User>, StoreError> {
        self.db.check(FailPoint::FindUser).await?;
        self.db.read(conn, |t| t.users.get(&id).cloned()).await
    }

    async fn find_one_by_email(
        &self,
        conn: Conn<'_, MemoryTx>,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        self.db.check(FailPoint::FindUser).await?;
        self.db
            .read(conn, |t| t.users.values().find(|u| u.email == email).cloned())
            .await
    }

    async fn update_one(
        &self,
        conn: Conn<'_, MemoryTx>,
        id: i64,
        update: &UserUpdate,
    ) -> Result<(), StoreError> {
        self.db.check(FailPoint::UpdateUser).await?;

        let mutation = Mutation::UpdateUser {
            id,
            update: update.clone(),
            at: Utc::now(),
        };
        self.db.write(conn, mutation).await
    }

    async fn delete_one(&self, conn: Conn<'_, MemoryTx>, id: i64) -> Result<(), StoreError> {
        self.db.check(FailPoint::DeleteUser).await?;
        self.db
            .write(conn, Mutation::DeleteUser { id, at: Utc::now() })
            .await
    }

    async fn list_all(&self, conn: Conn<'_, MemoryTx>) -> Result<Vec<User>, StoreError> {
        self.db.check(FailPoint::ListUsers).await?;
        self.db
            .read(conn, |t| {
                t.users.values().filter(|u| !u.is_deleted).cloned().collect()
            })
            .await
    }

    async fn set_role(
        &self,
        conn: Conn<'_, MemoryTx>,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), StoreError> {
        self.db.check(FailPoint::SetRole).await?;
        self.db
            .write(conn, Mutation::SetRole { user_id, role_id })
            .await
    }

    async fn remove_role(
        &self,
        conn: Conn<'_, MemoryTx>,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), StoreError> {
        self.db.check(FailPoint::RemoveRole).await?;
        self.db
            .write(conn, Mutation::RemoveRole { user_id, role_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$test".to_string(),
            username: username.to_string(),
            first_name: "Ada".to_string(),
            middle_name: String::new(),
            last_name: "Lovelace".to_string(),
        }
    }

    fn update(email: &str, username: &str) -> UserUpdate {
        UserUpdate {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Augusta".to_string(),
            middle_name: String::new(),
            last_name: "King".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::default();

        let id = store
            .insert_one(Conn::Pool, &new_user("ada@example.com", "ada"))
            .await
            .unwrap();

        let by_id = store.find_one_by_id(Conn::Pool, id).await.unwrap().unwrap();
        let by_email = store
            .find_one_by_email(Conn::Pool, "ada@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(by_id, by_email);
        assert_eq!(by_id.username, "ada");
        assert!(!by_id.is_deleted);
        assert!(store.find_one_by_email(Conn::Pool, "nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = InMemoryUserStore::default();

        let first = store.insert_one(Conn::Pool, &new_user("a@example.com", "a1")).await.unwrap();
        let second = store.insert_one(Conn::Pool, &new_user("b@example.com", "b1")).await.unwrap();

        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryUserStore::default();
        store.insert_one(Conn::Pool, &new_user("ada@example.com", "ada")).await.unwrap();

        let err = store
            .insert_one(Conn::Pool, &new_user("ada@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_and_soft_delete() {
        let store = InMemoryUserStore::default();
        let id = store.insert_one(Conn::Pool, &new_user("ada@example.com", "ada")).await.unwrap();

        store
            .update_one(Conn::Pool, id, &update("augusta@example.com", "augusta"))
            .await
            .unwrap();
        let updated = store.find_one_by_id(Conn::Pool, id).await.unwrap().unwrap();
        assert_eq!(updated.email, "augusta@example.com");
        assert_eq!(updated.last_name, "King");

        store.delete_one(Conn::Pool, id).await.unwrap();
        let deleted = store.find_one_by_id(Conn::Pool, id).await.unwrap().unwrap();
        assert!(deleted.is_deleted);
        assert!(store.list_all(Conn::Pool).await.unwrap().is_empty());

        assert!(matches!(
            store.delete_one(Conn::Pool, id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.update_one(Conn::Pool, id, &update("x@example.com", "x1")).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let store = InMemoryUserStore::new(MemoryDb::with_roles(&["default"]));

        assert!(matches!(
            store.delete_one(Conn::Pool, 404).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove_role(Conn::Pool, 404, 1).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_writes_in_unit_of_work_share_one_transaction() {
        let store = InMemoryUserStore::new(MemoryDb::with_roles(&["default"]));
        let mut uow = store.start_tx().await.unwrap();

        let id = store
            .insert_one(Conn::Tx(&mut uow), &new_user("ada@example.com", "ada"))
            .await
            .unwrap();
        store.set_role(Conn::Tx(&mut uow), id, 1).await.unwrap();

        assert!(store.find_one_by_id(Conn::Pool, id).await.unwrap().is_none());

        store.commit_tx(&mut uow).await.unwrap();
        assert!(store.find_one_by_id(Conn::Pool, id).await.unwrap().is_some());
    }
}
