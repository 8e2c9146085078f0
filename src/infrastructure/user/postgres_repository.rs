//! PostgreSQL user store implementation

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::{
    Conn, NewUser, StoreError, TransactionError, TransactionManager, UnitOfWork, User, UserStore,
    UserUpdate,
};
use crate::infrastructure::storage::{map_sqlx_error, PgTx, PostgresDb};

const USER_COLUMNS: &str = "id, email, password_hash, username, first_name, middle_name, \
                            last_name, created_at, updated_at, is_deleted";

/// PostgreSQL implementation of UserStore
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    db: PostgresDb,
}

impl PostgresUserStore {
    pub fn new(db: PostgresDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionManager for PostgresUserStore {
    type Tx = PgTx;

    async fn start_tx(&self) -> Result<UnitOfWork<PgTx>, TransactionError> {
        self.db.start_tx().await
    }

    async fn commit_tx(&self, uow: &mut UnitOfWork<PgTx>) -> Result<(), TransactionError> {
        self.db.commit_tx(uow).await
    }

    async fn rollback_tx(&self, uow: &mut UnitOfWork<PgTx>) -> Result<(), TransactionError> {
        self.db.rollback_tx(uow).await
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn insert_one(&self, conn: Conn<'_, PgTx>, user: &NewUser) -> Result<i64, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (email, password_hash, username, first_name, middle_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.last_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert user", e))
    }

    async fn find_one_by_id(&self, conn: Conn<'_, PgTx>, id: i64) -> Result<Option<User>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("find user", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_one_by_email(
        &self,
        conn: Conn<'_, PgTx>,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("find user by email", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update_one(
        &self,
        conn: Conn<'_, PgTx>,
        id: i64,
        update: &UserUpdate,
    ) -> Result<(), StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, username = $3, first_name = $4, middle_name = $5,
                last_name = $6, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .bind(&update.email)
        .bind(&update.username)
        .bind(&update.first_name)
        .bind(&update.middle_name)
        .bind(&update.last_name)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {}", id)));
        }

        Ok(())
    }

    async fn delete_one(&self, conn: Conn<'_, PgTx>, id: i64) -> Result<(), StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let result = sqlx::query(
            "UPDATE users SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("user {}", id)));
        }

        Ok(())
    }

    async fn list_all(&self, conn: Conn<'_, PgTx>) -> Result<Vec<User>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let query = format!(
            "SELECT {} FROM users WHERE NOT is_deleted ORDER BY id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list users", e))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn set_role(&self, conn: Conn<'_, PgTx>, user_id: i64, role_id: i64) -> Result<(), StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("set user role", e))?;

        Ok(())
    }

    async fn remove_role(
        &self,
        conn: Conn<'_, PgTx>,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("remove user role", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!(
                "role {} of user {}",
                role_id, user_id
            )));
        }

        Ok(())
    }
}

fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
    let decode = |e: sqlx::Error| StoreError::database(format!("decode user row: {}", e));

    Ok(User {
        id: row.try_get("id").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        first_name: row.try_get("first_name").map_err(decode)?,
        middle_name: row.try_get("middle_name").map_err(decode)?,
        last_name: row.try_get("last_name").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
        is_deleted: row.try_get("is_deleted").map_err(decode)?,
    })
}
