//! PostgreSQL role store implementation

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::{Conn, Role, RoleStore, StoreError, TransactionError, TransactionManager, UnitOfWork};
use crate::infrastructure::storage::{map_sqlx_error, PgTx, PostgresDb};

/// PostgreSQL implementation of RoleStore
#[derive(Debug, Clone)]
pub struct PostgresRoleStore {
    db: PostgresDb,
}

impl PostgresRoleStore {
    pub fn new(db: PostgresDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionManager for PostgresRoleStore {
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
impl RoleStore for PostgresRoleStore {
    async fn insert_one(&self, conn: Conn<'_, PgTx>, name: &str) -> Result<i64, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        sqlx::query_scalar::<_, i64>("INSERT INTO roles (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert role", e))
    }

    async fn find_one_by_id(&self, conn: Conn<'_, PgTx>, id: i64) -> Result<Option<Role>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("find role", e))?;

        row.as_ref().map(row_to_role).transpose()
    }

    async fn find_one_by_name(
        &self,
        conn: Conn<'_, PgTx>,
        name: &str,
    ) -> Result<Option<Role>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("find role by name", e))?;

        row.as_ref().map(row_to_role).transpose()
    }

    async fn list_all(&self, conn: Conn<'_, PgTx>) -> Result<Vec<Role>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let rows = sqlx::query("SELECT id, name, created_at FROM roles ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list roles", e))?;

        rows.iter().map(row_to_role).collect()
    }

    async fn list_user_roles(&self, conn: Conn<'_, PgTx>, user_id: i64) -> Result<Vec<Role>, StoreError> {
        let mut conn = self.db.acquire(conn).await?;

        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.created_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list user roles", e))?;

        rows.iter().map(row_to_role).collect()
    }
}

fn row_to_role(row: &PgRow) -> Result<Role, StoreError> {
    let decode = |e: sqlx::Error| StoreError::database(format!("decode role row: {}", e));

    Ok(Role {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}
