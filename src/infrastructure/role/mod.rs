//! Role store implementations

mod postgres_repository;
mod repository;

pub use postgres_repository::PostgresRoleStore;
pub use repository::InMemoryRoleStore;
