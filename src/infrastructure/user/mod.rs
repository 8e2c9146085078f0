//! User store implementations

mod postgres_repository;
mod repository;

pub use postgres_repository::PostgresUserStore;
pub use repository::InMemoryUserStore;
