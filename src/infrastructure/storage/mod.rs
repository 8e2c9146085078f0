//! Storage backends: PostgreSQL and an in-memory database for tests and development

mod in_memory;
mod postgres;

pub use in_memory::{FailPoint, Fault, MemoryDb, MemoryTx, Tables};
pub(crate) use in_memory::Mutation;
pub(crate) use postgres::map_sqlx_error;
pub use postgres::{PgTx, PostgresConfig, PostgresDb};
