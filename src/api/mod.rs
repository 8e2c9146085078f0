//! API layer - HTTP endpoints and extractors

pub mod admin;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use middleware::{RequireAdmin, RequireUser};
pub use router::create_router;
pub use state::{AppState, AuthServiceTrait};
