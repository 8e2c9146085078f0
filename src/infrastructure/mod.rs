//! Infrastructure layer - Token, storage and logging implementations

pub mod auth;
pub mod logging;
pub mod role;
pub mod storage;
pub mod user;
