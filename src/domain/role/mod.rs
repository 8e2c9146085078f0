//! Role domain

mod entity;
mod repository;

pub use entity::{Role, RoleRef, DEFAULT_ROLE};
pub use repository::RoleStore;
