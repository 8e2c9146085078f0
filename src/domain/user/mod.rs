//! User domain
//!
//! This module provides domain types and traits for user accounts,
//! including user entities, request validation, and the store trait.

mod entity;
mod repository;
mod validation;

pub use entity::{LoginRequest, NewUser, RegisterRequest, User, UserProfile, UserUpdate};
pub use repository::UserStore;
pub use validation::{
    validate_email, validate_name, validate_password, validate_username, UserValidationError,
};
