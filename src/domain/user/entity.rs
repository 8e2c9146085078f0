//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    validate_email, validate_name, validate_password, validate_username, UserValidationError,
};

/// Stored user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub username: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl User {
    /// Build the public view of this user
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            middle_name: self.middle_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Values for inserting a user; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

/// Mutable profile fields
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_email(&self.email)?;
        validate_username(&self.username)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("middle_name", &self.middle_name)?;
        validate_name("last_name", &self.last_name)?;
        Ok(())
    }
}

/// User data safe to hand out (no password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Register request
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_username(&self.username)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("middle_name", &self.middle_name)?;
        validate_name("last_name", &self.last_name)?;
        Ok(())
    }

    /// Turn the request into insert values carrying an already computed hash
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            email: self.email,
            password_hash,
            username: self.username,
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
        }
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[hidden]")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Login request
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[hidden]")
            .finish()
    }
}
