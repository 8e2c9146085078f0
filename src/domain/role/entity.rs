//! Role entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned to every user on registration
pub const DEFAULT_ROLE: &str = "default";

/// Stored role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn to_ref(&self) -> RoleRef {
        RoleRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Role as carried in tokens and API responses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: i64,
    pub name: String,
}

impl RoleRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ref_wire_shape() {
        let json = serde_json::to_value(RoleRef::new(4, "admin")).unwrap();
        assert_eq!(json, serde_json::json!({"id": 4, "name": "admin"}));
    }

    #[test]
    fn test_to_ref() {
        let role = Role {
            id: 1,
            name: DEFAULT_ROLE.to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(role.to_ref(), RoleRef::new(1, "default"));
    }
}
