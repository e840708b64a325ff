use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    /// Convert from identity provider claim
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "moderator" => Ok(Role::Admin),
            "member" | "user" | "student" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

/// Authenticated caller, taken as given from the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn admin(id: Uuid) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn member(id: Uuid) -> Self {
        Self { id, role: Role::Member }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Unauthorized` unless the caller moderates listings
    pub fn require_admin(&self) -> AppResult<()> {
        if !self.is_admin() {
            return Err(AppError::Unauthorized(format!(
                "user {} is not an admin",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str(" Admin ").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("student").unwrap(), Role::Member);
        assert!(Role::from_str("root").is_err());
    }

    #[test]
    fn test_require_admin() {
        let id = Uuid::new_v4();
        assert!(Caller::admin(id).require_admin().is_ok());
        assert!(matches!(
            Caller::member(id).require_admin(),
            Err(AppError::Unauthorized(_))
        ));
    }
}
