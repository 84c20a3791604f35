//! User domain model.
//!
//! Users exist so bookings have someone to validate against; account
//! management itself lives outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::DomainError;

/// Unique identifier for a User.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random UserId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a UserId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What a user is allowed to do with spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Books spaces
    Renter,
    /// Lists spaces for others to book
    Lister,
}

impl AsRef<str> for UserRole {
    fn as_ref(&self) -> &str {
        match self {
            UserRole::Renter => "RENTER",
            UserRole::Lister => "LISTER",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact address for payment notifications
    pub email: String,
    /// Role deciding booking permissions
    pub role: UserRole,
    /// When the user was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user.
    pub fn new(name: String, email: String, role: UserRole) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "user name cannot be empty".into(),
            ));
        }
        if email.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "user email cannot be empty".into(),
            ));
        }
        Ok(Self {
            id: UserId::new(),
            name,
            email,
            role,
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a user from database fields.
    pub fn from_parts(
        id: UserId,
        name: String,
        email: String,
        role: UserRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            role,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let user = User::new("Asha".into(), "asha@example.com".into(), UserRole::Renter).unwrap();
        assert_eq!(user.role, UserRole::Renter);
        assert_eq!(user.email, "asha@example.com");
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = User::new("  ".into(), "x@example.com".into(), UserRole::Lister);
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_empty_email_rejected() {
        let result = User::new("Asha".into(), "".into(), UserRole::Renter);
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }
}
