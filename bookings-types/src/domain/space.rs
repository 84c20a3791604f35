//! Space domain model: the thing that gets booked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use super::user::UserId;
use crate::error::DomainError;

/// Unique identifier for a Space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SpaceId(Uuid);

impl SpaceId {
    /// Creates a new random SpaceId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SpaceId from an existing UUID.
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

impl Default for SpaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SpaceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A bookable space with a per-day rate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    /// Unique identifier
    pub id: SpaceId,
    /// The lister offering this space
    pub lister_id: UserId,
    /// Display name
    pub name: String,
    /// Price per day, in smallest currency unit
    pub day_rate: Money,
    /// When the space was listed
    pub created_at: DateTime<Utc>,
}

impl Space {
    /// Creates a new space listing.
    pub fn new(lister_id: UserId, name: String, day_rate: Money) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "space name cannot be empty".into(),
            ));
        }
        Ok(Self {
            id: SpaceId::new(),
            lister_id,
            name,
            day_rate,
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a space from database fields.
    pub fn from_parts(
        id: SpaceId,
        lister_id: UserId,
        name: String,
        day_rate: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            lister_id,
            name,
            day_rate,
            created_at,
        }
    }
}
