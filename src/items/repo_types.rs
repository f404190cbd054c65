use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The authenticated caller, as seen by item queries.
///
/// Only the auth extractor hands these out, so every item query is scoped
/// to a user that actually proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub(crate) fn authenticated(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// `limit: None` means every remaining row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}
