//! Persistence boundary.
//!
//! Handlers never see a connection pool; they open a [`StoreTx`], run typed
//! queries against it and commit. Dropping a transaction without committing
//! rolls it back, so any early return through `?` (or a cancelled request)
//! leaves no partial writes behind.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    items::repo_types::{Item, ItemChanges, NewItem, OwnerId, Page},
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One request-scoped transaction.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError>;

    async fn insert_item(&mut self, owner: OwnerId, item: &NewItem) -> Result<Item, StoreError>;

    /// Newest first.
    async fn list_items_by_owner(
        &mut self,
        owner: OwnerId,
        page: Page,
    ) -> Result<Vec<Item>, StoreError>;

    async fn find_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<Option<Item>, StoreError>;

    async fn update_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
