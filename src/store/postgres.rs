use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::{
    auth::repo_types::{NewUser, User},
    items::repo_types::{Item, ItemChanges, NewItem, OwnerId, Page},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Wraps a sqlx transaction; sqlx rolls it back on drop.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        User::find_by_id(&mut self.tx, id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        User::find_by_email(&mut self.tx, email).await
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        User::create(&mut self.tx, user).await
    }

    async fn insert_item(&mut self, owner: OwnerId, item: &NewItem) -> Result<Item, StoreError> {
        Item::create(&mut self.tx, owner, item).await
    }

    async fn list_items_by_owner(
        &mut self,
        owner: OwnerId,
        page: Page,
    ) -> Result<Vec<Item>, StoreError> {
        Item::list_by_owner(&mut self.tx, owner, page).await
    }

    async fn find_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<Option<Item>, StoreError> {
        Item::find_by_id_and_owner(&mut self.tx, id, owner).await
    }

    async fn update_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, StoreError> {
        Item::update_by_id_and_owner(&mut self.tx, id, owner, changes).await
    }

    async fn delete_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<bool, StoreError> {
        Item::delete_by_id_and_owner(&mut self.tx, id, owner).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        debug!("transaction committed");
        Ok(())
    }
}
