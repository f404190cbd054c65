//! In-process store used by tests. Transactions take the table lock for
//! their whole lifetime and work on a copy, which is written back on commit.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::{
    auth::repo_types::{NewUser, User},
    items::repo_types::{Item, ItemChanges, NewItem, OwnerId, Page},
};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: Vec<User>,
    // insertion order
    items: Vec<Item>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    begun: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many transactions have been opened so far.
    pub fn transactions_started(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    pub async fn user_by_email(&self, email: &str) -> Option<User> {
        let tables = self.tables.lock().await;
        tables.users.iter().find(|u| u.email == email).cloned()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = active;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemoryTx {
    fn owned_item_mut(&mut self, id: Uuid, owner: OwnerId) -> Option<&mut Item> {
        self.working
            .items
            .iter_mut()
            .find(|i| i.id == id && i.owner_id == owner.as_uuid())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        if self.working.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email already registered"));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: user.id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            display_name: user.display_name.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.working.users.push(row.clone());
        Ok(row)
    }

    async fn insert_item(&mut self, owner: OwnerId, item: &NewItem) -> Result<Item, StoreError> {
        let now = OffsetDateTime::now_utc();
        let row = Item {
            id: item.id,
            owner_id: owner.as_uuid(),
            title: item.title.clone(),
            description: item.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.items.push(row.clone());
        Ok(row)
    }

    async fn list_items_by_owner(
        &mut self,
        owner: OwnerId,
        page: Page,
    ) -> Result<Vec<Item>, StoreError> {
        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = match page.limit {
            Some(limit) => usize::try_from(limit).unwrap_or(0),
            None => usize::MAX,
        };
        Ok(self
            .working
            .items
            .iter()
            .rev()
            .filter(|i| i.owner_id == owner.as_uuid())
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<Option<Item>, StoreError> {
        Ok(self.owned_item_mut(id, owner).cloned())
    }

    async fn update_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, StoreError> {
        let Some(item) = self.owned_item_mut(id, owner) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            item.title = title.clone();
        }
        if let Some(description) = &changes.description {
            item.description = Some(description.clone());
        }
        item.updated_at = OffsetDateTime::now_utc();
        Ok(Some(item.clone()))
    }

    async fn delete_item_by_id_and_owner(
        &mut self,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<bool, StoreError> {
        let before = self.working.items.len();
        self.working
            .items
            .retain(|i| !(i.id == id && i.owner_id == owner.as_uuid()));
        Ok(self.working.items.len() < before)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            display_name: None,
        }
    }

    fn new_item(title: &str) -> NewItem {
        NewItem {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
        }
    }

    const ALL: Page = Page {
        limit: None,
        offset: 0,
    };

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let owner = OwnerId::authenticated(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(owner, &new_item("draft")).await.unwrap();
        drop(tx);

        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_transactions() {
        let store = MemoryStore::new();
        let owner = OwnerId::authenticated(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let item = tx.insert_item(owner, &new_item("kept")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_item_by_id_and_owner(item.id, owner).await.unwrap();
        assert_eq!(found, Some(item));
        assert_eq!(store.transactions_started(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("a@x.com")).await.unwrap();
        let err = tx.insert_user(&new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn item_queries_are_owner_scoped() {
        let store = MemoryStore::new();
        let alice = OwnerId::authenticated(Uuid::new_v4());
        let bob = OwnerId::authenticated(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        let item = tx.insert_item(alice, &new_item("mine")).await.unwrap();

        assert!(tx.find_item_by_id_and_owner(item.id, bob).await.unwrap().is_none());
        assert!(tx.list_items_by_owner(bob, ALL).await.unwrap().is_empty());
        let changes = ItemChanges {
            title: Some("stolen".into()),
            description: None,
        };
        assert!(tx
            .update_item_by_id_and_owner(item.id, bob, &changes)
            .await
            .unwrap()
            .is_none());
        assert!(!tx.delete_item_by_id_and_owner(item.id, bob).await.unwrap());

        let still = tx.find_item_by_id_and_owner(item.id, alice).await.unwrap();
        assert_eq!(still.map(|i| i.title), Some("mine".to_string()));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paged() {
        let store = MemoryStore::new();
        let owner = OwnerId::authenticated(Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        for title in ["one", "two", "three"] {
            tx.insert_item(owner, &new_item(title)).await.unwrap();
        }

        let titles: Vec<String> = tx
            .list_items_by_owner(owner, ALL)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, ["three", "two", "one"]);

        let page = tx
            .list_items_by_owner(owner, Page { limit: Some(1), offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "two");
    }
}
