use tracing::{debug, info};
use uuid::Uuid;

use super::{
    dto::{CreateItemRequest, Pagination, UpdateItemRequest},
    repo_types::{Item, ItemChanges, NewItem, OwnerId, Page},
};
use crate::{error::AppError, store::Store};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_PAGE_SIZE: i64 = 100;

fn validate_title(raw: &str) -> Result<String, AppError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::invalid("Title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::invalid(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

/// Without a `limit` the whole list is returned; a client-supplied one is
/// bounded to `1..=MAX_PAGE_SIZE`.
pub fn page_from(p: Pagination) -> Result<Page, AppError> {
    let offset = p.offset.unwrap_or(0);
    if let Some(limit) = p.limit {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::invalid(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
    }
    if offset < 0 {
        return Err(AppError::invalid("offset must not be negative"));
    }
    Ok(Page {
        limit: p.limit,
        offset,
    })
}

pub async fn create_item(
    store: &dyn Store,
    owner: OwnerId,
    req: CreateItemRequest,
) -> Result<Item, AppError> {
    let new = NewItem {
        id: Uuid::new_v4(),
        title: validate_title(&req.title)?,
        description: req.description,
    };

    let mut tx = store.begin().await?;
    let item = tx.insert_item(owner, &new).await?;
    tx.commit().await?;

    info!(item_id = %item.id, owner_id = %item.owner_id, "item created");
    Ok(item)
}

pub async fn list_items(store: &dyn Store, owner: OwnerId, page: Page) -> Result<Vec<Item>, AppError> {
    let mut tx = store.begin().await?;
    let items = tx.list_items_by_owner(owner, page).await?;
    tx.commit().await?;
    debug!(count = items.len(), "items listed");
    Ok(items)
}

/// Absent and not-owned are the same `NotFound`.
pub async fn get_item(store: &dyn Store, owner: OwnerId, id: Uuid) -> Result<Item, AppError> {
    let mut tx = store.begin().await?;
    let item = tx
        .find_item_by_id_and_owner(id, owner)
        .await?
        .ok_or(AppError::NotFound("Item"))?;
    tx.commit().await?;
    Ok(item)
}

pub async fn update_item(
    store: &dyn Store,
    owner: OwnerId,
    id: Uuid,
    req: UpdateItemRequest,
) -> Result<Item, AppError> {
    let changes = ItemChanges {
        title: req.title.as_deref().map(validate_title).transpose()?,
        description: req.description,
    };

    let mut tx = store.begin().await?;
    let item = tx
        .update_item_by_id_and_owner(id, owner, &changes)
        .await?
        .ok_or(AppError::NotFound("Item"))?;
    tx.commit().await?;

    info!(item_id = %item.id, "item updated");
    Ok(item)
}

pub async fn delete_item(store: &dyn Store, owner: OwnerId, id: Uuid) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    if !tx.delete_item_by_id_and_owner(id, owner).await? {
        return Err(AppError::NotFound("Item"));
    }
    tx.commit().await?;

    info!(item_id = %id, "item deleted");
    Ok(())
}
