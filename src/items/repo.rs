use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    items::repo_types::{Item, ItemChanges, NewItem, OwnerId, Page},
    store::StoreError,
};

const ITEM_COLUMNS: &str = "id, owner_id, title, description, created_at, updated_at";

// Every query here filters on owner_id; there is deliberately no unscoped
// lookup by id.
impl Item {
    pub async fn create(
        conn: &mut PgConnection,
        owner: OwnerId,
        new: &NewItem,
    ) -> Result<Item, StoreError> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (id, owner_id, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(owner.as_uuid())
        .bind(&new.title)
        .bind(&new.description)
        .fetch_one(conn)
        .await?;
        Ok(item)
    }

    pub async fn list_by_owner(
        conn: &mut PgConnection,
        owner: OwnerId,
        page: Page,
    ) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner.as_uuid())
        // LIMIT NULL is LIMIT ALL in Postgres.
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id_and_owner(
        conn: &mut PgConnection,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner.as_uuid())
        .fetch_optional(conn)
        .await?;
        Ok(item)
    }

    pub async fn update_by_id_and_owner(
        conn: &mut PgConnection,
        id: Uuid,
        owner: OwnerId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
               SET title = COALESCE($3, title),
                   description = COALESCE($4, description),
                   updated_at = now()
             WHERE id = $1 AND owner_id = $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner.as_uuid())
        .bind(&changes.title)
        .bind(&changes.description)
        .fetch_optional(conn)
        .await?;
        Ok(item)
    }

    pub async fn delete_by_id_and_owner(
        conn: &mut PgConnection,
        id: Uuid,
        owner: OwnerId,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM items WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.as_uuid())
            .execute(conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
