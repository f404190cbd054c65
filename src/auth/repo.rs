use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    store::StoreError,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, display_name, is_active, created_at, updated_at";

impl User {
    /// Find a user by its id.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    /// Find a user by (normalized) email.
    pub async fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(conn: &mut PgConnection, new: &NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.display_name)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict("Email already registered")
            }
            other => StoreError::Database(other),
        })
    }
}
