use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use tailor_core::domain::profile::{Profile, UserId};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

/// SQLite-backed profile store. One row per user, with the whole record
/// serialized into the `document` column.
pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM profile WHERE user_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| profile_from_row(&r)).transpose()
    }

    async fn save(&self, profile: Profile) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(&profile).map_err(|err| {
            RepositoryError::Decode(format!("profile document failed to serialize: {err}"))
        })?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO profile (user_id, document, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE
            SET document = excluded.document, updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.user_id.0)
        .bind(&document)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile, RepositoryError> {
    let document = row.get::<String, _>("document");
    serde_json::from_str(&document)
        .map_err(|err| RepositoryError::Decode(format!("profile document is not valid JSON: {err}")))
}
