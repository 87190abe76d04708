//! Tag registry
//!
//! Usage counts follow live submitted proposals: bumped on submit, released
//! on supersede. An unchecked tag whose count drops to zero is removed;
//! checked tags are admin-curated vocabulary and survive.

use crate::db::Tag;
use crate::tags::split;
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Increment usage counts for every tag in a comma-joined string,
/// creating unknown tags with count 1
pub(crate) async fn bump_tags(conn: &mut SqliteConnection, tags: &str) -> Result<()> {
    for tag in split(tags) {
        sqlx::query(
            "INSERT INTO tags (value, count, checked) VALUES (?, 1, 0) \
             ON CONFLICT(value) DO UPDATE SET count = count + 1",
        )
        .bind(&tag)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Decrement usage counts and garbage-collect orphaned unchecked tags
pub(crate) async fn release_tags(conn: &mut SqliteConnection, tags: &str) -> Result<()> {
    for tag in split(tags) {
        sqlx::query("UPDATE tags SET count = count - 1 WHERE value = ?")
            .bind(&tag)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM tags WHERE count <= 0 AND checked = 0")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Read and curation access to the shared tag vocabulary
#[derive(Debug, Clone)]
pub struct TagStore {
    pool: SqlitePool,
}

impl TagStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT value, count, checked FROM tags ORDER BY value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Admin-curated subset shown as form vocabulary
    pub async fn checked(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT value, count, checked FROM tags WHERE checked = 1 ORDER BY value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Tag choices offered for a form: the checked vocabulary plus whatever
    /// the current value already contains
    pub async fn possible_tags(&self, current: Option<&str>) -> Result<Vec<String>> {
        let mut possible: Vec<String> =
            self.checked().await?.into_iter().map(|t| t.value).collect();
        if let Some(current) = current {
            for tag in split(current) {
                if !possible.contains(&tag) {
                    possible.push(tag);
                }
            }
        }
        Ok(possible)
    }

    /// Curation primitive: mark a tag as part of the shared vocabulary
    pub async fn set_checked(&self, value: &str, checked: bool) -> Result<()> {
        let result = sqlx::query("UPDATE tags SET checked = ? WHERE value = ?")
            .bind(checked)
            .bind(value)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("tag {}", value)));
        }
        // Unchecking an orphaned tag removes it immediately
        if !checked {
            sqlx::query("DELETE FROM tags WHERE value = ? AND count <= 0")
                .bind(value)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
