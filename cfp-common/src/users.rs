//! User identity and predicates
//!
//! Account management is owned elsewhere; the review core only needs
//! identity lookups, the admin predicate, and the bio-visibility rule.

use crate::db::{SpeakerProfile, User};
use crate::{Error, Result};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "user_id, email, first_name, last_name, speaker_bio, affiliation, \
     past_experience, admin, view_bio, weight";

/// How many completed reviews earn bio visibility on their own
const VIEW_BIO_REVIEW_THRESHOLD: i64 = 10;

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<User> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE user_id = ?",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
}

pub async fn all_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY user_id",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn is_admin(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    Ok(get_user(pool, user_id).await?.admin)
}

/// Whether the user may see speaker identities
///
/// Granted by the per-user flag, by admin status, or by having completed
/// ten or more live non-refused reviews.
pub async fn can_view_bios(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let user = get_user(pool, user_id).await?;
    if user.view_bio || user.admin {
        return Ok(true);
    }

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scores WHERE reviewer = ? AND changed = 0 AND refused = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(completed >= VIEW_BIO_REVIEW_THRESHOLD)
}

/// Save the speaker-profile fields carried on a proposal submission
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    profile: &SpeakerProfile,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, speaker_bio = ?, affiliation = ?, \
         past_experience = ? WHERE user_id = ?",
    )
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.speaker_bio)
    .bind(&profile.affiliation)
    .bind(&profile.past_experience)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("user {}", user_id)));
    }
    Ok(())
}

/// Insert a user if absent (seed tooling and tests)
pub async fn ensure_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO users (user_id, email, first_name, last_name, speaker_bio, \
         affiliation, past_experience, admin, view_bio, weight) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.user_id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.speaker_bio)
    .bind(&user.affiliation)
    .bind(&user.past_experience)
    .bind(user.admin)
    .bind(user.view_bio)
    .bind(user.weight)
    .execute(pool)
    .await?;
    Ok(())
}
