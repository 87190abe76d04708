//! Database initialization
//!
//! Creates the database on first run. The proposals and scores tables are
//! append-only version logs; partial unique indexes enforce the
//! at-most-one-live invariants at the storage layer instead of by
//! convention.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connect options apply to every pooled connection; a PRAGMA statement
    // run through the pool would only configure the connection it ran on.
    // WAL lets aggregation reads run concurrently with one writer; the busy
    // timeout makes writers blocked by a supersede transaction wait instead
    // of failing immediately.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_users_table(&pool).await?;
    create_proposals_table(&pool).await?;
    create_scores_table(&pool).await?;
    create_tags_table(&pool).await?;

    Ok(pool)
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            speaker_bio TEXT NOT NULL DEFAULT '',
            affiliation TEXT NOT NULL DEFAULT '',
            past_experience TEXT NOT NULL DEFAULT '',
            admin INTEGER NOT NULL DEFAULT 0,
            view_bio INTEGER NOT NULL DEFAULT 0,
            weight REAL NOT NULL DEFAULT 1.0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the proposals table
///
/// One row per version of a talk. `cfp_index` is the stable talk identifier,
/// `change_id` the version counter (-1 for drafts). The partial unique index
/// keeps at most one live submitted version per talk.
pub async fn create_proposals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proposals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cfp_index TEXT NOT NULL,
            change_id INTEGER NOT NULL,
            changed INTEGER NOT NULL DEFAULT 0,
            finished INTEGER NOT NULL DEFAULT 0,
            writers TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            abstract_text TEXT NOT NULL DEFAULT '',
            outline TEXT NOT NULL DEFAULT '',
            track TEXT NOT NULL DEFAULT '',
            preferred_duration TEXT NOT NULL DEFAULT '',
            other_durations TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            coc INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            CHECK (change_id >= -1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_proposals_index ON proposals(cfp_index)")
        .execute(pool)
        .await?;

    // At most one live submitted version per talk; drafts (change_id = -1)
    // are deduplicated by deletion instead
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_proposals_live \
         ON proposals(cfp_index) WHERE changed = 0 AND change_id >= 0",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the scores table
///
/// Same supersede semantics as proposals, keyed by (cfp_index, reviewer).
/// `version` records the proposal change_id the score was computed against.
pub async fn create_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cfp_index TEXT NOT NULL,
            reviewer TEXT NOT NULL,
            change_id INTEGER NOT NULL,
            changed INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL,
            refused INTEGER NOT NULL DEFAULT 0,
            score TEXT NOT NULL DEFAULT '',
            confidence TEXT NOT NULL DEFAULT '',
            committee TEXT NOT NULL DEFAULT '',
            author_comment TEXT NOT NULL DEFAULT '',
            track_reco TEXT,
            track_comment TEXT NOT NULL DEFAULT '',
            duration_reco TEXT,
            duration_comment TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            CHECK (change_id >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scores_index ON scores(cfp_index)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scores_reviewer ON scores(reviewer)")
        .execute(pool)
        .await?;

    // Exactly one live verdict per reviewer per talk
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_scores_live \
         ON scores(cfp_index, reviewer) WHERE changed = 0",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            value TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0,
            checked INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
