//! Tests for the aggregation engine: overview, track reports, global
//! statistics and peer-review visibility

use cfp_common::db::{init_database, ProposalInput, ScoreInput, User, Writer};
use cfp_common::store::{ProposalStore, ScoreStore};
use cfp_common::users;
use cfp_review::stats;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("cfp.db")).await.unwrap();
    (dir, pool)
}

async fn seed_user(pool: &SqlitePool, id: &str, admin: bool) {
    users::ensure_user(
        pool,
        &User {
            user_id: id.to_string(),
            email: format!("{}@example.org", id),
            first_name: id.to_string(),
            last_name: "Tester".to_string(),
            speaker_bio: String::new(),
            affiliation: String::new(),
            past_experience: String::new(),
            admin,
            view_bio: false,
            weight: 1.0,
        },
    )
    .await
    .unwrap();
}

async fn submit_talk(pool: &SqlitePool, cfp_index: &str, author: &str, track: &str) {
    let input = ProposalInput {
        title: format!("Talk {}", cfp_index),
        track: track.to_string(),
        preferred_duration: "40".to_string(),
        language: "en".to_string(),
        coc: true,
        ..Default::default()
    };
    ProposalStore::new(pool.clone())
        .submit_final(cfp_index, author, &input, vec![Writer::confirmed(author)])
        .await
        .unwrap();
}

async fn score_talk(pool: &SqlitePool, cfp_index: &str, reviewer: &str, score: &str, conf: &str) {
    let input = ScoreInput {
        score: score.to_string(),
        confidence: conf.to_string(),
        ..Default::default()
    };
    ScoreStore::new(pool.clone())
        .submit(cfp_index, reviewer, &input)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_overview_orders_unreviewed_before_refused_before_reviewed() {
    let (_dir, pool) = test_pool().await;
    seed_user(&pool, "rev1", false).await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    submit_talk(&pool, "t2", "alice", "systems").await;
    submit_talk(&pool, "t3", "alice", "systems").await;

    score_talk(&pool, "t1", "rev1", "7", "2").await;
    ScoreStore::new(pool.clone()).refuse("t2", "rev1").await.unwrap();

    let entries = stats::overview(&pool, "rev1").await.unwrap();
    let order: Vec<&str> = entries.iter().map(|e| e.cfp_index.as_str()).collect();
    assert_eq!(order, vec!["t3", "t2", "t1"]);

    assert!(!entries[0].reviewed && !entries[0].refused);
    assert!(entries[1].refused);
    assert!(entries[2].reviewed);
    // No bio access: author names stay hidden
    assert!(entries.iter().all(|e| e.author.is_none()));
}

#[tokio::test]
async fn test_overview_surfaces_underreviewed_talks_first() {
    let (_dir, pool) = test_pool().await;
    seed_user(&pool, "rev1", false).await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    submit_talk(&pool, "t2", "alice", "systems").await;

    // t1 already has coverage from another reviewer
    score_talk(&pool, "t1", "rev2", "5", "2").await;

    let entries = stats::overview(&pool, "rev1").await.unwrap();
    let order: Vec<&str> = entries.iter().map(|e| e.cfp_index.as_str()).collect();
    assert_eq!(order, vec!["t2", "t1"]);
    assert_eq!(entries[0].count, 0);
    assert_eq!(entries[1].count, 1);
}

#[tokio::test]
async fn test_overview_flags_stale_review_after_edit() {
    let (_dir, pool) = test_pool().await;
    seed_user(&pool, "rev1", false).await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    score_talk(&pool, "t1", "rev1", "7", "2").await;

    let entries = stats::overview(&pool, "rev1").await.unwrap();
    assert!(entries[0].up_to_date);

    // Author edits the talk; the existing review goes stale
    submit_talk(&pool, "t1", "alice", "systems").await;
    let entries = stats::overview(&pool, "rev1").await.unwrap();
    assert!(!entries[0].up_to_date);

    score_talk(&pool, "t1", "rev1", "7", "2").await;
    let entries = stats::overview(&pool, "rev1").await.unwrap();
    assert!(entries[0].up_to_date);
}

#[tokio::test]
async fn test_overview_shows_authors_to_admins() {
    let (_dir, pool) = test_pool().await;
    seed_user(&pool, "admin1", true).await;
    seed_user(&pool, "alice", false).await;
    submit_talk(&pool, "t1", "alice", "systems").await;

    let entries = stats::overview(&pool, "admin1").await.unwrap();
    assert_eq!(entries[0].author.as_deref(), Some("alice Tester"));
}

#[tokio::test]
async fn test_track_report_ranks_by_weighted_score() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    submit_talk(&pool, "t2", "alice", "systems").await;
    submit_talk(&pool, "t3", "alice", "systems").await;

    // t1: weighted (8*3 + 4*1) / 4 = 7.0
    score_talk(&pool, "t1", "rev1", "8", "3").await;
    score_talk(&pool, "t1", "rev2", "4", "1").await;
    // t2: weighted 5.0
    score_talk(&pool, "t2", "rev1", "5", "1").await;
    // t3: unscored, sorts last

    let entries = stats::track_statistics(&pool, "systems").await.unwrap();
    let order: Vec<&str> = entries.iter().map(|e| e.cfp_index.as_str()).collect();
    assert_eq!(order, vec!["t1", "t2", "t3"]);

    assert_eq!(entries[0].weighted, Some(7.0));
    assert_eq!(entries[0].average, Some(6.0));
    assert_eq!(entries[0].median, Some(6.0));
    assert_eq!(entries[0].confidence, Some(2.0));
    assert_eq!(entries[0].count, 2);
    assert_eq!(entries[2].weighted, None);
    assert_eq!(entries[2].count, 0);
}

#[tokio::test]
async fn test_track_report_includes_cross_track_candidates() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t_web", "alice", "web").await;

    let input = ScoreInput {
        score: "6".to_string(),
        confidence: "2".to_string(),
        track_reco: Some("systems".to_string()),
        ..Default::default()
    };
    ScoreStore::new(pool.clone())
        .submit("t_web", "rev1", &input)
        .await
        .unwrap();

    // Recommended into systems: shows up there as a move candidate
    let systems = stats::track_statistics(&pool, "systems").await.unwrap();
    assert_eq!(systems.len(), 1);
    assert_eq!(systems[0].cfp_index, "t_web");
    assert_eq!(systems[0].track, "web");
    assert!(systems[0].from_track_change);
    assert!(!systems[0].track_change);

    // Still listed in its own track, flagged as a move-out candidate
    let web = stats::track_statistics(&pool, "web").await.unwrap();
    assert_eq!(web.len(), 1);
    assert!(web[0].track_change);
    assert!(!web[0].from_track_change);
}

#[tokio::test]
async fn test_track_report_flags_duration_changes() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice", "systems").await;

    let input = ScoreInput {
        score: "6".to_string(),
        confidence: "2".to_string(),
        duration_reco: Some("20".to_string()),
        ..Default::default()
    };
    ScoreStore::new(pool.clone())
        .submit("t1", "rev1", &input)
        .await
        .unwrap();

    let entries = stats::track_statistics(&pool, "systems").await.unwrap();
    assert!(entries[0].time_change);
}

#[tokio::test]
async fn test_global_statistics_counts_submissions() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    submit_talk(&pool, "t2", "alice", "web").await;
    submit_talk(&pool, "t3", "bob", "web").await;
    score_talk(&pool, "t1", "rev1", "5", "2").await;
    score_talk(&pool, "t1", "rev2", "7", "2").await;

    let stats = stats::global_statistics(&pool).await.unwrap();
    assert_eq!(stats.proposals, 3);
    assert_eq!(stats.by_track.get("systems"), Some(&1));
    assert_eq!(stats.by_track.get("web"), Some(&2));
    assert_eq!(stats.by_language.get("en"), Some(&3));
    assert_eq!(stats.by_duration.get("40"), Some(&3));
    assert_eq!(stats.review_counts.min, Some(0));
    assert_eq!(stats.review_counts.median, Some(0.0));
}

#[tokio::test]
async fn test_global_statistics_on_empty_store() {
    let (_dir, pool) = test_pool().await;

    let stats = stats::global_statistics(&pool).await.unwrap();
    assert_eq!(stats.proposals, 0);
    assert_eq!(stats.review_counts.average, None);
    assert_eq!(stats.review_counts.median, None);
    assert_eq!(stats.review_counts.min, None);
}

#[tokio::test]
async fn test_peer_reviews_hidden_until_scored() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice", "systems").await;
    score_talk(&pool, "t1", "rev2", "8", "3").await;

    // rev1 has not scored: nothing revealed
    let reviews = stats::peer_reviews(&pool, "t1", "rev1").await.unwrap();
    assert!(reviews.is_none());

    // A refusal does not unlock peer reviews either
    ScoreStore::new(pool.clone()).refuse("t1", "rev3").await.unwrap();
    let reviews = stats::peer_reviews(&pool, "t1", "rev3").await.unwrap();
    assert!(reviews.is_none());

    score_talk(&pool, "t1", "rev1", "6", "2").await;
    let reviews = stats::peer_reviews(&pool, "t1", "rev1").await.unwrap().unwrap();
    assert_eq!(reviews.len(), 2);
}

#[tokio::test]
async fn test_peer_reviews_fold_matching_recommendations() {
    let (_dir, pool) = test_pool().await;
    seed_user(&pool, "rev2", false).await;
    submit_talk(&pool, "t1", "alice", "systems").await;

    // rev2 recommends the track the talk already has plus a new duration
    let input = ScoreInput {
        score: "8".to_string(),
        confidence: "3".to_string(),
        track_reco: Some("systems".to_string()),
        duration_reco: Some("20".to_string()),
        ..Default::default()
    };
    ScoreStore::new(pool.clone())
        .submit("t1", "rev2", &input)
        .await
        .unwrap();
    score_talk(&pool, "t1", "rev1", "6", "2").await;

    let reviews = stats::peer_reviews(&pool, "t1", "rev1").await.unwrap().unwrap();
    let peer = reviews.iter().find(|r| r.score == "8").unwrap();
    assert_eq!(peer.track_reco, None, "matching track reco should fold away");
    assert_eq!(peer.duration_reco, Some("20".to_string()));
    // Known users render with display names
    assert_eq!(peer.reviewer, "rev2 Tester");
}
