//! Tests for the versioned score store

use cfp_common::db::{init_database, ProposalInput, ScoreInput, Writer};
use cfp_common::store::{ProposalStore, ScoreStore};
use cfp_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("cfp.db")).await.unwrap();
    (dir, pool)
}

async fn submit_talk(pool: &SqlitePool, cfp_index: &str, author: &str) {
    let input = ProposalInput {
        title: format!("Talk {}", cfp_index),
        track: "systems".to_string(),
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

fn verdict(score: &str, confidence: &str) -> ScoreInput {
    ScoreInput {
        score: score.to_string(),
        confidence: confidence.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_score_requires_live_proposal() {
    let (_dir, pool) = test_pool().await;
    let scores = ScoreStore::new(pool);

    let result = scores.submit("missing", "rev1", &verdict("5", "3")).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_submit_and_read_back() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    let stored = scores.submit("t1", "rev1", &verdict("8", "3")).await.unwrap();
    assert_eq!(stored.change_id, 0);
    assert_eq!(stored.version, 0);
    assert!(!stored.refused);

    let live = scores.live_for("t1", "rev1").await.unwrap().unwrap();
    assert_eq!(live.score_value(), 8);
    assert_eq!(live.confidence_value(), 3);
}

#[tokio::test]
async fn test_resubmit_supersedes_previous_verdict() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool.clone());

    scores.submit("t1", "rev1", &verdict("4", "2")).await.unwrap();
    let updated = scores.submit("t1", "rev1", &verdict("9", "3")).await.unwrap();
    assert_eq!(updated.change_id, 1);

    // One live verdict, full history kept
    let live: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scores WHERE cfp_index = 't1' AND reviewer = 'rev1' AND changed = 0",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(live, 1);
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM scores WHERE cfp_index = 't1' AND reviewer = 'rev1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total, 2);

    let live = scores.live_for("t1", "rev1").await.unwrap().unwrap();
    assert_eq!(live.score_value(), 9);
}

#[tokio::test]
async fn test_self_review_rejected() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    let result = scores.submit("t1", "alice", &verdict("10", "3")).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_refusal_recorded_as_zero_valued_verdict() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    let refusal = scores.refuse("t1", "alice").await.unwrap();
    assert!(refusal.refused);
    assert_eq!(refusal.score_value(), 0);

    // Refusals are excluded from aggregation inputs but count as handled
    assert!(scores.live_scores("t1").await.unwrap().is_empty());
    assert_eq!(scores.live_by_reviewer("alice").await.unwrap().len(), 1);
    assert_eq!(scores.completed_count("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn test_refusal_supersedes_score_and_back() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    scores.submit("t1", "rev1", &verdict("6", "2")).await.unwrap();
    let refusal = scores.refuse("t1", "rev1").await.unwrap();
    assert_eq!(refusal.change_id, 1);
    assert!(scores.live_for("t1", "rev1").await.unwrap().unwrap().refused);

    let rescored = scores.submit("t1", "rev1", &verdict("6", "2")).await.unwrap();
    assert_eq!(rescored.change_id, 2);
    assert!(!scores.live_for("t1", "rev1").await.unwrap().unwrap().refused);
}

#[tokio::test]
async fn test_version_captures_proposal_change_id() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    scores.submit("t1", "rev1", &verdict("7", "2")).await.unwrap();

    // Author edits the talk; the stored verdict keeps pointing at version 0
    let input = ProposalInput {
        title: "Talk t1, revised".to_string(),
        track: "systems".to_string(),
        preferred_duration: "40".to_string(),
        language: "en".to_string(),
        coc: true,
        ..Default::default()
    };
    let edited = proposals
        .submit_final("t1", "alice", &input, vec![Writer::confirmed("alice")])
        .await
        .unwrap();
    assert_eq!(edited.change_id, 1);

    let stale = scores.live_for("t1", "rev1").await.unwrap().unwrap();
    assert_eq!(stale.version, 0);

    // Re-scoring captures the new version
    let fresh = scores.submit("t1", "rev1", &verdict("7", "2")).await.unwrap();
    assert_eq!(fresh.version, 1);
}

#[tokio::test]
async fn test_blank_recommendations_mean_no_change() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    let mut input = verdict("5", "1");
    input.track_reco = Some("   ".to_string());
    input.duration_reco = Some("20".to_string());

    let stored = scores.submit("t1", "rev1", &input).await.unwrap();
    assert_eq!(stored.track_reco, None);
    assert_eq!(stored.duration_reco, Some("20".to_string()));
}

#[tokio::test]
async fn test_unfinished_proposal_cannot_be_scored() {
    let (_dir, pool) = test_pool().await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    // Unconfirmed co-author keeps the talk out of the review pool
    let input = ProposalInput {
        title: "Joint talk".to_string(),
        coc: true,
        ..Default::default()
    };
    proposals
        .submit_final(
            "t1",
            "alice",
            &input,
            vec![Writer::confirmed("alice"), Writer::invited("bob")],
        )
        .await
        .unwrap();

    let result = scores.submit("t1", "rev1", &verdict("5", "2")).await;
    assert!(matches!(result, Err(Error::Validation(_))));
    let result = scores.refuse("t1", "rev1").await;
    assert!(matches!(result, Err(Error::Validation(_))));

    proposals.confirm_writer("t1", "bob").await.unwrap();
    assert!(scores.submit("t1", "rev1", &verdict("5", "2")).await.is_ok());
}

#[tokio::test]
async fn test_unparsable_score_counts_as_zero() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let scores = ScoreStore::new(pool);

    let stored = scores.submit("t1", "rev1", &verdict("great", "")).await.unwrap();
    assert_eq!(stored.score_value(), 0);
    assert_eq!(stored.confidence_value(), 0);
}
