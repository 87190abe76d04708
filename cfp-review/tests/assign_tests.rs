//! Tests for the assignment selector

use cfp_common::db::{init_database, ProposalInput, ScoreInput, Writer};
use cfp_common::store::{ProposalStore, ScoreStore};
use cfp_review::assign::{next_assignment, Assignment};
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

#[tokio::test]
async fn test_empty_pool_means_done() {
    let (_dir, pool) = test_pool().await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
    assert_eq!(assignment, Assignment::Done);
}

#[tokio::test]
async fn test_handled_proposals_never_reassigned() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    submit_talk(&pool, "t2", "alice").await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    scores
        .submit("t1", "rev1", &ScoreInput::default())
        .await
        .unwrap();

    // The selector is random, so probe it repeatedly
    for _ in 0..20 {
        let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
        assert_eq!(assignment, Assignment::Review("t2".to_string()));
    }

    scores.refuse("t2", "rev1").await.unwrap();
    let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
    assert_eq!(assignment, Assignment::Done);
}

#[tokio::test]
async fn test_own_talk_routes_to_refusal() {
    let (_dir, pool) = test_pool().await;
    submit_talk(&pool, "t1", "alice").await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    let assignment = next_assignment(&proposals, &scores, "alice").await.unwrap();
    assert_eq!(assignment, Assignment::Refuse("t1".to_string()));
}

#[tokio::test]
async fn test_unfinished_proposals_not_assigned() {
    let (_dir, pool) = test_pool().await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool.clone());

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

    let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
    assert_eq!(assignment, Assignment::Done);

    proposals.confirm_writer("t1", "bob").await.unwrap();
    let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
    assert_eq!(assignment, Assignment::Review("t1".to_string()));
}

#[tokio::test]
async fn test_drafts_not_assigned() {
    let (_dir, pool) = test_pool().await;
    let proposals = ProposalStore::new(pool.clone());
    let scores = ScoreStore::new(pool);

    let input = ProposalInput {
        title: "Work in progress".to_string(),
        ..Default::default()
    };
    proposals.submit_draft("t1", "alice", &input).await.unwrap();

    let assignment = next_assignment(&proposals, &scores, "rev1").await.unwrap();
    assert_eq!(assignment, Assignment::Done);
}
