//! Integration tests for database bootstrap and table counts.

use lessonplan_db::models::NewLessonPlan;
use lessonplan_db::pool::{self, Bootstrap};
use lessonplan_db::queries::lesson_plans;
use lessonplan_test_utils::{TestDb, math_standard};

#[tokio::test]
async fn bootstrap_is_idempotent_on_existing_database() {
    let db = TestDb::create().await;

    let outcome = pool::ensure_database_exists(db.config()).await.unwrap();
    assert_eq!(outcome, Bootstrap::AlreadyExisted);

    // Re-running migrations against a migrated database is a no-op.
    pool::run_migrations(&db.pool).await.unwrap();

    db.teardown().await;
}

#[tokio::test]
async fn table_counts_cover_every_table() {
    let db = TestDb::create().await;

    let empty = pool::table_counts(&db.pool).await.unwrap();
    assert!(empty.rows().iter().all(|(_, count)| *count == 0));

    lesson_plans::insert_lesson(
        &db.pool,
        &NewLessonPlan {
            author_id: "t".to_string(),
            subject: "Mathematics".to_string(),
            grade_level: "Grade 5".to_string(),
            topic: "Fractions".to_string(),
            title: "Fractions".to_string(),
            duration_minutes: 40,
            country: "Nigeria".to_string(),
        },
    )
    .await
    .unwrap();
    db.seed_standards(&[math_standard("M5.1"), math_standard("M5.2")])
        .await;

    let counts = pool::table_counts(&db.pool).await.unwrap();
    assert_eq!(counts.lesson_plans, 1);
    assert_eq!(counts.curriculum_standards, 2);
    assert_eq!(counts.generation_attempts, 0);
    assert_eq!(counts.rows().len(), 5);

    db.teardown().await;
}

#[tokio::test]
async fn bootstrap_rejects_unsafe_database_name() {
    let db = TestDb::create().await;

    let unsafe_config = db.config().with_database("lessons;drop");
    assert!(pool::ensure_database_exists(&unsafe_config).await.is_err());

    db.teardown().await;
}
