//! Lifecycle legality and compare-and-set behaviour over the in-memory
//! store.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use lessonplan_core::error::LifecycleError;
use lessonplan_core::lifecycle::{LessonLifecycle, SectionEdits};
use lessonplan_core::store::{GenerationCommit, LessonStore, MemoryLessonStore};
use lessonplan_db::models::{LessonSections, LessonStatus, NewLessonPlan, Section};

fn new_lesson() -> NewLessonPlan {
    NewLessonPlan {
        author_id: "teacher-1".to_string(),
        subject: "Basic Science".to_string(),
        grade_level: "JSS1".to_string(),
        topic: "Water cycle".to_string(),
        title: "Water cycle".to_string(),
        duration_minutes: 40,
        country: "Nigeria".to_string(),
    }
}

fn commit() -> GenerationCommit {
    GenerationCommit {
        sections: LessonSections {
            learning_objectives: "Describe evaporation".to_string(),
            local_context: "Harmattan season".to_string(),
            core_content: "Water evaporates, condenses and falls as rain.".to_string(),
            activities: "Boil water and observe the lid".to_string(),
            quiz: "1. What is condensation?".to_string(),
            related_projects: "Build a rain gauge".to_string(),
        },
        sections_missing: vec![],
        primary: None,
    }
}

/// A lesson forced into `status` by writing the store directly.
async fn lesson_in(store: &Arc<MemoryLessonStore>, status: LessonStatus) -> Uuid {
    let lesson = store.insert_lesson(&new_lesson()).await.unwrap();
    if status != LessonStatus::Draft {
        assert!(
            store
                .commit_generation(lesson.id, LessonStatus::Draft, &commit())
                .await
                .unwrap()
        );
        assert!(
            store
                .transition_status(lesson.id, LessonStatus::Generated, status)
                .await
                .unwrap()
        );
    }
    lesson.id
}

async fn status_of(store: &Arc<MemoryLessonStore>, id: Uuid) -> LessonStatus {
    store.get_lesson(id).await.unwrap().unwrap().status
}

#[tokio::test]
async fn every_state_pair_obeys_the_transition_table() {
    for from in LessonStatus::ALL {
        for to in LessonStatus::ALL {
            let store = Arc::new(MemoryLessonStore::new());
            let lifecycle = LessonLifecycle::new(store.clone());
            let id = lesson_in(&store, from).await;

            let result = if to == LessonStatus::Generated {
                lifecycle.complete_generation(id, from, &commit()).await
            } else {
                lifecycle.transition(id, to).await
            };

            if LessonLifecycle::is_valid_transition(from, to) {
                let lesson = result.unwrap_or_else(|e| panic!("{from} -> {to} failed: {e}"));
                assert_eq!(lesson.status, to);
            } else {
                match result {
                    Err(LifecycleError::InvalidTransition {
                        from: reported,
                        to: requested,
                        ..
                    }) => {
                        assert_eq!(reported, from);
                        assert_eq!(requested, to);
                    }
                    other => panic!("{from} -> {to}: expected InvalidTransition, got {other:?}"),
                }
                assert_eq!(status_of(&store, id).await, from, "{from} -> {to} changed status");
            }
        }
    }
}

#[tokio::test]
async fn plain_transition_cannot_reach_generated() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let id = lesson_in(&store, LessonStatus::Draft).await;

    let err = lifecycle
        .transition(id, LessonStatus::Generated)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::RequiresContent { .. }));
    assert_eq!(status_of(&store, id).await, LessonStatus::Draft);
}

#[tokio::test]
async fn stale_expected_status_reports_actual_status() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let id = lesson_in(&store, LessonStatus::Draft).await;

    // Someone else generated the lesson first.
    lifecycle
        .complete_generation(id, LessonStatus::Draft, &commit())
        .await
        .unwrap();

    let err = lifecycle
        .complete_generation(id, LessonStatus::Draft, &commit())
        .await
        .unwrap_err();
    match err {
        LifecycleError::InvalidTransition { from, to, .. } => {
            assert_eq!(from, LessonStatus::Generated);
            assert_eq!(to, LessonStatus::Generated);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn edit_sections_moves_to_edited_and_keeps_other_sections() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let id = lesson_in(&store, LessonStatus::Exported).await;

    let edited = lifecycle
        .edit_sections(id, &SectionEdits::new().with(Section::Quiz, "1. Define runoff."))
        .await
        .unwrap();

    assert_eq!(edited.status, LessonStatus::Edited);
    assert_eq!(edited.sections.quiz, "1. Define runoff.");
    assert_eq!(edited.sections.activities, commit().sections.activities);

    // Re-entrant while content keeps changing.
    let again = lifecycle
        .edit_sections(id, &SectionEdits::new().with(Section::Quiz, "1. Define infiltration."))
        .await
        .unwrap();
    assert_eq!(again.status, LessonStatus::Edited);
}

#[tokio::test]
async fn no_op_edit_is_rejected() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let id = lesson_in(&store, LessonStatus::Generated).await;

    let same = SectionEdits::new().with(Section::Quiz, commit().sections.quiz);
    assert!(matches!(
        lifecycle.edit_sections(id, &same).await,
        Err(LifecycleError::NoChanges)
    ));
    assert!(matches!(
        lifecycle.edit_sections(id, &SectionEdits::new()).await,
        Err(LifecycleError::NoChanges)
    ));
    assert_eq!(status_of(&store, id).await, LessonStatus::Generated);
}

#[tokio::test]
async fn drafts_and_archived_lessons_cannot_be_edited() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let edits = SectionEdits::new().with(Section::CoreContent, "text");

    for status in [LessonStatus::Draft, LessonStatus::Archived] {
        let id = lesson_in(&store, status).await;
        assert!(matches!(
            lifecycle.edit_sections(id, &edits).await,
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }
}

#[tokio::test]
async fn leased_lesson_refuses_edits_and_transitions() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store.clone());
    let id = lesson_in(&store, LessonStatus::Edited).await;
    assert!(
        store
            .try_claim_generation(id, Duration::from_secs(60))
            .await
            .unwrap()
    );

    let edits = SectionEdits::new().with(Section::Quiz, "1. Name a river.");
    assert!(matches!(
        lifecycle.edit_sections(id, &edits).await,
        Err(LifecycleError::GenerationInProgress(leased)) if leased == id
    ));
    assert!(matches!(
        lifecycle.transition(id, LessonStatus::Reviewed).await,
        Err(LifecycleError::GenerationInProgress(_))
    ));
    let stored = store.get_lesson(id).await.unwrap().unwrap();
    assert_eq!(stored.status, LessonStatus::Edited);
    assert_eq!(stored.sections.quiz, commit().sections.quiz);

    store.release_generation(id).await.unwrap();
    let edited = lifecycle.edit_sections(id, &edits).await.unwrap();
    assert_eq!(edited.sections.quiz, "1. Name a river.");
}

#[tokio::test]
async fn unknown_lesson_is_not_found() {
    let store = Arc::new(MemoryLessonStore::new());
    let lifecycle = LessonLifecycle::new(store);
    assert!(matches!(
        lifecycle.transition(Uuid::new_v4(), LessonStatus::Archived).await,
        Err(LifecycleError::LessonNotFound(_))
    ));
}
