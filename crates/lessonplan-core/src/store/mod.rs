//! Persistence seams.
//!
//! [`LessonStore`] covers everything keyed by a lesson (the lesson row,
//! its context entries, curriculum mappings and generation attempts).
//! [`CurriculumSource`] is the read-only lookup into curriculum reference
//! data. Both are object-safe so the orchestrator can hold `Arc<dyn _>`.
//!
//! Two implementations ship: [`postgres`] for deployments and [`memory`]
//! for embedding and tests.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use lessonplan_db::models::{
    ContextEntry, CurriculumMapping, CurriculumStandard, GenerationAttempt, LessonPlan,
    LessonSections, LessonStatus, NewCurriculumMapping, NewGenerationAttempt, NewLessonPlan,
};

pub use memory::{MemoryCurriculum, MemoryLessonStore};
pub use postgres::{PgCurriculumSource, PgLessonStore};

/// Everything written to a lesson in the `-> generated` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCommit {
    pub sections: LessonSections,
    /// Canonical keys of sections the AI output did not provide.
    pub sections_missing: Vec<String>,
    /// Replaces any existing primary mapping; `None` removes it.
    pub primary: Option<NewCurriculumMapping>,
}

/// Storage for lesson plans and the records owned by them.
///
/// Status-changing methods are compare-and-set: they apply only when the
/// stored status equals `from` and report whether they did.
/// [`Self::transition_status`] and [`Self::update_sections`] also refuse
/// while a generation lease is held on the lesson.
#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn insert_lesson(&self, new: &NewLessonPlan) -> Result<LessonPlan>;

    async fn get_lesson(&self, id: Uuid) -> Result<Option<LessonPlan>>;

    /// Newest first, optionally restricted to one author.
    async fn list_lessons(&self, author_id: Option<&str>) -> Result<Vec<LessonPlan>>;

    /// Remove a lesson and everything it owns. Returns `false` if absent.
    async fn delete_lesson(&self, id: Uuid) -> Result<bool>;

    async fn transition_status(&self, id: Uuid, from: LessonStatus, to: LessonStatus)
    -> Result<bool>;

    /// Replace the sections and set status to `edited`.
    async fn update_sections(
        &self,
        id: Uuid,
        from: LessonStatus,
        sections: &LessonSections,
    ) -> Result<bool>;

    /// Atomically apply a [`GenerationCommit`] and set status to `generated`.
    async fn commit_generation(
        &self,
        id: Uuid,
        from: LessonStatus,
        commit: &GenerationCommit,
    ) -> Result<bool>;

    /// Take the generation lease on a lesson for `lease`.
    ///
    /// Returns `false` if the lesson does not exist or another caller holds
    /// an unexpired lease. The lease is shared by every process using the
    /// same store.
    async fn try_claim_generation(&self, id: Uuid, lease: Duration) -> Result<bool>;

    /// Drop the generation lease. Releasing an unclaimed lesson is a no-op.
    async fn release_generation(&self, id: Uuid) -> Result<()>;

    /// Whether an unexpired generation lease is held on the lesson.
    async fn generation_claimed(&self, id: Uuid) -> Result<bool>;

    async fn append_context(&self, lesson_id: Uuid, key: &str, value: &str)
    -> Result<ContextEntry>;

    /// Context entries in insertion order.
    async fn list_context(&self, lesson_id: Uuid) -> Result<Vec<ContextEntry>>;

    async fn attach_mapping(
        &self,
        lesson_id: Uuid,
        mapping: &NewCurriculumMapping,
    ) -> Result<CurriculumMapping>;

    /// Primary mapping first.
    async fn list_mappings(&self, lesson_id: Uuid) -> Result<Vec<CurriculumMapping>>;

    async fn record_attempt(&self, attempt: &NewGenerationAttempt) -> Result<GenerationAttempt>;

    /// Oldest first.
    async fn list_attempts(&self, lesson_id: Uuid) -> Result<Vec<GenerationAttempt>>;
}

/// Normalized lookup parameters for [`CurriculumSource::find_standards`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardQuery {
    pub subject: String,
    pub grade_level: String,
    pub country: String,
}

/// Read-only lookup into curriculum reference data.
///
/// Implementations return every standard whose normalized subject, grade
/// level and country equal the query; topic preference and ordering are
/// decided by [`crate::curriculum::select_standard`].
#[async_trait]
pub trait CurriculumSource: Send + Sync {
    async fn find_standards(&self, query: &StandardQuery) -> Result<Vec<CurriculumStandard>>;
}

// Compile-time assertion: both seams must be usable as trait objects.
const _: () = {
    fn _assert_object_safe(_: &dyn LessonStore, _: &dyn CurriculumSource) {}
};
