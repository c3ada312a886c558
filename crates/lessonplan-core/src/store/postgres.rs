//! PostgreSQL-backed stores, delegating to [`lessonplan_db::queries`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use lessonplan_db::models::{
    ContextEntry, CurriculumMapping, CurriculumStandard, GenerationAttempt, LessonPlan,
    LessonSections, LessonStatus, NewCurriculumMapping, NewGenerationAttempt, NewLessonPlan,
};
use lessonplan_db::queries::{
    context_entries, curriculum, generation_attempts, lesson_plans, mappings,
};

use super::{CurriculumSource, GenerationCommit, LessonStore, StandardQuery};

/// [`LessonStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgLessonStore {
    pool: PgPool,
}

impl PgLessonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LessonStore for PgLessonStore {
    async fn insert_lesson(&self, new: &NewLessonPlan) -> Result<LessonPlan> {
        lesson_plans::insert_lesson(&self.pool, new).await
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<LessonPlan>> {
        lesson_plans::get_lesson(&self.pool, id).await
    }

    async fn list_lessons(&self, author_id: Option<&str>) -> Result<Vec<LessonPlan>> {
        lesson_plans::list_lessons(&self.pool, author_id).await
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<bool> {
        lesson_plans::delete_lesson(&self.pool, id).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: LessonStatus,
        to: LessonStatus,
    ) -> Result<bool> {
        let rows = lesson_plans::transition_status(&self.pool, id, from, to).await?;
        Ok(rows > 0)
    }

    async fn update_sections(
        &self,
        id: Uuid,
        from: LessonStatus,
        sections: &LessonSections,
    ) -> Result<bool> {
        let rows = lesson_plans::update_sections(&self.pool, id, from, sections).await?;
        Ok(rows > 0)
    }

    async fn commit_generation(
        &self,
        id: Uuid,
        from: LessonStatus,
        commit: &GenerationCommit,
    ) -> Result<bool> {
        let rows = lesson_plans::commit_generation(
            &self.pool,
            id,
            from,
            &commit.sections,
            &commit.sections_missing,
            commit.primary.as_ref(),
        )
        .await?;
        Ok(rows > 0)
    }

    async fn try_claim_generation(&self, id: Uuid, lease: Duration) -> Result<bool> {
        lesson_plans::try_claim_generation(&self.pool, id, lease).await
    }

    async fn release_generation(&self, id: Uuid) -> Result<()> {
        lesson_plans::release_generation(&self.pool, id).await
    }

    async fn generation_claimed(&self, id: Uuid) -> Result<bool> {
        lesson_plans::generation_claimed(&self.pool, id).await
    }

    async fn append_context(
        &self,
        lesson_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<ContextEntry> {
        context_entries::insert_entry(&self.pool, lesson_id, key, value).await
    }

    async fn list_context(&self, lesson_id: Uuid) -> Result<Vec<ContextEntry>> {
        context_entries::list_entries(&self.pool, lesson_id).await
    }

    async fn attach_mapping(
        &self,
        lesson_id: Uuid,
        mapping: &NewCurriculumMapping,
    ) -> Result<CurriculumMapping> {
        mappings::upsert_mapping(&self.pool, lesson_id, mapping).await
    }

    async fn list_mappings(&self, lesson_id: Uuid) -> Result<Vec<CurriculumMapping>> {
        mappings::list_mappings(&self.pool, lesson_id).await
    }

    async fn record_attempt(&self, attempt: &NewGenerationAttempt) -> Result<GenerationAttempt> {
        generation_attempts::insert_attempt(&self.pool, attempt).await
    }

    async fn list_attempts(&self, lesson_id: Uuid) -> Result<Vec<GenerationAttempt>> {
        generation_attempts::list_attempts(&self.pool, lesson_id).await
    }
}

/// [`CurriculumSource`] over the `curriculum_standards` table.
#[derive(Debug, Clone)]
pub struct PgCurriculumSource {
    pool: PgPool,
}

impl PgCurriculumSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurriculumSource for PgCurriculumSource {
    async fn find_standards(&self, query: &StandardQuery) -> Result<Vec<CurriculumStandard>> {
        curriculum::find_standards(
            &self.pool,
            &query.subject,
            &query.grade_level,
            &query.country,
        )
        .await
    }
}
