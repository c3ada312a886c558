//! In-process stores with the same semantics as the Postgres ones:
//! compare-and-set status writes, generation leases, cascading deletes, one
//! primary mapping per lesson, insertion-ordered context.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use lessonplan_db::models::{
    ContextEntry, CurriculumMapping, CurriculumStandard, GenerationAttempt, LessonPlan,
    LessonSections, LessonStatus, MappingType, NewCurriculumMapping, NewCurriculumStandard,
    NewGenerationAttempt, NewLessonPlan,
};

use super::{CurriculumSource, GenerationCommit, LessonStore, StandardQuery};
use crate::curriculum::normalize;

#[derive(Debug, Default)]
struct State {
    lessons: HashMap<Uuid, LessonPlan>,
    /// Lease deadline per lesson with a generation running.
    leases: HashMap<Uuid, Instant>,
    context: Vec<ContextEntry>,
    mappings: Vec<CurriculumMapping>,
    attempts: Vec<GenerationAttempt>,
    next_context_id: i64,
    next_attempt_id: i64,
}

impl State {
    fn lesson_mut(&mut self, id: Uuid, from: LessonStatus) -> Option<&mut LessonPlan> {
        self.lessons.get_mut(&id).filter(|l| l.status == from)
    }

    fn leased(&self, id: Uuid) -> bool {
        self.leases
            .get(&id)
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Like [`Self::lesson_mut`], but `None` while a generation lease is held.
    fn unleased_mut(&mut self, id: Uuid, from: LessonStatus) -> Option<&mut LessonPlan> {
        if self.leased(id) {
            return None;
        }
        self.lesson_mut(id, from)
    }

    fn require_lesson(&self, id: Uuid) -> Result<()> {
        if !self.lessons.contains_key(&id) {
            bail!("lesson plan {id} not found");
        }
        Ok(())
    }

    fn upsert_mapping(
        &mut self,
        lesson_id: Uuid,
        mapping: &NewCurriculumMapping,
    ) -> Result<CurriculumMapping> {
        if mapping.mapping_type == MappingType::Primary
            && self.mappings.iter().any(|m| {
                m.lesson_id == lesson_id
                    && m.mapping_type == MappingType::Primary
                    && m.standard_id != mapping.standard_id
            })
        {
            bail!("lesson plan {lesson_id} already has a primary curriculum mapping");
        }

        self.mappings
            .retain(|m| !(m.lesson_id == lesson_id && m.standard_id == mapping.standard_id));
        let row = CurriculumMapping {
            lesson_id,
            standard_id: mapping.standard_id,
            mapping_type: mapping.mapping_type,
            coverage_percentage: mapping.coverage_percentage,
            created_at: Utc::now(),
        };
        self.mappings.push(row.clone());
        Ok(row)
    }
}

/// [`LessonStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryLessonStore {
    state: Mutex<State>,
}

impl MemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn insert_lesson(&self, new: &NewLessonPlan) -> Result<LessonPlan> {
        let now = Utc::now();
        let lesson = LessonPlan {
            id: Uuid::new_v4(),
            author_id: new.author_id.clone(),
            subject: new.subject.clone(),
            grade_level: new.grade_level.clone(),
            topic: new.topic.clone(),
            title: new.title.clone(),
            duration_minutes: new.duration_minutes,
            country: new.country.clone(),
            sections: LessonSections::default(),
            sections_missing: Vec::new(),
            status: LessonStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.state().lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn get_lesson(&self, id: Uuid) -> Result<Option<LessonPlan>> {
        Ok(self.state().lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, author_id: Option<&str>) -> Result<Vec<LessonPlan>> {
        let mut lessons: Vec<LessonPlan> = self
            .state()
            .lessons
            .values()
            .filter(|l| author_id.is_none_or(|a| l.author_id == a))
            .cloned()
            .collect();
        lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(lessons)
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state();
        if state.lessons.remove(&id).is_none() {
            return Ok(false);
        }
        state.leases.remove(&id);
        state.context.retain(|e| e.lesson_id != id);
        state.mappings.retain(|m| m.lesson_id != id);
        state.attempts.retain(|a| a.lesson_id != id);
        Ok(true)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: LessonStatus,
        to: LessonStatus,
    ) -> Result<bool> {
        let mut state = self.state();
        let Some(lesson) = state.unleased_mut(id, from) else {
            return Ok(false);
        };
        lesson.status = to;
        lesson.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_sections(
        &self,
        id: Uuid,
        from: LessonStatus,
        sections: &LessonSections,
    ) -> Result<bool> {
        let mut state = self.state();
        let Some(lesson) = state.unleased_mut(id, from) else {
            return Ok(false);
        };
        lesson.sections = sections.clone();
        lesson.status = LessonStatus::Edited;
        lesson.updated_at = Utc::now();
        Ok(true)
    }

    async fn commit_generation(
        &self,
        id: Uuid,
        from: LessonStatus,
        commit: &GenerationCommit,
    ) -> Result<bool> {
        let mut state = self.state();
        if state.lesson_mut(id, from).is_none() {
            return Ok(false);
        }

        let mut mappings: Vec<CurriculumMapping> = state
            .mappings
            .iter()
            .filter(|m| !(m.lesson_id == id && m.mapping_type == MappingType::Primary))
            .cloned()
            .collect();
        if let Some(primary) = &commit.primary {
            mappings.retain(|m| !(m.lesson_id == id && m.standard_id == primary.standard_id));
            mappings.push(CurriculumMapping {
                lesson_id: id,
                standard_id: primary.standard_id,
                mapping_type: MappingType::Primary,
                coverage_percentage: primary.coverage_percentage,
                created_at: Utc::now(),
            });
        }
        state.mappings = mappings;

        let Some(lesson) = state.lessons.get_mut(&id) else {
            return Ok(false);
        };
        lesson.sections = commit.sections.clone();
        lesson.sections_missing = commit.sections_missing.clone();
        lesson.status = LessonStatus::Generated;
        lesson.updated_at = Utc::now();
        Ok(true)
    }

    async fn try_claim_generation(&self, id: Uuid, lease: Duration) -> Result<bool> {
        let mut state = self.state();
        if !state.lessons.contains_key(&id) || state.leased(id) {
            return Ok(false);
        }
        state.leases.insert(id, Instant::now() + lease);
        Ok(true)
    }

    async fn release_generation(&self, id: Uuid) -> Result<()> {
        self.state().leases.remove(&id);
        Ok(())
    }

    async fn generation_claimed(&self, id: Uuid) -> Result<bool> {
        Ok(self.state().leased(id))
    }

    async fn append_context(
        &self,
        lesson_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<ContextEntry> {
        let mut state = self.state();
        state.require_lesson(lesson_id)?;
        state.next_context_id += 1;
        let entry = ContextEntry {
            id: state.next_context_id,
            lesson_id,
            key: key.to_string(),
            value: value.to_string(),
            created_at: Utc::now(),
        };
        state.context.push(entry.clone());
        Ok(entry)
    }

    async fn list_context(&self, lesson_id: Uuid) -> Result<Vec<ContextEntry>> {
        Ok(self
            .state()
            .context
            .iter()
            .filter(|e| e.lesson_id == lesson_id)
            .cloned()
            .collect())
    }

    async fn attach_mapping(
        &self,
        lesson_id: Uuid,
        mapping: &NewCurriculumMapping,
    ) -> Result<CurriculumMapping> {
        let mut state = self.state();
        state.require_lesson(lesson_id)?;
        state.upsert_mapping(lesson_id, mapping)
    }

    async fn list_mappings(&self, lesson_id: Uuid) -> Result<Vec<CurriculumMapping>> {
        let mut rows: Vec<CurriculumMapping> = self
            .state()
            .mappings
            .iter()
            .filter(|m| m.lesson_id == lesson_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.mapping_type != MappingType::Primary, m.created_at, m.standard_id));
        Ok(rows)
    }

    async fn record_attempt(&self, attempt: &NewGenerationAttempt) -> Result<GenerationAttempt> {
        let mut state = self.state();
        state.require_lesson(attempt.lesson_id)?;
        state.next_attempt_id += 1;
        let row = GenerationAttempt {
            id: state.next_attempt_id,
            lesson_id: attempt.lesson_id,
            attempt: attempt.attempt,
            outcome: attempt.outcome,
            provider: attempt.provider.clone(),
            raw_output: attempt.raw_output.clone(),
            error_message: attempt.error_message.clone(),
            latency_ms: attempt.latency_ms,
            recorded_at: Utc::now(),
        };
        state.attempts.push(row.clone());
        Ok(row)
    }

    async fn list_attempts(&self, lesson_id: Uuid) -> Result<Vec<GenerationAttempt>> {
        Ok(self
            .state()
            .attempts
            .iter()
            .filter(|a| a.lesson_id == lesson_id)
            .cloned()
            .collect())
    }
}

/// [`CurriculumSource`] over an in-memory list of standards.
#[derive(Debug, Default)]
pub struct MemoryCurriculum {
    standards: RwLock<Vec<CurriculumStandard>>,
}

impl MemoryCurriculum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a standard created now.
    pub fn insert(&self, new: NewCurriculumStandard) -> CurriculumStandard {
        self.insert_at(new, Utc::now())
    }

    /// Add a standard with an explicit creation time.
    pub fn insert_at(
        &self,
        new: NewCurriculumStandard,
        created_at: DateTime<Utc>,
    ) -> CurriculumStandard {
        let standard = CurriculumStandard {
            id: Uuid::new_v4(),
            subject: new.subject,
            grade_level: new.grade_level,
            country: new.country,
            topic: new.topic,
            standard_code: new.standard_code,
            description: new.description,
            created_at,
        };
        self.standards
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(standard.clone());
        standard
    }
}

#[async_trait]
impl CurriculumSource for MemoryCurriculum {
    async fn find_standards(&self, query: &StandardQuery) -> Result<Vec<CurriculumStandard>> {
        let standards = self.standards.read().unwrap_or_else(|e| e.into_inner());
        Ok(standards
            .iter()
            .filter(|s| {
                normalize(&s.subject) == query.subject
                    && normalize(&s.grade_level) == query.grade_level
                    && normalize(&s.country) == query.country
            })
            .cloned()
            .collect())
    }
}
