//! Lesson plan status lifecycle.
//!
//! [`LessonLifecycle`] is the only writer of `lesson_plans.status`. Every
//! write is a compare-and-set against the status read just before it; when
//! the stored status has moved on, the write is refused with
//! [`LifecycleError::InvalidTransition`] naming the status actually stored.
//! Edits and plain transitions are also refused with
//! [`LifecycleError::GenerationInProgress`] while a generation lease is held,
//! so a regeneration never overwrites them.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use lessonplan_db::models::{LessonPlan, LessonStatus, Section};

use crate::error::LifecycleError;
use crate::store::{GenerationCommit, LessonStore};

/// A set of section replacements applied by [`LessonLifecycle::edit_sections`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionEdits(BTreeMap<Section, String>);

impl SectionEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, section: Section, text: impl Into<String>) -> Self {
        self.insert(section, text);
        self
    }

    pub fn insert(&mut self, section: Section, text: impl Into<String>) {
        self.0.insert(section, text.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        self.0.iter().map(|(s, t)| (*s, t.as_str()))
    }
}

impl FromIterator<(Section, String)> for SectionEdits {
    fn from_iter<I: IntoIterator<Item = (Section, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The lesson plan state machine.
///
/// ```text
/// draft        -> generated
/// generated    -> edited | archived
/// edited       -> edited | reviewed | generated (regeneration) | archived
/// reviewed     -> exported | edited | archived
/// exported     -> used_offline | edited | archived
/// used_offline -> archived | edited
/// archived     -> (terminal)
/// ```
#[derive(Clone)]
pub struct LessonLifecycle {
    store: Arc<dyn LessonStore>,
}

impl LessonLifecycle {
    pub fn new(store: Arc<dyn LessonStore>) -> Self {
        Self { store }
    }

    /// Check whether `from -> to` is an edge in the state graph.
    pub fn is_valid_transition(from: LessonStatus, to: LessonStatus) -> bool {
        use lessonplan_db::models::LessonStatus::*;
        matches!(
            (from, to),
            (Draft, Generated)
                | (Generated, Edited)
                | (Generated, Archived)
                | (Edited, Edited)
                | (Edited, Reviewed)
                | (Edited, Generated)
                | (Edited, Archived)
                | (Reviewed, Exported)
                | (Reviewed, Edited)
                | (Reviewed, Archived)
                | (Exported, UsedOffline)
                | (Exported, Edited)
                | (Exported, Archived)
                | (UsedOffline, Archived)
                | (UsedOffline, Edited)
        )
    }

    /// Every status reachable from `from` in one step.
    pub fn allowed_targets(from: LessonStatus) -> Vec<LessonStatus> {
        LessonStatus::ALL
            .into_iter()
            .filter(|to| Self::is_valid_transition(from, *to))
            .collect()
    }

    async fn load(&self, lesson_id: Uuid) -> Result<LessonPlan, LifecycleError> {
        self.store
            .get_lesson(lesson_id)
            .await?
            .ok_or(LifecycleError::LessonNotFound(lesson_id))
    }

    /// Build the error for a content edit or plain transition that matched
    /// no row: either a generation lease is held or the status moved.
    async fn refused(&self, lesson_id: Uuid, to: LessonStatus) -> LifecycleError {
        match self.store.generation_claimed(lesson_id).await {
            Ok(true) => {
                tracing::info!(lesson_id = %lesson_id, to = %to, "refused during generation");
                LifecycleError::GenerationInProgress(lesson_id)
            }
            Ok(false) => self.lost_race(lesson_id, to).await,
            Err(e) => LifecycleError::Storage(e),
        }
    }

    /// Build the error for a compare-and-set that matched no row.
    async fn lost_race(&self, lesson_id: Uuid, to: LessonStatus) -> LifecycleError {
        match self.store.get_lesson(lesson_id).await {
            Ok(Some(current)) => {
                tracing::warn!(
                    lesson_id = %lesson_id,
                    current = %current.status,
                    to = %to,
                    "status changed concurrently"
                );
                LifecycleError::InvalidTransition {
                    lesson_id,
                    from: current.status,
                    to,
                }
            }
            Ok(None) => LifecycleError::LessonNotFound(lesson_id),
            Err(e) => LifecycleError::Storage(e),
        }
    }

    /// Move a lesson to `to` without changing its content.
    ///
    /// `generated` is only reachable through [`Self::complete_generation`].
    pub async fn transition(
        &self,
        lesson_id: Uuid,
        to: LessonStatus,
    ) -> Result<LessonPlan, LifecycleError> {
        if to == LessonStatus::Generated {
            return Err(LifecycleError::RequiresContent { to });
        }

        let lesson = self.load(lesson_id).await?;
        let from = lesson.status;
        if !Self::is_valid_transition(from, to) {
            return Err(LifecycleError::InvalidTransition { lesson_id, from, to });
        }

        if !self.store.transition_status(lesson_id, from, to).await? {
            return Err(self.refused(lesson_id, to).await);
        }

        tracing::info!(lesson_id = %lesson_id, from = %from, to = %to, "lesson status changed");
        self.load(lesson_id).await
    }

    /// Replace some sections and move the lesson to `edited`.
    ///
    /// Fails with [`LifecycleError::NoChanges`] when every edited section
    /// already holds the given text.
    pub async fn edit_sections(
        &self,
        lesson_id: Uuid,
        edits: &SectionEdits,
    ) -> Result<LessonPlan, LifecycleError> {
        let lesson = self.load(lesson_id).await?;
        let from = lesson.status;
        if !Self::is_valid_transition(from, LessonStatus::Edited) {
            return Err(LifecycleError::InvalidTransition {
                lesson_id,
                from,
                to: LessonStatus::Edited,
            });
        }

        let mut sections = lesson.sections.clone();
        for (section, text) in edits.iter() {
            sections.set(section, text.to_string());
        }
        if sections == lesson.sections {
            return Err(LifecycleError::NoChanges);
        }

        if !self.store.update_sections(lesson_id, from, &sections).await? {
            return Err(self.refused(lesson_id, LessonStatus::Edited).await);
        }

        tracing::info!(
            lesson_id = %lesson_id,
            from = %from,
            sections = edits.0.len(),
            "lesson sections edited"
        );
        self.load(lesson_id).await
    }

    /// Persist generated content and move the lesson from `from` to
    /// `generated` in one atomic write.
    pub async fn complete_generation(
        &self,
        lesson_id: Uuid,
        from: LessonStatus,
        commit: &GenerationCommit,
    ) -> Result<LessonPlan, LifecycleError> {
        let to = LessonStatus::Generated;
        if !Self::is_valid_transition(from, to) {
            return Err(LifecycleError::InvalidTransition { lesson_id, from, to });
        }

        if !self.store.commit_generation(lesson_id, from, commit).await? {
            return Err(self.lost_race(lesson_id, to).await);
        }

        tracing::info!(
            lesson_id = %lesson_id,
            from = %from,
            missing = commit.sections_missing.len(),
            primary_mapping = commit.primary.is_some(),
            "lesson generated"
        );
        self.load(lesson_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonplan_db::models::LessonStatus::*;

    #[test]
    fn allowed_targets_follow_table() {
        assert_eq!(LessonLifecycle::allowed_targets(Draft), vec![Generated]);
        assert_eq!(
            LessonLifecycle::allowed_targets(Edited),
            vec![Generated, Edited, Reviewed, Archived]
        );
        assert_eq!(
            LessonLifecycle::allowed_targets(UsedOffline),
            vec![Edited, Archived]
        );
        assert!(LessonLifecycle::allowed_targets(Archived).is_empty());
    }

    #[test]
    fn archived_reachable_from_every_post_generation_state() {
        for from in LessonStatus::ALL {
            let expected = from.is_post_generation() && from != Archived;
            assert_eq!(LessonLifecycle::is_valid_transition(from, Archived), expected);
        }
    }

    #[test]
    fn no_backward_skips() {
        assert!(!LessonLifecycle::is_valid_transition(Draft, Exported));
        assert!(!LessonLifecycle::is_valid_transition(Draft, Edited));
        assert!(!LessonLifecycle::is_valid_transition(Reviewed, Generated));
        assert!(!LessonLifecycle::is_valid_transition(Generated, Generated));
        assert!(!LessonLifecycle::is_valid_transition(Exported, Reviewed));
    }

    #[test]
    fn section_edits_collect_and_iterate_in_canonical_order() {
        let edits: SectionEdits = vec![
            (Section::Quiz, "Q".to_string()),
            (Section::LearningObjectives, "L".to_string()),
        ]
        .into_iter()
        .collect();
        let order: Vec<Section> = edits.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec![Section::LearningObjectives, Section::Quiz]);
        assert!(SectionEdits::new().is_empty());
    }
}
