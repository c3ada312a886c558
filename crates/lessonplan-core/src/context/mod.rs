//! Teacher-supplied local context, kept per lesson as an append-only list
//! of key/value entries.

use std::sync::Arc;

use uuid::Uuid;

use lessonplan_db::models::ContextEntry;

use crate::error::RequestError;
use crate::store::LessonStore;

#[derive(Clone)]
pub struct ContextStore {
    store: Arc<dyn LessonStore>,
}

impl ContextStore {
    pub fn new(store: Arc<dyn LessonStore>) -> Self {
        Self { store }
    }

    /// Append an entry. Keys may repeat; earlier entries are kept.
    ///
    /// The key is trimmed and must not be blank. The value is stored as
    /// given.
    pub async fn append(
        &self,
        lesson_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<ContextEntry, RequestError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RequestError::Blank("context key"));
        }
        if self.store.get_lesson(lesson_id).await?.is_none() {
            return Err(RequestError::LessonNotFound(lesson_id));
        }

        let entry = self.store.append_context(lesson_id, key, value).await?;
        tracing::debug!(lesson_id = %lesson_id, entry_id = entry.id, key, "context entry added");
        Ok(entry)
    }

    /// Entries in insertion order.
    pub async fn list(&self, lesson_id: Uuid) -> anyhow::Result<Vec<ContextEntry>> {
        self.store.list_context(lesson_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLessonStore;
    use lessonplan_db::models::NewLessonPlan;

    async fn setup() -> (ContextStore, Uuid) {
        let store = Arc::new(MemoryLessonStore::new());
        let lesson = store
            .insert_lesson(&NewLessonPlan {
                author_id: "t-1".into(),
                subject: "Geography".into(),
                grade_level: "SS2".into(),
                topic: "Rivers".into(),
                title: "Rivers".into(),
                duration_minutes: 45,
                country: "Nigeria".into(),
            })
            .await
            .unwrap();
        (ContextStore::new(store), lesson.id)
    }

    #[tokio::test]
    async fn repeated_keys_keep_history_in_order() {
        let (context, lesson_id) = setup().await;
        context.append(lesson_id, "river", "Niger").await.unwrap();
        context.append(lesson_id, " river ", "Benue").await.unwrap();

        let entries = context.list(lesson_id).await.unwrap();
        let values: Vec<_> = entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect();
        assert_eq!(values, vec![("river", "Niger"), ("river", "Benue")]);
        assert!(entries[0].id < entries[1].id);
    }

    #[tokio::test]
    async fn rejects_blank_key_and_unknown_lesson() {
        let (context, lesson_id) = setup().await;
        assert!(matches!(
            context.append(lesson_id, "  ", "x").await,
            Err(RequestError::Blank(_))
        ));
        assert!(matches!(
            context.append(Uuid::new_v4(), "market", "Onitsha").await,
            Err(RequestError::LessonNotFound(_))
        ));
    }
}
