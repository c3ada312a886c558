//! Generation leases taken through the [`LessonStore`], so that every
//! process sharing the store sees them.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::store::LessonStore;

/// A held generation lease. Release it with [`GenerationClaim::release`];
/// if the owning future is dropped first, the lease is released on a
/// spawned task, and failing that it expires on its own.
pub(crate) struct GenerationClaim {
    store: Arc<dyn LessonStore>,
    lesson_id: Uuid,
    released: bool,
}

impl GenerationClaim {
    /// Take the lease, or `None` if someone else holds it or the lesson
    /// does not exist.
    pub(crate) async fn acquire(
        store: &Arc<dyn LessonStore>,
        lesson_id: Uuid,
        lease: Duration,
    ) -> anyhow::Result<Option<Self>> {
        if !store.try_claim_generation(lesson_id, lease).await? {
            return Ok(None);
        }
        tracing::debug!(
            lesson_id = %lesson_id,
            lease_secs = lease.as_secs(),
            "generation lease taken"
        );
        Ok(Some(Self {
            store: Arc::clone(store),
            lesson_id,
            released: false,
        }))
    }

    pub(crate) async fn release(mut self) {
        self.released = true;
        release_logged(self.store.as_ref(), self.lesson_id).await;
    }
}

async fn release_logged(store: &dyn LessonStore, lesson_id: Uuid) {
    if let Err(e) = store.release_generation(lesson_id).await {
        tracing::warn!(
            lesson_id = %lesson_id,
            error = %e,
            "failed to release generation lease, it will expire"
        );
    }
}

impl Drop for GenerationClaim {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let lesson_id = self.lesson_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { release_logged(store.as_ref(), lesson_id).await });
            }
            Err(_) => tracing::warn!(
                lesson_id = %lesson_id,
                "no runtime to release generation lease, it will expire"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLessonStore;
    use lessonplan_db::models::NewLessonPlan;

    async fn store_with_lesson() -> (Arc<dyn LessonStore>, Uuid) {
        let store: Arc<dyn LessonStore> = Arc::new(MemoryLessonStore::new());
        let lesson = store
            .insert_lesson(&NewLessonPlan {
                author_id: "t".to_string(),
                subject: "Science".to_string(),
                grade_level: "JSS1".to_string(),
                topic: "Water cycle".to_string(),
                title: "Water cycle".to_string(),
                duration_minutes: 40,
                country: "Nigeria".to_string(),
            })
            .await
            .unwrap();
        (store, lesson.id)
    }

    #[tokio::test]
    async fn second_acquire_fails_until_release() {
        let (store, id) = store_with_lesson().await;
        let lease = Duration::from_secs(60);

        let claim = GenerationClaim::acquire(&store, id, lease).await.unwrap().unwrap();
        assert!(GenerationClaim::acquire(&store, id, lease).await.unwrap().is_none());

        claim.release().await;
        assert!(!store.generation_claimed(id).await.unwrap());
        assert!(GenerationClaim::acquire(&store, id, lease).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropped_claim_is_released_in_the_background() {
        let (store, id) = store_with_lesson().await;

        let claim = GenerationClaim::acquire(&store, id, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        drop(claim);
        tokio::task::yield_now().await;

        assert!(!store.generation_claimed(id).await.unwrap());
    }
}
