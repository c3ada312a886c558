//! Shared fixtures for lessonplan-core integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use lessonplan_core::error::ProviderError;
use lessonplan_core::orchestrator::{GenerationConfig, GenerationOrchestrator};
use lessonplan_core::provider::ContentProvider;
use lessonplan_core::request::{NewLessonRequest, create_lesson};
use lessonplan_core::store::{LessonStore, MemoryCurriculum, MemoryLessonStore};
use lessonplan_db::models::{CurriculumStandard, LessonPlan, NewCurriculumStandard};

/// One scripted provider response.
pub enum Step {
    Respond(String),
    Fail(ProviderError),
    /// Never completes; only a timeout, cancellation or drop ends it.
    Hang,
    /// Waits for a permit on the provider's gate, then responds.
    Gated(String),
}

/// A [`ContentProvider`] that plays back a fixed script.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    started: Semaphore,
    gate: Semaphore,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            started: Semaphore::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub fn responding(raw: impl Into<String>) -> Self {
        Self::new([Step::Respond(raw.into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Wait until `n` more calls have started.
    pub async fn wait_started(&self, n: u32) {
        self.started.acquire_many(n).await.unwrap().forget();
    }

    /// Let `n` gated calls finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl ContentProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        self.started.add_permits(1);

        match step {
            Some(Step::Respond(raw)) => Ok(raw),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Gated(raw)) => {
                self.gate.acquire().await.unwrap().forget();
                Ok(raw)
            }
            None => Err(ProviderError::Rejected("script exhausted".to_string())),
        }
    }
}

/// Everything a generation test needs, wired over in-memory stores.
pub struct Fixture {
    pub store: Arc<MemoryLessonStore>,
    pub curriculum: Arc<MemoryCurriculum>,
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

impl Fixture {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_config(provider, GenerationConfig::default())
    }

    pub fn with_config(provider: ScriptedProvider, config: GenerationConfig) -> Self {
        let store = Arc::new(MemoryLessonStore::new());
        let curriculum = Arc::new(MemoryCurriculum::new());
        let provider = Arc::new(provider);
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            store.clone(),
            curriculum.clone(),
            provider.clone(),
            config,
        ));
        Self {
            store,
            curriculum,
            provider,
            orchestrator,
        }
    }

    /// Another orchestrator over the same store, curriculum and provider,
    /// as a second process would build it.
    pub fn second_orchestrator(&self) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            self.store.clone(),
            self.curriculum.clone(),
            self.provider.clone(),
            self.orchestrator.config().clone(),
        )
    }

    /// Poll until no generation lease is held on `lesson_id`. A dropped
    /// generation releases its lease on a spawned task.
    pub async fn wait_released(&self, lesson_id: Uuid) {
        for _ in 0..100 {
            if !self.store.generation_claimed(lesson_id).await.unwrap() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("generation lease on {lesson_id} was never released");
    }

    /// A draft Grade 5 fractions lesson in Nigeria.
    pub async fn fractions_lesson(&self) -> LessonPlan {
        self.lesson("Fractions", Some("Pupils help parents sell tomatoes at the market"))
            .await
    }

    pub async fn lesson(&self, topic: &str, local_context: Option<&str>) -> LessonPlan {
        let request = NewLessonRequest {
            author_id: "teacher-1".to_string(),
            subject: "Mathematics".to_string(),
            grade_level: "Grade 5".to_string(),
            topic: topic.to_string(),
            duration_minutes: 40,
            country: Some("Nigeria".to_string()),
            local_context: local_context.map(str::to_string),
            title: None,
        };
        create_lesson(self.store.as_ref(), &request, "Nigeria")
            .await
            .unwrap()
    }

    pub fn add_standard(&self, code: &str, topic: Option<&str>) -> CurriculumStandard {
        self.curriculum.insert(NewCurriculumStandard {
            subject: "Mathematics".to_string(),
            grade_level: "Grade 5".to_string(),
            country: "Nigeria".to_string(),
            topic: topic.map(str::to_string),
            standard_code: code.to_string(),
            description: format!("Standard {code}"),
        })
    }
}

/// Well-formed provider output with all six sections.
pub fn full_output() -> String {
    serde_json::json!({
        "learningObjectives": "Add fractions with like denominators",
        "localContext": "Tomato baskets shared between stalls",
        "coreContent": "A fraction names equal parts of a whole.",
        "activities": ["Fold paper strips", "Share oranges in groups"],
        "quiz": "1. 1/4 + 2/4 = ?",
        "relatedProjects": "Design a market price chart"
    })
    .to_string()
}
