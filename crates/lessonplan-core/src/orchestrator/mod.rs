//! Generation orchestrator: takes a `draft` (or `edited`) lesson through
//! curriculum matching, prompt assembly, the AI provider call and parsing,
//! then commits the result through the lifecycle.
//!
//! - At most one generation runs per lesson, across every orchestrator and
//!   process sharing the store. The lesson's generation lease is taken
//!   through [`LessonStore::try_claim_generation`] before anything else; a
//!   second call while it is held fails fast with
//!   [`GenerationError::GenerationInProgress`]. Edits and plain transitions
//!   are refused while the lease is held.
//! - The provider call is bounded by [`GenerationConfig::timeout`] and
//!   retried once on a transport error or timeout. Rejections and parse
//!   failures are not retried.
//! - Nothing touches the lesson row until the single atomic commit, so an
//!   error, cancellation or dropped future leaves it in its pre-call state.
//! - Every provider call is recorded as a generation attempt, including the
//!   raw output of calls whose output failed to parse.

mod claim;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use lessonplan_db::models::{
    AttemptOutcome, LessonPlan, LessonStatus, MappingType, NewCurriculumMapping,
    NewGenerationAttempt,
};

use crate::content::ContentParser;
use crate::curriculum::{CurriculumMatcher, DEFAULT_COUNTRY, MatchOutcome, MatchQuery};
use crate::error::{GenerationError, ProviderError};
use crate::lifecycle::LessonLifecycle;
use crate::prompt::{DEFAULT_CONTEXT_BUDGET_CHARS, PromptRequest, assemble_prompt};
use crate::provider::ContentProvider;
use crate::store::{CurriculumSource, GenerationCommit, LessonStore};

use claim::GenerationClaim;

/// Provider calls per generate: the first try plus one retry.
pub const MAX_PROVIDER_ATTEMPTS: u32 = 2;

/// Lease slack on top of the provider deadlines, covering lookup, parsing
/// and the commit.
const LEASE_MARGIN: Duration = Duration::from_secs(60);

/// Knobs for a [`GenerationOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Deadline for a single provider call.
    pub timeout: Duration,
    /// Character budget for local context in the prompt.
    pub context_budget_chars: usize,
    /// Country used for curriculum matching when a lesson has none.
    pub default_country: String,
    /// Reject AI output that omits any section.
    pub require_all_sections: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            context_budget_chars: DEFAULT_CONTEXT_BUDGET_CHARS,
            default_country: DEFAULT_COUNTRY.to_string(),
            require_all_sections: false,
        }
    }
}

/// Raw provider output and the attempt that produced it.
struct ProviderOutput {
    raw: String,
    attempt: u32,
    latency_ms: i64,
}

pub struct GenerationOrchestrator {
    store: Arc<dyn LessonStore>,
    lifecycle: LessonLifecycle,
    matcher: CurriculumMatcher,
    provider: Arc<dyn ContentProvider>,
    config: GenerationConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn LessonStore>,
        curriculum: Arc<dyn CurriculumSource>,
        provider: Arc<dyn ContentProvider>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            lifecycle: LessonLifecycle::new(Arc::clone(&store)),
            matcher: CurriculumMatcher::new(curriculum, config.default_country.clone()),
            store,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LessonLifecycle {
        &self.lifecycle
    }

    pub fn matcher(&self) -> &CurriculumMatcher {
        &self.matcher
    }

    /// Whether any caller sharing the store is generating `lesson_id`.
    pub async fn is_in_flight(&self, lesson_id: Uuid) -> anyhow::Result<bool> {
        self.store.generation_claimed(lesson_id).await
    }

    /// How long a generation lease lasts if never released.
    pub fn lease(&self) -> Duration {
        self.config.timeout * MAX_PROVIDER_ATTEMPTS + LEASE_MARGIN
    }

    /// Generate content for a lesson and move it to `generated`.
    pub async fn generate(&self, lesson_id: Uuid) -> Result<LessonPlan, GenerationError> {
        self.generate_with_cancel(lesson_id, CancellationToken::new())
            .await
    }

    /// Like [`Self::generate`], aborting the provider call when `cancel`
    /// fires. Once provider output is in hand the commit runs to completion.
    pub async fn generate_with_cancel(
        &self,
        lesson_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<LessonPlan, GenerationError> {
        let Some(claim) = GenerationClaim::acquire(&self.store, lesson_id, self.lease()).await?
        else {
            return Err(self.claim_refused(lesson_id).await);
        };

        let result = self.run(lesson_id, &cancel).await;
        claim.release().await;
        match &result {
            Ok(lesson) => tracing::info!(
                lesson_id = %lesson_id,
                missing = lesson.sections_missing.len(),
                "generation completed"
            ),
            Err(e) => tracing::warn!(
                lesson_id = %lesson_id,
                kind = e.kind(),
                error = %e,
                "generation failed"
            ),
        }
        result
    }

    /// Explain why the lease could not be taken.
    async fn claim_refused(&self, lesson_id: Uuid) -> GenerationError {
        match self.store.get_lesson(lesson_id).await {
            Ok(Some(_)) => {
                tracing::info!(lesson_id = %lesson_id, "generation already in progress");
                GenerationError::GenerationInProgress(lesson_id)
            }
            Ok(None) => GenerationError::LessonNotFound(lesson_id),
            Err(e) => GenerationError::Storage(e),
        }
    }

    async fn run(
        &self,
        lesson_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<LessonPlan, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let lesson = self
            .store
            .get_lesson(lesson_id)
            .await?
            .ok_or(GenerationError::LessonNotFound(lesson_id))?;
        let from = lesson.status;
        if !LessonLifecycle::is_valid_transition(from, LessonStatus::Generated) {
            return Err(GenerationError::InvalidTransition {
                lesson_id,
                from,
                to: LessonStatus::Generated,
            });
        }

        let matched = self.match_curriculum(&lesson).await;
        let context = self.store.list_context(lesson_id).await?;
        let prompt = assemble_prompt(
            PromptRequest::from(&lesson),
            matched.standard(),
            &context,
            self.config.context_budget_chars,
        );
        tracing::debug!(
            lesson_id = %lesson_id,
            included = prompt.included_entries,
            omitted = prompt.omitted_entries,
            truncated = prompt.truncated_entry,
            prompt_chars = prompt.text.chars().count(),
            "prompt assembled"
        );
        if prompt.newest_omitted {
            tracing::warn!(
                lesson_id = %lesson_id,
                budget = self.config.context_budget_chars,
                entries = context.len(),
                "context budget too small for the newest local context entry, none included"
            );
        } else if prompt.omitted_entries > 0 || prompt.truncated_entry {
            tracing::info!(
                lesson_id = %lesson_id,
                omitted = prompt.omitted_entries,
                truncated = prompt.truncated_entry,
                "local context exceeded the prompt budget"
            );
        }

        let output = self.call_provider(lesson_id, &prompt.text, cancel).await?;

        let parser = ContentParser::new(self.config.require_all_sections);
        let parsed = match parser.parse(&output.raw) {
            Ok(parsed) => {
                self.record_attempt(
                    lesson_id,
                    output.attempt,
                    AttemptOutcome::Succeeded,
                    Some(output.raw.clone()),
                    None,
                    output.latency_ms,
                )
                .await;
                parsed
            }
            Err(e) => {
                self.record_attempt(
                    lesson_id,
                    output.attempt,
                    AttemptOutcome::ParseError,
                    Some(output.raw.clone()),
                    Some(e.to_string()),
                    output.latency_ms,
                )
                .await;
                return Err(e.into());
            }
        };

        let primary = match &matched {
            MatchOutcome::Matched { standard, kind } => Some(NewCurriculumMapping {
                standard_id: standard.id,
                mapping_type: MappingType::Primary,
                coverage_percentage: Some(kind.coverage_percentage()),
            }),
            MatchOutcome::NotFound { .. } => None,
        };
        let commit = GenerationCommit {
            sections_missing: parsed.missing_keys(),
            sections: parsed.sections,
            primary,
        };

        Ok(self
            .lifecycle
            .complete_generation(lesson_id, from, &commit)
            .await?)
    }

    /// Best-effort curriculum lookup; lookup failures count as not found.
    async fn match_curriculum(&self, lesson: &LessonPlan) -> MatchOutcome {
        let query = MatchQuery {
            subject: lesson.subject.clone(),
            grade_level: lesson.grade_level.clone(),
            country: Some(lesson.country.clone()),
            topic: Some(lesson.topic.clone()),
        };
        match self.matcher.find_match(&query).await {
            Ok(outcome) => {
                if let MatchOutcome::NotFound { .. } = &outcome {
                    tracing::info!(
                        lesson_id = %lesson.id,
                        "no curriculum standard, generating unaligned"
                    );
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    lesson_id = %lesson.id,
                    error = %e,
                    "curriculum lookup failed, generating unaligned"
                );
                MatchOutcome::NotFound {
                    searched: self.matcher.resolve(&query),
                }
            }
        }
    }

    /// Call the provider under the timeout, retrying once on a transient
    /// failure.
    async fn call_provider(
        &self,
        lesson_id: Uuid,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<ProviderOutput, GenerationError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = tokio::time::timeout(self.config.timeout, self.provider.generate(prompt)) => {
                    Some(r.unwrap_or(Err(ProviderError::Timeout(self.config.timeout))))
                }
            };
            let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

            let error = match result {
                None => {
                    self.record_attempt(
                        lesson_id,
                        attempt,
                        AttemptOutcome::Cancelled,
                        None,
                        None,
                        latency_ms,
                    )
                    .await;
                    return Err(GenerationError::Cancelled);
                }
                Some(Ok(raw)) => {
                    return Ok(ProviderOutput {
                        raw,
                        attempt,
                        latency_ms,
                    });
                }
                Some(Err(e)) => e,
            };

            let outcome = match error {
                ProviderError::Transport(_) => AttemptOutcome::TransportError,
                ProviderError::Timeout(_) => AttemptOutcome::Timeout,
                ProviderError::Rejected(_) => AttemptOutcome::Rejected,
            };
            self.record_attempt(
                lesson_id,
                attempt,
                outcome,
                None,
                Some(error.to_string()),
                latency_ms,
            )
            .await;

            if error.is_transient() && attempt < MAX_PROVIDER_ATTEMPTS {
                tracing::warn!(
                    lesson_id = %lesson_id,
                    attempt,
                    provider = self.provider.name(),
                    error = %error,
                    "provider call failed, retrying"
                );
                continue;
            }

            return Err(GenerationError::AiServiceUnavailable {
                attempts: attempt,
                last_error: error,
            });
        }
    }

    /// Append to the attempt log. Failures are logged, never propagated.
    async fn record_attempt(
        &self,
        lesson_id: Uuid,
        attempt: u32,
        outcome: AttemptOutcome,
        raw_output: Option<String>,
        error_message: Option<String>,
        latency_ms: i64,
    ) {
        let record = NewGenerationAttempt {
            lesson_id,
            attempt: i32::try_from(attempt).unwrap_or(i32::MAX),
            outcome,
            provider: self.provider.name().to_string(),
            raw_output,
            error_message,
            latency_ms,
        };
        tracing::debug!(
            lesson_id = %lesson_id,
            attempt,
            outcome = %outcome,
            latency_ms,
            "provider attempt"
        );
        if let Err(e) = self.store.record_attempt(&record).await {
            tracing::warn!(
                lesson_id = %lesson_id,
                attempt,
                error = %e,
                "failed to record generation attempt"
            );
        }
    }
}
