//! Error taxonomy for the generation pipeline.
//!
//! Storage failures travel as [`anyhow::Error`] inside a `Storage` variant,
//! the way the database layer reports them.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use lessonplan_db::models::LessonStatus;

/// AI output could not be turned into the six-section structure.
///
/// Every variant keeps the untouched raw text for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("AI output is empty")]
    Empty { raw: String },

    #[error("AI output is not valid JSON: {message}")]
    Malformed { message: String, raw: String },

    #[error("AI output is a JSON {found}, expected an object")]
    NotAnObject { found: &'static str, raw: String },

    #[error("section {key} holds an unsupported {found} value")]
    UnsupportedValue {
        key: String,
        found: &'static str,
        raw: String,
    },

    #[error("AI output is missing sections: {}", .missing.join(", "))]
    MissingSections { missing: Vec<String>, raw: String },
}

impl ParseError {
    pub fn raw(&self) -> &str {
        match self {
            Self::Empty { raw }
            | Self::Malformed { raw, .. }
            | Self::NotAnObject { raw, .. }
            | Self::UnsupportedValue { raw, .. }
            | Self::MissingSections { raw, .. } => raw,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lesson plan {0} not found")]
    LessonNotFound(Uuid),

    /// Either the edge is not in the transition table, or the stored status
    /// changed underneath the caller. `from` is the status actually stored.
    #[error("invalid transition {from} -> {to} for lesson plan {lesson_id}")]
    InvalidTransition {
        lesson_id: Uuid,
        from: LessonStatus,
        to: LessonStatus,
    },

    #[error("transition to {to} must carry generated content")]
    RequiresContent { to: LessonStatus },

    #[error("edit does not change any section")]
    NoChanges,

    /// A generation lease is held on the lesson; its content and status
    /// are about to be replaced.
    #[error("generation in progress for lesson plan {0}")]
    GenerationInProgress(Uuid),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failure reported by an AI content provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Connection failures, 5xx responses, rate limiting, crashed processes.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The provider understood the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("lesson plan {0} not found")]
    LessonNotFound(Uuid),

    #[error("cannot generate lesson plan {lesson_id} from status {from} (to {to})")]
    InvalidTransition {
        lesson_id: Uuid,
        from: LessonStatus,
        to: LessonStatus,
    },

    #[error("generation already in progress for lesson plan {0}")]
    GenerationInProgress(Uuid),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("AI service unavailable after {attempts} attempt(s): {last_error}")]
    AiServiceUnavailable {
        attempts: u32,
        last_error: ProviderError,
    },

    #[error("generation cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl GenerationError {
    /// Stable identifier for callers that branch on the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LessonNotFound(_) => "lesson_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::GenerationInProgress(_) => "generation_in_progress",
            Self::Parse(_) => "parse_error",
            Self::AiServiceUnavailable { .. } => "ai_service_unavailable",
            Self::Cancelled => "cancelled",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<LifecycleError> for GenerationError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::LessonNotFound(id) => Self::LessonNotFound(id),
            LifecycleError::InvalidTransition {
                lesson_id,
                from,
                to,
            } => Self::InvalidTransition {
                lesson_id,
                from,
                to,
            },
            LifecycleError::GenerationInProgress(id) => Self::GenerationInProgress(id),
            LifecycleError::Storage(e) => Self::Storage(e),
            other => Self::Storage(anyhow::Error::new(other)),
        }
    }
}

/// A lesson request or context entry failed validation.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("duration must be between 1 and 600 minutes, got {0}")]
    Duration(i32),

    #[error("lesson plan {0} not found")]
    LessonNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_timeout_are_transient() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ProviderError::Rejected("401".into()).is_transient());
    }

    #[test]
    fn parse_error_keeps_raw_text() {
        let err = ParseError::Malformed {
            message: "EOF".into(),
            raw: "{not json".into(),
        };
        assert_eq!(err.raw(), "{not json");
        assert_eq!(GenerationError::from(err).kind(), "parse_error");
    }

    #[test]
    fn lifecycle_errors_map_onto_generation_errors() {
        let id = Uuid::new_v4();
        let err: GenerationError = LifecycleError::InvalidTransition {
            lesson_id: id,
            from: LessonStatus::Reviewed,
            to: LessonStatus::Generated,
        }
        .into();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(
            GenerationError::from(LifecycleError::LessonNotFound(id)).kind(),
            "lesson_not_found"
        );
        assert_eq!(
            GenerationError::from(LifecycleError::NoChanges).kind(),
            "storage"
        );
        assert_eq!(
            GenerationError::from(LifecycleError::GenerationInProgress(id)).kind(),
            "generation_in_progress"
        );
    }
}
