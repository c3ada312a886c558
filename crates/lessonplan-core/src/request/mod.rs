//! Inbound lesson requests.
//!
//! A request becomes a `draft` lesson before any AI call is made, so a
//! failed generation still leaves a record to inspect and retry.

use serde::{Deserialize, Serialize};

use lessonplan_db::models::{LessonPlan, NewLessonPlan};

use crate::error::RequestError;
use crate::store::LessonStore;

/// Context key under which a request's free-form local context is stored.
pub const LOCAL_CONTEXT_KEY: &str = "local_context";

pub const MIN_DURATION_MINUTES: i32 = 1;
pub const MAX_DURATION_MINUTES: i32 = 600;

/// A teacher's request for a new lesson plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLessonRequest {
    pub author_id: String,
    pub subject: String,
    pub grade_level: String,
    pub topic: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub local_context: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl NewLessonRequest {
    /// Check required fields and the duration range.
    pub fn validate(&self) -> Result<(), RequestError> {
        for (field, value) in [
            ("author_id", &self.author_id),
            ("subject", &self.subject),
            ("grade_level", &self.grade_level),
            ("topic", &self.topic),
        ] {
            if value.trim().is_empty() {
                return Err(RequestError::Blank(field));
            }
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(RequestError::Duration(self.duration_minutes));
        }
        Ok(())
    }

    /// Row to insert, with descriptors trimmed and defaults filled in.
    pub fn to_new_lesson(&self, default_country: &str) -> NewLessonPlan {
        let subject = self.subject.trim().to_string();
        let grade_level = self.grade_level.trim().to_string();
        let topic = self.topic.trim().to_string();
        let title = match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("{topic} ({subject}, {grade_level})"),
        };
        let country = match self.country.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => default_country.to_string(),
        };

        NewLessonPlan {
            author_id: self.author_id.trim().to_string(),
            subject,
            grade_level,
            topic,
            title,
            duration_minutes: self.duration_minutes,
            country,
        }
    }
}

/// Validate a request and store it as a `draft` lesson.
///
/// A non-blank `local_context` becomes the lesson's first context entry.
pub async fn create_lesson(
    store: &dyn LessonStore,
    request: &NewLessonRequest,
    default_country: &str,
) -> Result<LessonPlan, RequestError> {
    request.validate()?;

    let lesson = store
        .insert_lesson(&request.to_new_lesson(default_country))
        .await?;

    if let Some(local) = request.local_context.as_deref().filter(|c| !c.trim().is_empty()) {
        store
            .append_context(lesson.id, LOCAL_CONTEXT_KEY, local.trim())
            .await?;
    }

    tracing::info!(
        lesson_id = %lesson.id,
        author_id = %lesson.author_id,
        subject = %lesson.subject,
        grade_level = %lesson.grade_level,
        "lesson plan created"
    );
    Ok(lesson)
}
