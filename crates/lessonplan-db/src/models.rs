use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a lesson plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Draft,
    Generated,
    Edited,
    Reviewed,
    Exported,
    UsedOffline,
    Archived,
}

impl LessonStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [LessonStatus; 7] = [
        Self::Draft,
        Self::Generated,
        Self::Edited,
        Self::Reviewed,
        Self::Exported,
        Self::UsedOffline,
        Self::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Edited => "edited",
            Self::Reviewed => "reviewed",
            Self::Exported => "exported",
            Self::UsedOffline => "used_offline",
            Self::Archived => "archived",
        }
    }

    /// Whether the lesson has been through at least one successful
    /// generation (all six sections are present).
    pub fn is_post_generation(&self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = LessonStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "generated" => Ok(Self::Generated),
            "edited" => Ok(Self::Edited),
            "reviewed" => Ok(Self::Reviewed),
            "exported" => Ok(Self::Exported),
            "used_offline" => Ok(Self::UsedOffline),
            "archived" => Ok(Self::Archived),
            other => Err(LessonStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`LessonStatus`] string.
#[derive(Debug, Clone)]
pub struct LessonStatusParseError(pub String);

impl fmt::Display for LessonStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid lesson status: {:?}", self.0)
    }
}

impl std::error::Error for LessonStatusParseError {}

// ---------------------------------------------------------------------------

/// How a curriculum standard relates to a lesson plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    Primary,
    Secondary,
    Supplementary,
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Supplementary => "supplementary",
        };
        f.write_str(s)
    }
}

impl FromStr for MappingType {
    type Err = MappingTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "supplementary" => Ok(Self::Supplementary),
            other => Err(MappingTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MappingType`] string.
#[derive(Debug, Clone)]
pub struct MappingTypeParseError(pub String);

impl fmt::Display for MappingTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mapping type: {:?}", self.0)
    }
}

impl std::error::Error for MappingTypeParseError {}

// ---------------------------------------------------------------------------

/// Outcome of a single AI provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    TransportError,
    Timeout,
    Rejected,
    ParseError,
    Cancelled,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::TransportError => "transport_error",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::ParseError => "parse_error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// One of the six canonical lesson plan sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    LearningObjectives,
    LocalContext,
    CoreContent,
    Activities,
    Quiz,
    RelatedProjects,
}

impl Section {
    /// All sections in canonical order.
    pub const ALL: [Section; 6] = [
        Self::LearningObjectives,
        Self::LocalContext,
        Self::CoreContent,
        Self::Activities,
        Self::Quiz,
        Self::RelatedProjects,
    ];

    /// The canonical (camelCase) key used in AI output and exports.
    pub fn key(&self) -> &'static str {
        match self {
            Self::LearningObjectives => "learningObjectives",
            Self::LocalContext => "localContext",
            Self::CoreContent => "coreContent",
            Self::Activities => "activities",
            Self::Quiz => "quiz",
            Self::RelatedProjects => "relatedProjects",
        }
    }

    /// The snake_case spelling, which is also the column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::LearningObjectives => "learning_objectives",
            Self::LocalContext => "local_context",
            Self::CoreContent => "core_content",
            Self::Activities => "activities",
            Self::Quiz => "quiz",
            Self::RelatedProjects => "related_projects",
        }
    }

    /// Human-readable heading.
    pub fn title(&self) -> &'static str {
        match self {
            Self::LearningObjectives => "Learning Objectives",
            Self::LocalContext => "Local Context",
            Self::CoreContent => "Core Content",
            Self::Activities => "Activities",
            Self::Quiz => "Quiz",
            Self::RelatedProjects => "Related Projects",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Section {
    type Err = SectionParseError;

    /// Accepts either the camelCase key or the snake_case column name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.key() == s || section.column() == s)
            .ok_or_else(|| SectionParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`Section`] string.
#[derive(Debug, Clone)]
pub struct SectionParseError(pub String);

impl fmt::Display for SectionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid section: {:?}", self.0)
    }
}

impl std::error::Error for SectionParseError {}

/// The six-section content of a lesson plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LessonSections {
    pub learning_objectives: String,
    pub local_context: String,
    pub core_content: String,
    pub activities: String,
    pub quiz: String,
    pub related_projects: String,
}

impl LessonSections {
    pub fn get(&self, section: Section) -> &str {
        match section {
            Section::LearningObjectives => &self.learning_objectives,
            Section::LocalContext => &self.local_context,
            Section::CoreContent => &self.core_content,
            Section::Activities => &self.activities,
            Section::Quiz => &self.quiz,
            Section::RelatedProjects => &self.related_projects,
        }
    }

    pub fn set(&mut self, section: Section, value: String) {
        let slot = match section {
            Section::LearningObjectives => &mut self.learning_objectives,
            Section::LocalContext => &mut self.local_context,
            Section::CoreContent => &mut self.core_content,
            Section::Activities => &mut self.activities,
            Section::Quiz => &mut self.quiz,
            Section::RelatedProjects => &mut self.related_projects,
        };
        *slot = value;
    }

    /// `true` when every section is the empty string.
    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|s| self.get(*s).is_empty())
    }

    /// Iterate `(section, text)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        Section::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `lesson_plans` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LessonPlan {
    pub id: Uuid,
    pub author_id: String,
    pub subject: String,
    pub grade_level: String,
    pub topic: String,
    pub title: String,
    pub duration_minutes: i32,
    pub country: String,
    #[sqlx(flatten)]
    pub sections: LessonSections,
    pub sections_missing: Vec<String>,
    pub status: LessonStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for inserting a new lesson plan row.
#[derive(Debug, Clone)]
pub struct NewLessonPlan {
    pub author_id: String,
    pub subject: String,
    pub grade_level: String,
    pub topic: String,
    pub title: String,
    pub duration_minutes: i32,
    pub country: String,
}

/// A row from the `context_entries` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ContextEntry {
    pub id: i64,
    pub lesson_id: Uuid,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// A row from the `curriculum_standards` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CurriculumStandard {
    pub id: Uuid,
    pub subject: String,
    pub grade_level: String,
    pub country: String,
    pub topic: Option<String>,
    pub standard_code: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a curriculum standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCurriculumStandard {
    pub subject: String,
    pub grade_level: String,
    pub country: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub standard_code: String,
    pub description: String,
}

/// A row from the `curriculum_mappings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CurriculumMapping {
    pub lesson_id: Uuid,
    pub standard_id: Uuid,
    pub mapping_type: MappingType,
    pub coverage_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for attaching a standard to a lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCurriculumMapping {
    pub standard_id: Uuid,
    pub mapping_type: MappingType,
    pub coverage_percentage: Option<f64>,
}

/// A row from the `generation_attempts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GenerationAttempt {
    pub id: i64,
    pub lesson_id: Uuid,
    pub attempt: i32,
    pub outcome: AttemptOutcome,
    pub provider: String,
    pub raw_output: Option<String>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Parameters for recording a generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGenerationAttempt {
    pub lesson_id: Uuid,
    pub attempt: i32,
    pub outcome: AttemptOutcome,
    pub provider: String,
    pub raw_output: Option<String>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_status_round_trips_through_strings() {
        for status in LessonStatus::ALL {
            let parsed: LessonStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(LessonStatus::UsedOffline.to_string(), "used_offline");
        assert!("published".parse::<LessonStatus>().is_err());
    }

    #[test]
    fn section_parses_both_spellings() {
        assert_eq!(
            "coreContent".parse::<Section>().unwrap(),
            Section::CoreContent
        );
        assert_eq!(
            "related_projects".parse::<Section>().unwrap(),
            Section::RelatedProjects
        );
        assert!("summary".parse::<Section>().is_err());
    }

    #[test]
    fn sections_get_set_and_emptiness() {
        let mut sections = LessonSections::default();
        assert!(sections.is_empty());

        sections.set(Section::Quiz, "1. What is 1/2 + 1/4?".to_string());
        assert_eq!(sections.get(Section::Quiz), "1. What is 1/2 + 1/4?");
        assert!(!sections.is_empty());

        let keys: Vec<&str> = sections.iter().map(|(s, _)| s.key()).collect();
        assert_eq!(
            keys,
            vec![
                "learningObjectives",
                "localContext",
                "coreContent",
                "activities",
                "quiz",
                "relatedProjects"
            ]
        );
    }

    #[test]
    fn sections_serialize_with_canonical_keys() {
        let json = serde_json::to_value(LessonSections::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        for section in Section::ALL {
            assert!(obj.contains_key(section.key()), "missing {}", section.key());
        }
    }
}
