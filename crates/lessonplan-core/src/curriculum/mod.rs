//! Curriculum standard matching.
//!
//! Lookup is split in two: a [`CurriculumSource`] returns every standard
//! for a normalized (subject, grade level, country) triple, and
//! [`select_standard`] picks one of them without any I/O. Selection prefers
//! an exact topic match and breaks ties by newest `created_at`, then the
//! greatest `standard_code`, then the greatest `id`, so identical inputs
//! always produce the same standard.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use lessonplan_db::models::CurriculumStandard;

use crate::store::{CurriculumSource, StandardQuery};

/// Country used when a request leaves it out.
pub const DEFAULT_COUNTRY: &str = "Nigeria";

/// Trim, lowercase and collapse internal runs of whitespace to one space.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Raw matching input as supplied by a caller.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub subject: String,
    pub grade_level: String,
    pub country: Option<String>,
    pub topic: Option<String>,
}

/// Normalized parameters actually used for a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub subject: String,
    pub grade_level: String,
    pub country: String,
    pub topic: Option<String>,
}

impl SearchParams {
    fn lookup(&self) -> StandardQuery {
        StandardQuery {
            subject: self.subject.clone(),
            grade_level: self.grade_level.clone(),
            country: self.country.clone(),
        }
    }
}

/// Which rule selected the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The standard's topic equals the requested topic.
    Topic,
    /// Subject, grade level and country only.
    SubjectGrade,
}

impl MatchKind {
    /// Coverage recorded on the primary mapping for this kind of match.
    pub fn coverage_percentage(&self) -> f64 {
        match self {
            Self::Topic => 100.0,
            Self::SubjectGrade => 50.0,
        }
    }
}

/// Result of a curriculum match. `NotFound` is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        standard: CurriculumStandard,
        kind: MatchKind,
    },
    NotFound {
        searched: SearchParams,
    },
}

impl MatchOutcome {
    pub fn standard(&self) -> Option<&CurriculumStandard> {
        match self {
            Self::Matched { standard, .. } => Some(standard),
            Self::NotFound { .. } => None,
        }
    }
}

/// Newest first, then greatest code, then greatest id.
fn precedence(a: &CurriculumStandard, b: &CurriculumStandard) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.standard_code.cmp(&a.standard_code))
        .then_with(|| b.id.cmp(&a.id))
}

/// Pick the best standard among `candidates` for `params`.
///
/// Candidates whose subject, grade level or country do not match after
/// normalization are ignored, so callers may pass a superset.
pub fn select_standard(params: &SearchParams, candidates: &[CurriculumStandard]) -> MatchOutcome {
    let eligible: Vec<&CurriculumStandard> = candidates
        .iter()
        .filter(|s| {
            normalize(&s.subject) == params.subject
                && normalize(&s.grade_level) == params.grade_level
                && normalize(&s.country) == params.country
        })
        .collect();

    let topical = params.topic.as_deref().and_then(|topic| {
        eligible
            .iter()
            .copied()
            .filter(|s| s.topic.as_deref().is_some_and(|t| normalize(t) == topic))
            .min_by(|a, b| precedence(a, b))
    });
    if let Some(standard) = topical {
        return MatchOutcome::Matched {
            standard: standard.clone(),
            kind: MatchKind::Topic,
        };
    }

    match eligible.into_iter().min_by(|a, b| precedence(a, b)) {
        Some(standard) => MatchOutcome::Matched {
            standard: standard.clone(),
            kind: MatchKind::SubjectGrade,
        },
        None => MatchOutcome::NotFound {
            searched: params.clone(),
        },
    }
}

/// Resolves curriculum standards for lesson requests.
#[derive(Clone)]
pub struct CurriculumMatcher {
    source: Arc<dyn CurriculumSource>,
    default_country: String,
}

impl CurriculumMatcher {
    pub fn new(source: Arc<dyn CurriculumSource>, default_country: impl Into<String>) -> Self {
        Self {
            source,
            default_country: default_country.into(),
        }
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    /// Normalize a query, substituting the default country when it is
    /// missing or blank and dropping a blank topic.
    pub fn resolve(&self, query: &MatchQuery) -> SearchParams {
        let country = query
            .country
            .as_deref()
            .map(normalize)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| normalize(&self.default_country));
        SearchParams {
            subject: normalize(&query.subject),
            grade_level: normalize(&query.grade_level),
            country,
            topic: query
                .topic
                .as_deref()
                .map(normalize)
                .filter(|t| !t.is_empty()),
        }
    }

    /// Look up and select a standard. Errors only on lookup failure.
    pub async fn find_match(&self, query: &MatchQuery) -> Result<MatchOutcome> {
        let params = self.resolve(query);
        let candidates = self.source.find_standards(&params.lookup()).await?;
        let outcome = select_standard(&params, &candidates);
        match &outcome {
            MatchOutcome::Matched { standard, kind } => tracing::debug!(
                standard_code = %standard.standard_code,
                kind = ?kind,
                candidates = candidates.len(),
                "curriculum standard matched"
            ),
            MatchOutcome::NotFound { searched } => tracing::debug!(
                subject = %searched.subject,
                grade_level = %searched.grade_level,
                country = %searched.country,
                "no curriculum standard found"
            ),
        }
        Ok(outcome)
    }
}
