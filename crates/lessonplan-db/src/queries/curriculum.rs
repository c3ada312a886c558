//! Database query functions for the `curriculum_standards` table.
//!
//! The core treats this table as read-only reference data; inserts exist
//! for seeding and the `curriculum import` command.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CurriculumStandard, NewCurriculumStandard};

/// Insert a standard. Re-importing the same `(country, standard_code)`
/// updates the descriptive fields in place and keeps the original id and
/// creation time.
pub async fn upsert_standard(
    pool: &PgPool,
    new: &NewCurriculumStandard,
) -> Result<CurriculumStandard> {
    let standard = sqlx::query_as::<_, CurriculumStandard>(
        "INSERT INTO curriculum_standards \
             (subject, grade_level, country, topic, standard_code, description) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (country, standard_code) DO UPDATE \
         SET subject = EXCLUDED.subject, \
             grade_level = EXCLUDED.grade_level, \
             topic = EXCLUDED.topic, \
             description = EXCLUDED.description \
         RETURNING *",
    )
    .bind(&new.subject)
    .bind(&new.grade_level)
    .bind(&new.country)
    .bind(&new.topic)
    .bind(&new.standard_code)
    .bind(&new.description)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert curriculum standard {}", new.standard_code))?;

    Ok(standard)
}

/// Fetch a standard by ID.
pub async fn get_standard(pool: &PgPool, id: Uuid) -> Result<Option<CurriculumStandard>> {
    let standard =
        sqlx::query_as::<_, CurriculumStandard>("SELECT * FROM curriculum_standards WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("failed to fetch curriculum standard {id}"))?;

    Ok(standard)
}

/// List every standard, grouped by country/subject/grade.
pub async fn list_standards(pool: &PgPool) -> Result<Vec<CurriculumStandard>> {
    let standards = sqlx::query_as::<_, CurriculumStandard>(
        "SELECT * FROM curriculum_standards \
         ORDER BY country, subject, grade_level, standard_code",
    )
    .fetch_all(pool)
    .await
    .context("failed to list curriculum standards")?;

    Ok(standards)
}

/// Find standards whose subject, grade level and country equal the given
/// values after normalization (trimmed, lowercased, internal whitespace
/// collapsed to one space). Callers must pass already-normalized values.
///
/// Results are newest first; topic preference is left to the caller.
pub async fn find_standards(
    pool: &PgPool,
    subject: &str,
    grade_level: &str,
    country: &str,
) -> Result<Vec<CurriculumStandard>> {
    let standards = sqlx::query_as::<_, CurriculumStandard>(
        "SELECT * FROM curriculum_standards \
         WHERE regexp_replace(lower(btrim(subject)), '\\s+', ' ', 'g') = $1 \
           AND regexp_replace(lower(btrim(grade_level)), '\\s+', ' ', 'g') = $2 \
           AND regexp_replace(lower(btrim(country)), '\\s+', ' ', 'g') = $3 \
         ORDER BY created_at DESC, standard_code DESC, id DESC",
    )
    .bind(subject)
    .bind(grade_level)
    .bind(country)
    .fetch_all(pool)
    .await
    .with_context(|| {
        format!("failed to find curriculum standards for {subject}/{grade_level}/{country}")
    })?;

    Ok(standards)
}
