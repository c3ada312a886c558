//! Database query functions for the `curriculum_mappings` table.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{CurriculumMapping, NewCurriculumMapping};

/// Attach a standard to a lesson, or update the existing link between the
/// two. Fails on the partial unique index if a second primary is attached
/// without clearing the first.
pub async fn upsert_mapping<'e, E>(
    executor: E,
    lesson_id: Uuid,
    mapping: &NewCurriculumMapping,
) -> Result<CurriculumMapping>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, CurriculumMapping>(
        "INSERT INTO curriculum_mappings \
             (lesson_id, standard_id, mapping_type, coverage_percentage) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (lesson_id, standard_id) DO UPDATE \
         SET mapping_type = EXCLUDED.mapping_type, \
             coverage_percentage = EXCLUDED.coverage_percentage, \
             created_at = now() \
         RETURNING *",
    )
    .bind(lesson_id)
    .bind(mapping.standard_id)
    .bind(mapping.mapping_type)
    .bind(mapping.coverage_percentage)
    .fetch_one(executor)
    .await
    .with_context(|| {
        format!(
            "failed to attach standard {} to lesson {} as {}",
            mapping.standard_id, lesson_id, mapping.mapping_type
        )
    })?;

    Ok(row)
}

/// Remove the primary mapping of a lesson, if any.
pub async fn clear_primary<'e, E>(executor: E, lesson_id: Uuid) -> Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "DELETE FROM curriculum_mappings \
         WHERE lesson_id = $1 AND mapping_type = 'primary'",
    )
    .bind(lesson_id)
    .execute(executor)
    .await
    .with_context(|| format!("failed to clear primary mapping for lesson {lesson_id}"))?;

    Ok(result.rows_affected())
}

/// List all mappings for a lesson: primary first, then by creation time.
pub async fn list_mappings(pool: &PgPool, lesson_id: Uuid) -> Result<Vec<CurriculumMapping>> {
    let rows = sqlx::query_as::<_, CurriculumMapping>(
        "SELECT * FROM curriculum_mappings \
         WHERE lesson_id = $1 \
         ORDER BY (mapping_type = 'primary') DESC, created_at ASC, standard_id",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list mappings for lesson {lesson_id}"))?;

    Ok(rows)
}
