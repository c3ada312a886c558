//! Database query functions for the `lesson_plans` table.
//!
//! Status writes are compare-and-set on the current status: callers pass the
//! status they expect and get back the number of rows changed (0 or 1).
//! `transition_status` and `update_sections` also match nothing while a
//! generation lease (`generation_lease_until` in the future) is held.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{LessonPlan, LessonSections, LessonStatus, NewCurriculumMapping, NewLessonPlan};
use crate::queries::mappings;

/// Insert a new lesson plan in `draft` status with empty sections.
pub async fn insert_lesson(pool: &PgPool, new: &NewLessonPlan) -> Result<LessonPlan> {
    let lesson = sqlx::query_as::<_, LessonPlan>(
        "INSERT INTO lesson_plans \
             (author_id, subject, grade_level, topic, title, duration_minutes, country) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(&new.author_id)
    .bind(&new.subject)
    .bind(&new.grade_level)
    .bind(&new.topic)
    .bind(&new.title)
    .bind(new.duration_minutes)
    .bind(&new.country)
    .fetch_one(pool)
    .await
    .context("failed to insert lesson plan")?;

    Ok(lesson)
}

/// Fetch a lesson plan by its ID.
pub async fn get_lesson(pool: &PgPool, id: Uuid) -> Result<Option<LessonPlan>> {
    let lesson = sqlx::query_as::<_, LessonPlan>("SELECT * FROM lesson_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch lesson plan {id}"))?;

    Ok(lesson)
}

/// List lesson plans, newest first, optionally restricted to one author.
pub async fn list_lessons(pool: &PgPool, author_id: Option<&str>) -> Result<Vec<LessonPlan>> {
    let lessons = sqlx::query_as::<_, LessonPlan>(
        "SELECT * FROM lesson_plans \
         WHERE ($1::text IS NULL OR author_id = $1) \
         ORDER BY created_at DESC, id",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await
    .context("failed to list lesson plans")?;

    Ok(lessons)
}

/// Move a lesson from `from` to `to` if its stored status is still `from`.
pub async fn transition_status(
    pool: &PgPool,
    id: Uuid,
    from: LessonStatus,
    to: LessonStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE lesson_plans \
         SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3 \
           AND (generation_lease_until IS NULL OR generation_lease_until <= now())",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition lesson plan status")?;

    Ok(result.rows_affected())
}

/// Replace all six sections and move the lesson to `edited`, provided its
/// stored status is still `from`.
pub async fn update_sections(
    pool: &PgPool,
    id: Uuid,
    from: LessonStatus,
    sections: &LessonSections,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE lesson_plans \
         SET learning_objectives = $1, local_context = $2, core_content = $3, \
             activities = $4, quiz = $5, related_projects = $6, \
             status = 'edited', updated_at = now() \
         WHERE id = $7 AND status = $8 \
           AND (generation_lease_until IS NULL OR generation_lease_until <= now())",
    )
    .bind(&sections.learning_objectives)
    .bind(&sections.local_context)
    .bind(&sections.core_content)
    .bind(&sections.activities)
    .bind(&sections.quiz)
    .bind(&sections.related_projects)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to update lesson plan sections")?;

    Ok(result.rows_affected())
}

/// Atomically record a successful generation.
///
/// In one transaction: writes the six sections and the missing-section
/// diagnostics, sets `status = generated` (only if the stored status is
/// still `from`), drops any previous primary curriculum mapping and attaches
/// `primary` when given. Returns 0 and writes nothing if the status check
/// fails.
pub async fn commit_generation(
    pool: &PgPool,
    id: Uuid,
    from: LessonStatus,
    sections: &LessonSections,
    sections_missing: &[String],
    primary: Option<&NewCurriculumMapping>,
) -> Result<u64> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin generation transaction")?;

    let result = sqlx::query(
        "UPDATE lesson_plans \
         SET learning_objectives = $1, local_context = $2, core_content = $3, \
             activities = $4, quiz = $5, related_projects = $6, \
             sections_missing = $7, status = 'generated', updated_at = now() \
         WHERE id = $8 AND status = $9",
    )
    .bind(&sections.learning_objectives)
    .bind(&sections.local_context)
    .bind(&sections.core_content)
    .bind(&sections.activities)
    .bind(&sections.quiz)
    .bind(&sections.related_projects)
    .bind(sections_missing)
    .bind(id)
    .bind(from)
    .execute(&mut *tx)
    .await
    .context("failed to write generated sections")?;

    if result.rows_affected() == 0 {
        tx.rollback()
            .await
            .context("failed to roll back generation transaction")?;
        return Ok(0);
    }

    mappings::clear_primary(&mut *tx, id).await?;
    if let Some(mapping) = primary {
        mappings::upsert_mapping(&mut *tx, id, mapping).await?;
    }

    tx.commit()
        .await
        .context("failed to commit generation transaction")?;

    Ok(result.rows_affected())
}

/// Take the generation lease for `lease` unless an unexpired one is held.
///
/// Returns `false` when the lesson does not exist or is already leased.
pub async fn try_claim_generation(pool: &PgPool, id: Uuid, lease: Duration) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE lesson_plans \
         SET generation_lease_until = now() + make_interval(secs => $1) \
         WHERE id = $2 \
           AND (generation_lease_until IS NULL OR generation_lease_until <= now())",
    )
    .bind(lease.as_secs_f64())
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("failed to claim generation lease for lesson plan {id}"))?;

    Ok(result.rows_affected() > 0)
}

/// Clear the generation lease.
pub async fn release_generation(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE lesson_plans SET generation_lease_until = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release generation lease for lesson plan {id}"))?;

    Ok(())
}

/// Whether an unexpired generation lease is held.
pub async fn generation_claimed(pool: &PgPool, id: Uuid) -> Result<bool> {
    let claimed = sqlx::query_scalar::<_, Option<bool>>(
        "SELECT generation_lease_until > now() FROM lesson_plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to read generation lease for lesson plan {id}"))?
    .flatten();

    Ok(claimed.unwrap_or(false))
}

/// Delete a lesson plan. Context entries, mappings and attempt records
/// cascade. Returns `true` if a row was deleted.
pub async fn delete_lesson(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM lesson_plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete lesson plan {id}"))?;

    Ok(result.rows_affected() > 0)
}
