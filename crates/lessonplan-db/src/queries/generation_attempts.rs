//! Database query functions for the `generation_attempts` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{GenerationAttempt, NewGenerationAttempt};

/// Record one provider call.
pub async fn insert_attempt(
    pool: &PgPool,
    new: &NewGenerationAttempt,
) -> Result<GenerationAttempt> {
    let attempt = sqlx::query_as::<_, GenerationAttempt>(
        "INSERT INTO generation_attempts \
             (lesson_id, attempt, outcome, provider, raw_output, error_message, latency_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(new.lesson_id)
    .bind(new.attempt)
    .bind(new.outcome)
    .bind(&new.provider)
    .bind(&new.raw_output)
    .bind(&new.error_message)
    .bind(new.latency_ms)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to record generation attempt {} ({}) for lesson {}",
            new.attempt, new.outcome, new.lesson_id
        )
    })?;

    Ok(attempt)
}

/// List every recorded attempt for a lesson, oldest first.
pub async fn list_attempts(pool: &PgPool, lesson_id: Uuid) -> Result<Vec<GenerationAttempt>> {
    let attempts = sqlx::query_as::<_, GenerationAttempt>(
        "SELECT * FROM generation_attempts \
         WHERE lesson_id = $1 \
         ORDER BY id ASC",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list generation attempts for lesson {lesson_id}"))?;

    Ok(attempts)
}
