//! Database query functions for the `context_entries` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ContextEntry;

/// Append a context entry to a lesson.
pub async fn insert_entry(
    pool: &PgPool,
    lesson_id: Uuid,
    key: &str,
    value: &str,
) -> Result<ContextEntry> {
    let entry = sqlx::query_as::<_, ContextEntry>(
        "INSERT INTO context_entries (lesson_id, key, value) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(lesson_id)
    .bind(key)
    .bind(value)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert context entry {key:?} for lesson {lesson_id}"))?;

    Ok(entry)
}

/// List a lesson's context entries in insertion order.
pub async fn list_entries(pool: &PgPool, lesson_id: Uuid) -> Result<Vec<ContextEntry>> {
    let entries = sqlx::query_as::<_, ContextEntry>(
        "SELECT * FROM context_entries \
         WHERE lesson_id = $1 \
         ORDER BY id ASC",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list context entries for lesson {lesson_id}"))?;

    Ok(entries)
}
