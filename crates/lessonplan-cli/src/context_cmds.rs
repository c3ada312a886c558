//! `lessonplan context` subcommands.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use lessonplan_core::context::ContextStore;
use lessonplan_core::store::PgLessonStore;

use crate::ContextCommands;
use crate::lesson_cmds::parse_lesson_id;

pub async fn run_context_command(command: ContextCommands, pool: &PgPool) -> Result<()> {
    let context = ContextStore::new(Arc::new(PgLessonStore::new(pool.clone())));
    match command {
        ContextCommands::Add {
            lesson_id,
            key,
            value,
        } => {
            let lesson_id = parse_lesson_id(&lesson_id)?;
            let entry = context.append(lesson_id, &key, &value).await?;
            println!("Context entry {} added to lesson plan {lesson_id}.", entry.id);
        }
        ContextCommands::List { lesson_id } => {
            let lesson_id = parse_lesson_id(&lesson_id)?;
            let entries = context.list(lesson_id).await?;
            if entries.is_empty() {
                println!("No context entries for lesson plan {lesson_id}.");
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "[{}] {}: {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.key,
                    entry.value
                );
            }
        }
    }
    Ok(())
}
