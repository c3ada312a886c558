//! Operator CLI handlers for `lessonplan lesson` subcommands.
//!
//! Implements:
//! - `lessonplan lesson create`                  -- create a draft lesson plan
//! - `lessonplan lesson list [--author]`         -- list lesson plans
//! - `lessonplan lesson show <id> [--json]`      -- show one lesson plan
//! - `lessonplan lesson edit <id> --set s=text`  -- edit sections
//! - `lessonplan lesson transition <id> <state>` -- move through the lifecycle
//! - `lessonplan lesson delete <id>`             -- delete a lesson plan

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use sqlx::PgPool;
use uuid::Uuid;

use lessonplan_core::lifecycle::{LessonLifecycle, SectionEdits};
use lessonplan_core::request::{NewLessonRequest, create_lesson};
use lessonplan_core::store::{LessonStore, PgLessonStore};
use lessonplan_db::models::{LessonPlan, LessonStatus, Section};
use lessonplan_db::queries::curriculum as curriculum_db;

use crate::LessonCommands;
use crate::config::LessonplanConfig;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `LessonCommands` variant to the appropriate handler.
pub async fn run_lesson_command(
    command: LessonCommands,
    pool: &PgPool,
    config: &LessonplanConfig,
) -> Result<()> {
    let store: Arc<dyn LessonStore> = Arc::new(PgLessonStore::new(pool.clone()));
    match command {
        LessonCommands::Create {
            author,
            subject,
            grade,
            topic,
            duration,
            country,
            local_context,
            title,
        } => {
            let request = NewLessonRequest {
                author_id: author,
                subject,
                grade_level: grade,
                topic,
                duration_minutes: duration,
                country,
                local_context,
                title,
            };
            cmd_create(store.as_ref(), &request, &config.generation.default_country).await
        }
        LessonCommands::List { author } => cmd_list(store.as_ref(), author.as_deref()).await,
        LessonCommands::Show { lesson_id, json } => {
            cmd_show(pool, store.as_ref(), &lesson_id, json).await
        }
        LessonCommands::Edit { lesson_id, edits } => cmd_edit(store, &lesson_id, &edits).await,
        LessonCommands::Transition { lesson_id, status } => {
            cmd_transition(store, &lesson_id, &status).await
        }
        LessonCommands::Delete { lesson_id } => cmd_delete(store.as_ref(), &lesson_id).await,
    }
}

/// Parse a lesson plan ID argument.
pub fn parse_lesson_id(id_str: &str) -> Result<Uuid> {
    Uuid::parse_str(id_str).with_context(|| format!("invalid lesson plan ID: {id_str}"))
}

/// Parse a `section=text` argument. The section may be spelled as the
/// camelCase key or the snake_case column name.
pub fn parse_section_edit(arg: &str) -> Result<(Section, String)> {
    let (name, text) = arg
        .split_once('=')
        .with_context(|| format!("expected SECTION=TEXT, got {arg:?}"))?;
    let section: Section = name.trim().parse().map_err(|e| anyhow!("{e}"))?;
    Ok((section, text.to_string()))
}

// -----------------------------------------------------------------------
// lessonplan lesson create
// -----------------------------------------------------------------------

async fn cmd_create(
    store: &dyn LessonStore,
    request: &NewLessonRequest,
    default_country: &str,
) -> Result<()> {
    let lesson = create_lesson(store, request, default_country).await?;

    println!("Lesson plan created.");
    println!();
    println!("  Lesson ID: {}", lesson.id);
    println!("  Title:     {}", lesson.title);
    println!("  Country:   {}", lesson.country);
    println!("  Status:    {}", lesson.status);
    println!();
    println!("Next: run `lessonplan generate {}`", lesson.id);
    Ok(())
}

// -----------------------------------------------------------------------
// lessonplan lesson list
// -----------------------------------------------------------------------

async fn cmd_list(store: &dyn LessonStore, author: Option<&str>) -> Result<()> {
    let lessons = store.list_lessons(author).await?;

    if lessons.is_empty() {
        println!("No lesson plans found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<40} {:<14} {:<20}",
        "ID", "TITLE", "STATUS", "UPDATED"
    );
    println!("{}", "-".repeat(112));

    for lesson in &lessons {
        println!(
            "{:<38} {:<40} {:<14} {:<20}",
            lesson.id,
            truncate_display(&lesson.title, 38),
            lesson.status.to_string(),
            lesson.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}

/// Shorten `text` to at most `max` characters for table output.
fn truncate_display(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

// -----------------------------------------------------------------------
// lessonplan lesson show
// -----------------------------------------------------------------------

async fn cmd_show(pool: &PgPool, store: &dyn LessonStore, id_str: &str, json: bool) -> Result<()> {
    let lesson_id = parse_lesson_id(id_str)?;
    let lesson = store
        .get_lesson(lesson_id)
        .await?
        .with_context(|| format!("lesson plan {lesson_id} not found"))?;

    if json {
        let out = serde_json::to_string_pretty(&lesson)
            .context("failed to serialize lesson plan")?;
        println!("{out}");
        return Ok(());
    }

    print_header(&lesson);
    if store.generation_claimed(lesson_id).await? {
        println!("Generation: in progress");
    }

    let mappings = store.list_mappings(lesson_id).await?;
    if !mappings.is_empty() {
        println!();
        println!("Curriculum:");
        for mapping in &mappings {
            let standard = curriculum_db::get_standard(pool, mapping.standard_id).await?;
            let label = match &standard {
                Some(s) => format!("{}: {}", s.standard_code, s.description),
                None => mapping.standard_id.to_string(),
            };
            match mapping.coverage_percentage {
                Some(coverage) => {
                    println!("  [{}] {label} ({coverage:.0}%)", mapping.mapping_type)
                }
                None => println!("  [{}] {label}", mapping.mapping_type),
            }
        }
    }

    if lesson.status.is_post_generation() {
        for (section, text) in lesson.sections.iter() {
            println!();
            println!("## {}", section.title());
            println!("{text}");
        }
    }

    Ok(())
}

fn print_header(lesson: &LessonPlan) {
    println!("Lesson: {} ({})", lesson.title, lesson.id);
    println!("Status: {}", lesson.status);
    println!("Author: {}", lesson.author_id);
    println!("Subject: {}", lesson.subject);
    println!("Grade level: {}", lesson.grade_level);
    println!("Topic: {}", lesson.topic);
    println!("Duration: {} minutes", lesson.duration_minutes);
    println!("Country: {}", lesson.country);
    println!(
        "Updated: {}",
        lesson.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !lesson.sections_missing.is_empty() {
        println!("Missing sections: {}", lesson.sections_missing.join(", "));
    }
}

// -----------------------------------------------------------------------
// lessonplan lesson edit
// -----------------------------------------------------------------------

async fn cmd_edit(store: Arc<dyn LessonStore>, id_str: &str, raw_edits: &[String]) -> Result<()> {
    let lesson_id = parse_lesson_id(id_str)?;
    let edits = raw_edits
        .iter()
        .map(|arg| parse_section_edit(arg))
        .collect::<Result<SectionEdits>>()?;

    let lifecycle = LessonLifecycle::new(store);
    let lesson = lifecycle.edit_sections(lesson_id, &edits).await?;

    println!(
        "Lesson plan {} edited ({} section(s)), status {}.",
        lesson.id,
        raw_edits.len(),
        lesson.status
    );
    Ok(())
}

// -----------------------------------------------------------------------
// lessonplan lesson transition
// -----------------------------------------------------------------------

async fn cmd_transition(store: Arc<dyn LessonStore>, id_str: &str, status: &str) -> Result<()> {
    let lesson_id = parse_lesson_id(id_str)?;
    let to: LessonStatus = status.parse().map_err(|e| anyhow!("{e}"))?;
    if to == LessonStatus::Generated {
        bail!("use `lessonplan generate {lesson_id}` to produce generated content");
    }

    let lifecycle = LessonLifecycle::new(store);
    let lesson = lifecycle.transition(lesson_id, to).await?;

    println!("Lesson plan {} is now {}.", lesson.id, lesson.status);
    Ok(())
}

// -----------------------------------------------------------------------
// lessonplan lesson delete
// -----------------------------------------------------------------------

async fn cmd_delete(store: &dyn LessonStore, id_str: &str) -> Result<()> {
    let lesson_id = parse_lesson_id(id_str)?;
    if !store.delete_lesson(lesson_id).await? {
        bail!("lesson plan {lesson_id} not found");
    }
    println!("Lesson plan {lesson_id} deleted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_edit_accepts_both_spellings() {
        let (section, text) = parse_section_edit("coreContent=Plants need light").unwrap();
        assert_eq!(section, Section::CoreContent);
        assert_eq!(text, "Plants need light");

        let (section, _) = parse_section_edit("related_projects=Build a model").unwrap();
        assert_eq!(section, Section::RelatedProjects);
    }

    #[test]
    fn section_edit_keeps_equals_signs_in_text() {
        let (section, text) = parse_section_edit("quiz=1. 1/2 + 1/4 = ?").unwrap();
        assert_eq!(section, Section::Quiz);
        assert_eq!(text, "1. 1/2 + 1/4 = ?");
    }

    #[test]
    fn section_edit_rejects_unknown_section_and_missing_separator() {
        assert!(parse_section_edit("homework=Read chapter 2").is_err());
        assert!(parse_section_edit("quiz").is_err());
    }

    #[test]
    fn lesson_id_must_be_a_uuid() {
        assert!(parse_lesson_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_lesson_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn truncate_display_respects_char_boundaries() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("Fractions à la carte", 10), "Fractio...");
    }
}
