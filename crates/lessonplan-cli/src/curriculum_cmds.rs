//! Operator CLI handlers for `lessonplan curriculum` subcommands.
//!
//! Implements:
//! - `lessonplan curriculum import <file>` -- upsert standards from a TOML file
//! - `lessonplan curriculum list`          -- list every standard
//! - `lessonplan curriculum match ...`     -- preview which standard a request aligns to

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sqlx::PgPool;

use lessonplan_core::curriculum::{CurriculumMatcher, MatchOutcome, MatchQuery};
use lessonplan_core::store::PgCurriculumSource;
use lessonplan_db::models::NewCurriculumStandard;
use lessonplan_db::queries::curriculum as curriculum_db;

use crate::CurriculumCommands;
use crate::config::LessonplanConfig;

/// Top-level layout of a curriculum import file.
///
/// ```toml
/// country = "Nigeria"          # optional, applies to entries without one
///
/// [[standards]]
/// subject = "Mathematics"
/// grade_level = "Grade 5"
/// topic = "Fractions"          # optional
/// standard_code = "MATH.5.NF.1"
/// description = "Add and subtract fractions with like denominators"
/// ```
#[derive(Debug, Deserialize)]
struct CurriculumFile {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    standards: Vec<StandardEntry>,
}

#[derive(Debug, Deserialize)]
struct StandardEntry {
    subject: String,
    grade_level: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    standard_code: String,
    description: String,
}

/// Parse and validate a curriculum import file.
///
/// Entries without a country take the file-level `country`, then
/// `default_country`. A blank topic is stored as no topic.
pub fn parse_curriculum_toml(
    content: &str,
    default_country: &str,
) -> Result<Vec<NewCurriculumStandard>> {
    let file: CurriculumFile = toml::from_str(content).context("invalid curriculum TOML")?;
    if file.standards.is_empty() {
        bail!("curriculum file contains no [[standards]] entries");
    }

    let file_country = file.country.filter(|c| !c.trim().is_empty());
    let mut standards = Vec::with_capacity(file.standards.len());
    for (index, entry) in file.standards.into_iter().enumerate() {
        let position = index + 1;
        for (field, value) in [
            ("subject", &entry.subject),
            ("grade_level", &entry.grade_level),
            ("standard_code", &entry.standard_code),
            ("description", &entry.description),
        ] {
            if value.trim().is_empty() {
                bail!("standard #{position}: {field} must not be blank");
            }
        }

        let country = entry
            .country
            .filter(|c| !c.trim().is_empty())
            .or_else(|| file_country.clone())
            .unwrap_or_else(|| default_country.to_string());

        standards.push(NewCurriculumStandard {
            subject: entry.subject.trim().to_string(),
            grade_level: entry.grade_level.trim().to_string(),
            country: country.trim().to_string(),
            topic: entry
                .topic
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            standard_code: entry.standard_code.trim().to_string(),
            description: entry.description.trim().to_string(),
        });
    }

    Ok(standards)
}

/// Dispatch a `CurriculumCommands` variant to the appropriate handler.
pub async fn run_curriculum_command(
    command: CurriculumCommands,
    pool: &PgPool,
    config: &LessonplanConfig,
) -> Result<()> {
    match command {
        CurriculumCommands::Import { file } => cmd_import(pool, &file, config).await,
        CurriculumCommands::List => cmd_list(pool).await,
        CurriculumCommands::Match {
            subject,
            grade,
            country,
            topic,
        } => {
            let query = MatchQuery {
                subject,
                grade_level: grade,
                country,
                topic,
            };
            cmd_match(pool, &query, config).await
        }
    }
}

async fn cmd_import(pool: &PgPool, file_path: &str, config: &LessonplanConfig) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read curriculum file: {file_path}"))?;
    let standards = parse_curriculum_toml(&content, &config.generation.default_country)
        .with_context(|| format!("failed to parse curriculum file: {file_path}"))?;

    for standard in &standards {
        curriculum_db::upsert_standard(pool, standard).await?;
    }

    tracing::info!(count = standards.len(), file = file_path, "curriculum imported");
    println!("Imported {} curriculum standard(s) from {file_path}.", standards.len());
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let standards = curriculum_db::list_standards(pool).await?;

    if standards.is_empty() {
        println!("No curriculum standards found.");
        return Ok(());
    }

    println!(
        "{:<16} {:<20} {:<12} {:<24} {:<20}",
        "COUNTRY", "SUBJECT", "GRADE", "TOPIC", "CODE"
    );
    println!("{}", "-".repeat(96));
    for s in &standards {
        println!(
            "{:<16} {:<20} {:<12} {:<24} {:<20}",
            s.country,
            s.subject,
            s.grade_level,
            s.topic.as_deref().unwrap_or("-"),
            s.standard_code
        );
    }
    Ok(())
}

async fn cmd_match(pool: &PgPool, query: &MatchQuery, config: &LessonplanConfig) -> Result<()> {
    let matcher = CurriculumMatcher::new(
        Arc::new(PgCurriculumSource::new(pool.clone())),
        config.generation.default_country.clone(),
    );

    match matcher.find_match(query).await? {
        MatchOutcome::Matched { standard, kind } => {
            println!("Matched {} ({kind:?}).", standard.standard_code);
            println!("  Description: {}", standard.description);
            println!(
                "  Coverage:    {:.0}%",
                kind.coverage_percentage()
            );
            if let Some(topic) = &standard.topic {
                println!("  Topic:       {topic}");
            }
        }
        MatchOutcome::NotFound { searched } => {
            println!("No curriculum standard found.");
            println!(
                "  Searched: subject={:?} grade_level={:?} country={:?} topic={:?}",
                searched.subject, searched.grade_level, searched.country, searched.topic
            );
        }
    }
    Ok(())
}
