//! `lessonplan generate` and `lessonplan attempts`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use lessonplan_core::error::GenerationError;
use lessonplan_core::orchestrator::GenerationOrchestrator;
use lessonplan_core::store::{LessonStore, PgCurriculumSource, PgLessonStore};

use crate::config::LessonplanConfig;
use crate::lesson_cmds::parse_lesson_id;

/// Per-invocation overrides for `generate`.
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub provider: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub async fn run_generate(
    pool: &PgPool,
    config: &LessonplanConfig,
    lesson_id_str: &str,
    options: &GenerateOptions,
) -> Result<()> {
    let lesson_id = parse_lesson_id(lesson_id_str)?;

    let registry = config.build_registry(|key| std::env::var(key).ok())?;
    let provider = config.select_provider(&registry, options.provider.as_deref())?;

    let mut generation = config.generation.clone();
    if let Some(secs) = options.timeout_secs {
        generation.timeout = Duration::from_secs(secs);
    }

    let orchestrator = GenerationOrchestrator::new(
        Arc::new(PgLessonStore::new(pool.clone())),
        Arc::new(PgCurriculumSource::new(pool.clone())),
        Arc::clone(&provider),
        generation,
    );

    // First signal cancels, second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let signal_task = tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCancelling generation (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    println!(
        "Generating lesson plan {lesson_id} with {} (timeout {}s)...",
        provider.name(),
        orchestrator.config().timeout.as_secs()
    );
    let result = orchestrator.generate_with_cancel(lesson_id, cancel).await;
    signal_task.abort();

    match result {
        Ok(lesson) => {
            println!("Lesson plan {} is now {}.", lesson.id, lesson.status);
            if lesson.sections_missing.is_empty() {
                println!("All six sections generated.");
            } else {
                println!(
                    "Missing sections (left empty): {}",
                    lesson.sections_missing.join(", ")
                );
            }
            println!();
            println!("Next: `lessonplan lesson show {}`", lesson.id);
            Ok(())
        }
        Err(e) => {
            print_failure_hint(&e, lesson_id);
            Err(e.into())
        }
    }
}

fn print_failure_hint(err: &GenerationError, lesson_id: uuid::Uuid) {
    eprintln!("Generation failed ({}).", err.kind());
    match err {
        GenerationError::Parse(_) => {
            eprintln!("The raw provider output was recorded.");
            eprintln!("Inspect it with `lessonplan attempts {lesson_id} --raw`.");
        }
        GenerationError::AiServiceUnavailable { .. } => {
            eprintln!("The lesson plan is unchanged; retry later or pick another --provider.");
        }
        GenerationError::GenerationInProgress(_) => {
            eprintln!("Another generation for this lesson plan is running.");
            eprintln!("Wait for it to finish, then check `lessonplan lesson show {lesson_id}`.");
        }
        GenerationError::Cancelled => {
            eprintln!("The lesson plan is unchanged.");
        }
        _ => {}
    }
}

pub async fn run_attempts(pool: &PgPool, lesson_id_str: &str, raw: bool) -> Result<()> {
    let lesson_id = parse_lesson_id(lesson_id_str)?;
    let store = PgLessonStore::new(pool.clone());
    let attempts = store.list_attempts(lesson_id).await?;

    if attempts.is_empty() {
        println!("No generation attempts for lesson plan {lesson_id}.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<16} {:<18} {:>10}",
        "TRY", "RECORDED", "OUTCOME", "PROVIDER", "LATENCY"
    );
    println!("{}", "-".repeat(74));
    for attempt in &attempts {
        println!(
            "{:<6} {:<20} {:<16} {:<18} {:>8}ms",
            attempt.attempt,
            attempt.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            attempt.outcome.to_string(),
            attempt.provider,
            attempt.latency_ms
        );
        if let Some(message) = &attempt.error_message {
            println!("       error: {message}");
        }
        if raw {
            if let Some(output) = &attempt.raw_output {
                println!("       --- raw output ---");
                for line in output.lines() {
                    println!("       {line}");
                }
            }
        }
    }
    Ok(())
}
