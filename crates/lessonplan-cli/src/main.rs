mod config;
mod context_cmds;
mod curriculum_cmds;
mod generate_cmd;
mod lesson_cmds;

use clap::{CommandFactory, Parser, Subcommand};

use lessonplan_db::config::DbConfig;
use lessonplan_db::pool;

use config::LessonplanConfig;

#[derive(Parser)]
#[command(
    name = "lessonplan",
    about = "Curriculum-aligned lesson plan generation pipeline"
)]
struct Cli {
    /// Database URL (overrides LESSONPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a lessonplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Lesson plan management
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },
    /// Local context attached to a lesson plan
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
    /// Curriculum reference data
    Curriculum {
        #[command(subcommand)]
        command: CurriculumCommands,
    },
    /// Generate content for a draft or edited lesson plan
    Generate {
        /// Lesson plan ID
        lesson_id: String,
        /// Provider name (overrides LESSONPLAN_PROVIDER and the config file)
        #[arg(long)]
        provider: Option<String>,
        /// Provider call timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the generation attempt log for a lesson plan
    Attempts {
        /// Lesson plan ID
        lesson_id: String,
        /// Print raw provider output for each attempt
        #[arg(long)]
        raw: bool,
    },
    /// Print shell completions to stdout
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum LessonCommands {
    /// Create a draft lesson plan
    Create {
        /// Owning user
        #[arg(long)]
        author: String,
        #[arg(long)]
        subject: String,
        /// Grade level, e.g. "Grade 5" or "JSS1"
        #[arg(long)]
        grade: String,
        #[arg(long)]
        topic: String,
        /// Lesson length in minutes
        #[arg(long, default_value_t = 40)]
        duration: i32,
        /// Country (defaults to generation.default_country)
        #[arg(long)]
        country: Option<String>,
        /// Free-text local context, stored as the first context entry
        #[arg(long)]
        local_context: Option<String>,
        /// Title (defaults to "<topic> (<subject>, <grade>)")
        #[arg(long)]
        title: Option<String>,
    },
    /// List lesson plans, newest first
    List {
        /// Only show lessons owned by this author
        #[arg(long)]
        author: Option<String>,
    },
    /// Show a lesson plan with its sections and curriculum mappings
    Show {
        /// Lesson plan ID
        lesson_id: String,
        /// Print the lesson plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit one or more sections and move the lesson to `edited`
    Edit {
        /// Lesson plan ID
        lesson_id: String,
        /// Section edit as `section=text` (repeatable)
        #[arg(long = "set", value_name = "SECTION=TEXT", required = true)]
        edits: Vec<String>,
    },
    /// Move a lesson plan to another status
    Transition {
        /// Lesson plan ID
        lesson_id: String,
        /// Target status (e.g. reviewed, exported, archived)
        status: String,
    },
    /// Delete a lesson plan and everything attached to it
    Delete {
        /// Lesson plan ID
        lesson_id: String,
    },
}

#[derive(Subcommand)]
pub enum ContextCommands {
    /// Append a context entry
    Add {
        /// Lesson plan ID
        lesson_id: String,
        key: String,
        value: String,
    },
    /// List context entries in insertion order
    List {
        /// Lesson plan ID
        lesson_id: String,
    },
}

#[derive(Subcommand)]
pub enum CurriculumCommands {
    /// Import standards from a TOML file
    Import {
        /// Path to a file of `[[standards]]` tables
        file: String,
    },
    /// List every standard
    List,
    /// Show which standard a request would be aligned to
    Match {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        topic: Option<String>,
    },
}

/// Execute the `lessonplan init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: Some(db_url.to_string()),
            max_connections: None,
        },
        provider: config::ProviderSection {
            default: Some(config::DEFAULT_PROVIDER.to_string()),
            ..config::ProviderSection::default()
        },
        generation: config::GenerationSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  provider.default = {}", config::DEFAULT_PROVIDER);
    println!();
    println!("Next: run `lessonplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `lessonplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = LessonplanConfig::resolve(cli_db_url)?;

    println!("Initializing lessonplan database...");

    let db_pool = pool::open_migrated(&resolved.db_config).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in counts.rows() {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("lessonplan db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "lessonplan",
                &mut std::io::stdout(),
            );
        }
        Commands::Lesson { command } => {
            let resolved = LessonplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = lesson_cmds::run_lesson_command(command, &db_pool, &resolved).await;
            db_pool.close().await;
            result?;
        }
        Commands::Context { command } => {
            let resolved = LessonplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = context_cmds::run_context_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Curriculum { command } => {
            let resolved = LessonplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                curriculum_cmds::run_curriculum_command(command, &db_pool, &resolved).await;
            db_pool.close().await;
            result?;
        }
        Commands::Generate {
            lesson_id,
            provider,
            timeout,
        } => {
            let resolved = LessonplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let options = generate_cmd::GenerateOptions {
                provider,
                timeout_secs: timeout,
            };
            let result =
                generate_cmd::run_generate(&db_pool, &resolved, &lesson_id, &options).await;
            db_pool.close().await;
            result?;
        }
        Commands::Attempts { lesson_id, raw } => {
            let resolved = LessonplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = generate_cmd::run_attempts(&db_pool, &lesson_id, raw).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_section_edits() {
        let cli = Cli::try_parse_from([
            "lessonplan",
            "lesson",
            "edit",
            "0b4e7c7e-0000-4000-8000-000000000000",
            "--set",
            "quiz=1. What is 1/2 + 1/4?",
            "--set",
            "activities=Fold paper strips",
        ])
        .unwrap();

        match cli.command {
            Commands::Lesson {
                command: LessonCommands::Edit { edits, .. },
            } => assert_eq!(edits.len(), 2),
            _ => panic!("expected lesson edit"),
        }
    }

    #[test]
    fn generate_accepts_provider_and_timeout() {
        let cli = Cli::try_parse_from([
            "lessonplan",
            "--database-url",
            "postgresql://localhost:5432/test",
            "generate",
            "0b4e7c7e-0000-4000-8000-000000000000",
            "--provider",
            "openai",
            "--timeout",
            "30",
        ])
        .unwrap();

        assert_eq!(
            cli.database_url.as_deref(),
            Some("postgresql://localhost:5432/test")
        );
        match cli.command {
            Commands::Generate {
                provider, timeout, ..
            } => {
                assert_eq!(provider.as_deref(), Some("openai"));
                assert_eq!(timeout, Some(30));
            }
            _ => panic!("expected generate"),
        }
    }
}
