//! Configuration file management for lessonplan.
//!
//! Provides a TOML-based config file at `~/.config/lessonplan/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use lessonplan_core::orchestrator::GenerationConfig;
use lessonplan_core::provider::{
    CommandProvider, ContentProvider, HttpProvider, ProviderRegistry,
};
use lessonplan_db::config::DbConfig;

/// Provider used when neither the CLI, the environment nor the config file
/// names one.
pub const DEFAULT_PROVIDER: &str = "claude-cli";

/// Environment variable naming the provider to use.
pub const PROVIDER_ENV_VAR: &str = "LESSONPLAN_PROVIDER";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Pool size; `DbConfig::DEFAULT_MAX_CONNECTIONS` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

/// `[provider]`: which provider `generate` uses, plus any extra providers
/// beyond the built-in `claude-cli` command.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandProviderEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HttpProviderEntry>,
}

/// `[[provider.commands]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandProviderEntry {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[[provider.http]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpProviderEntry {
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// `[generation]`: overrides for [`GenerationConfig`] defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_budget_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_all_sections: Option<bool>,
}

impl GenerationSection {
    /// Apply the file's overrides on top of `base`.
    pub fn apply(&self, mut base: GenerationConfig) -> GenerationConfig {
        if let Some(secs) = self.timeout_secs {
            base.timeout = Duration::from_secs(secs);
        }
        if let Some(budget) = self.context_budget_chars {
            base.context_budget_chars = budget;
        }
        if let Some(country) = &self.default_country {
            base.default_country = country.clone();
        }
        if let Some(strict) = self.require_all_sections {
            base.require_all_sections = strict;
        }
        base
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the lessonplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/lessonplan` or
/// `~/.config/lessonplan`, including on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("lessonplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("lessonplan")
}

/// Return the path to the lessonplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

/// Write `config` to `path`. Sets file permissions to 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct LessonplanConfig {
    pub db_config: DbConfig,
    pub generation: GenerationConfig,
    /// Provider `generate` uses unless told otherwise.
    pub default_provider: String,
    pub command_providers: Vec<CommandProviderEntry>,
    pub http_providers: Vec<HttpProviderEntry>,
}

impl LessonplanConfig {
    /// Resolve against the process environment and the config file on disk.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = match load_config() {
            Ok(file) => Some(file),
            Err(e) if config_path().exists() => return Err(e),
            Err(_) => None,
        };
        Ok(Self::resolve_with(cli_db_url, |key| std::env::var(key).ok(), file))
    }

    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `LESSONPLAN_DATABASE_URL` > `database.url` >
    ///   `DbConfig::DEFAULT_URL`
    /// - Pool size: `database.max_connections` > `DbConfig::DEFAULT_MAX_CONNECTIONS`
    /// - Provider: `LESSONPLAN_PROVIDER` > `provider.default` > `claude-cli`
    /// - Generation knobs: `[generation]` > `GenerationConfig::default()`
    pub fn resolve_with(
        cli_db_url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
        file: Option<ConfigFile>,
    ) -> Self {
        let file = file.unwrap_or_default();

        let db_url = cli_db_url
            .map(str::to_string)
            .or_else(|| env(DbConfig::ENV_VAR))
            .or(file.database.url)
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string());

        let default_provider = env(PROVIDER_ENV_VAR)
            .or(file.provider.default)
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let mut db_config = DbConfig::new(db_url);
        if let Some(max) = file.database.max_connections {
            db_config = db_config.with_max_connections(max);
        }

        Self {
            db_config,
            generation: file.generation.apply(GenerationConfig::default()),
            default_provider,
            command_providers: file.provider.commands,
            http_providers: file.provider.http,
        }
    }

    /// Build the registry of every configured provider. The built-in
    /// `claude-cli` command is always present unless a config entry
    /// replaces it.
    pub fn build_registry(&self, env: impl Fn(&str) -> Option<String>) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        registry.register(CommandProvider::new());

        for entry in &self.command_providers {
            let provider = CommandProvider::with_command(&entry.program, &entry.args)
                .named(&entry.name);
            registry.register(provider);
        }

        for entry in &self.http_providers {
            let api_key = entry.api_key_env.as_deref().and_then(&env);
            if entry.api_key_env.is_some() && api_key.is_none() {
                tracing::warn!(
                    provider = %entry.name,
                    env = entry.api_key_env.as_deref().unwrap_or_default(),
                    "API key variable is unset, calling without a key"
                );
            }
            let mut provider = HttpProvider::new(&entry.base_url, &entry.model, api_key)
                .with_context(|| format!("failed to configure provider {}", entry.name))?
                .named(&entry.name);
            if let Some(temperature) = entry.temperature {
                provider = provider.with_temperature(temperature);
            }
            registry.register(provider);
        }

        Ok(registry)
    }

    /// Pick `requested`, or the default provider, out of `registry`.
    pub fn select_provider(
        &self,
        registry: &ProviderRegistry,
        requested: Option<&str>,
    ) -> Result<Arc<dyn ContentProvider>> {
        let name = requested.unwrap_or(&self.default_provider);
        match registry.get(name) {
            Some(provider) => Ok(provider),
            None => bail!(
                "unknown provider {name:?} (configured: {})",
                registry.list().join(", ")
            ),
        }
    }
}
