// Configuration loading and parsing (courtside.toml).

use courtside_core::{OptimizerSettings, Platform, RosterTemplate};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const CONFIG_FILE: &str = "courtside.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub optimizer: OptimizerConfig,
    pub data_paths: DataPaths,
    pub db_path: String,
    pub export_dir: String,
    /// Validated template overrides, keyed by platform.
    pub templates: HashMap<Platform, RosterTemplate>,
}

impl Config {
    /// The roster template for `platform`: the configured override if there
    /// is one, the platform's standard template otherwise.
    pub fn template_for(&self, platform: Platform) -> RosterTemplate {
        self.templates
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| platform.default_template())
    }
}

// ---------------------------------------------------------------------------
// courtside.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire courtside.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    optimizer: OptimizerConfig,
    data_paths: DataPaths,
    database: DatabaseSection,
    export: ExportSection,
    #[serde(default)]
    platforms: HashMap<String, PlatformOverride>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExportSection {
    dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    pub seed: u64,
    pub max_backtracks: usize,
    pub diversity_retries: usize,
    pub value_weight: f64,
    pub exploration: f64,
    /// Wall-clock limit for one batch in milliseconds; 0 means unlimited.
    #[serde(default)]
    pub time_limit_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl OptimizerConfig {
    pub fn settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            seed: self.seed,
            max_backtracks: self.max_backtracks,
            diversity_retries: self.diversity_retries,
            value_weight: self.value_weight,
            exploration: self.exploration,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PlatformOverride {
    salary_cap: u32,
    slots: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/courtside.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Parse and validate the text of a courtside.toml file. `path` is only
/// used in error messages.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate_optimizer(&file.optimizer)?;
    let templates = resolve_overrides(&file.platforms)?;

    Ok(Config {
        optimizer: file.optimizer,
        data_paths: file.data_paths,
        db_path: file.database.path,
        export_dir: file.export.dir,
        templates,
    })
}

/// Copy `defaults/courtside.toml` to `config/courtside.toml` if the latter
/// does not exist yet. Returns the path written, or `None` when a config was
/// already in place (it is never overwritten).
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE);

    if target.exists() {
        return Ok(None);
    }
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} in {} or its defaults/ directory; \
                 run from the project root or ensure defaults/ is present",
                config_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    // create_new: a config written by another process since the check wins.
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", target.display()),
            })
        }
    };
    let content = std::fs::read(&source).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read {}: {e}", source.display()),
    })?;
    std::io::Write::write_all(&mut dest, &content).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to write {}: {e}", target.display()),
    })?;

    info!("copied default config to {}", target.display());
    Ok(Some(target))
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Copies the default config into place first if needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_optimizer(opt: &OptimizerConfig) -> Result<(), ConfigError> {
    let unit_fields: &[(&str, f64)] = &[
        ("optimizer.value_weight", opt.value_weight),
        ("optimizer.exploration", opt.exploration),
    ];
    for (name, val) in unit_fields {
        if !(0.0..=1.0).contains(val) {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be between 0.0 and 1.0 inclusive, got {val}"),
            });
        }
    }

    if opt.workers == 0 {
        return Err(ConfigError::ValidationError {
            field: "optimizer.workers".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

fn resolve_overrides(
    raw: &HashMap<String, PlatformOverride>,
) -> Result<HashMap<Platform, RosterTemplate>, ConfigError> {
    let mut templates = HashMap::new();

    for (name, ov) in raw {
        let field = format!("platforms.{name}");
        let platform = Platform::from_name(name).ok_or_else(|| ConfigError::ValidationError {
            field: field.clone(),
            message: format!("unknown platform `{name}`"),
        })?;

        if ov.salary_cap == 0 {
            return Err(ConfigError::ValidationError {
                field: format!("{field}.salary_cap"),
                message: "must be greater than 0".into(),
            });
        }
        if ov.slots.is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("{field}.slots"),
                message: "must list at least one slot".into(),
            });
        }

        let template = RosterTemplate::from_labels(&ov.slots, ov.salary_cap).ok_or_else(|| {
            ConfigError::ValidationError {
                field: format!("{field}.slots"),
                message: format!("unknown slot label in {:?}", ov.slots),
            }
        })?;

        if templates.insert(platform, template).is_some() {
            return Err(ConfigError::ValidationError {
                field,
                message: format!("{platform} is configured more than once"),
            });
        }
    }

    Ok(templates)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
