// Configuration loading and parsing (draft.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::draft::sequencer::DraftFormat;
use crate::draft::team::Team;

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
    pub draft: DraftConfig,
    pub teams: Vec<TeamConfig>,
    pub db_path: PathBuf,
    pub data_paths: DataPaths,
    /// Directory the config was loaded from; relative data paths resolve
    /// against it.
    pub base_dir: PathBuf,
}

impl Config {
    /// Path to the player pool CSV.
    pub fn players_path(&self) -> PathBuf {
        self.base_dir.join(&self.data_paths.players)
    }

    /// Teams in draft order, ready for a fresh draft.
    pub fn build_teams(&self) -> Vec<Team> {
        self.teams.iter().map(TeamConfig::to_team).collect()
    }
}

// ---------------------------------------------------------------------------
// draft.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire draft.toml file.
#[derive(Debug, Clone, Deserialize)]
struct DraftFile {
    draft: DraftConfig,
    #[serde(default)]
    teams: Vec<TeamConfig>,
    #[serde(default)]
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    /// The event whose RSVP list is being drafted.
    pub event_id: String,
    pub format: DraftFormat,
    /// Identifies this client on the realtime feed. Defaults to a
    /// timestamp-based ID when omitted.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl DraftConfig {
    /// The configured client ID, or a freshly generated one.
    pub fn resolved_client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => generate_client_id(),
        }
    }
}

/// Generate a client ID from the current UTC timestamp.
///
/// Format: `client_YYYYMMDD_HHMMSS_SSS` (e.g. `client_20261019_143022_123`).
pub fn generate_client_id() -> String {
    chrono::Utc::now()
        .format("client_%Y%m%d_%H%M%S_%3f")
        .to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Player ID of the captain.
    pub captain: String,
}

impl TeamConfig {
    pub fn to_team(&self) -> Team {
        Team::new(
            self.id.clone(),
            self.name.clone(),
            self.color.clone(),
            self.captain.clone(),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/draft.toml` relative to the
/// given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let draft_path = base_dir.join("config").join("draft.toml");
    let text = read_file(&draft_path)?;
    let file: DraftFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: draft_path.clone(),
        source: e,
    })?;

    let db_path = match file.database.path {
        Some(p) if !p.trim().is_empty() => base_dir.join(p),
        _ => default_db_path(),
    };

    let config = Config {
        draft: file.draft,
        teams: file.teams,
        db_path,
        data_paths: file.data_paths,
        base_dir: base_dir.to_path_buf(),
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/`: every regular file in `defaults/` that is
/// missing from `config/` is copied over, except `*.example` templates.
/// Files already in `config/` are never touched. Returns the copied paths in
/// name order.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "no defaults/ or config/ directory under {}; start draftroom from its install directory",
            base_dir.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
    {
        let path = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let is_template = path.extension().is_some_and(|ext| ext == "example");
        if path.is_file() && !is_template {
            sources.push(path);
        }
    }
    sources.sort();

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)
            .map_err(|e| copy_error(format!("cannot copy {}: {e}", source.display())))?
        {
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` exists. `create_new` makes the
/// existence check and the creation a single step.
fn copy_if_missing(source: &Path, target: &Path) -> std::io::Result<bool> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut src = std::fs::File::open(source)?;
    std::io::copy(&mut src, &mut dest)?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Seed and load the configuration of the working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let base_dir = std::env::current_dir().map_err(|e| {
        copy_error(format!("cannot determine the working directory: {e}"))
    })?;
    ensure_config_files(&base_dir)?;
    load_config_from(&base_dir)
}

/// Database location when draft.toml does not set one: the platform data
/// directory, or the working directory if none can be determined.
pub fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("org", "draftroom", "draftroom")
        .map(|dirs| dirs.data_dir().join("draftroom.db"))
        .unwrap_or_else(|| PathBuf::from("draftroom.db"))
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

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.draft.event_id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "draft.event_id".into(),
            message: "must not be empty".into(),
        });
    }

    if config.teams.len() < 2 {
        return Err(ConfigError::ValidationError {
            field: "teams".into(),
            message: format!("a draft needs at least 2 teams, got {}", config.teams.len()),
        });
    }

    let mut ids = HashSet::new();
    let mut captains = HashSet::new();
    for (i, team) in config.teams.iter().enumerate() {
        if team.id.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].id"),
                message: "must not be empty".into(),
            });
        }
        if team.captain.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].captain"),
                message: "must not be empty".into(),
            });
        }
        if !ids.insert(team.id.as_str()) {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].id"),
                message: format!("duplicate team id '{}'", team.id),
            });
        }
        if !captains.insert(team.captain.as_str()) {
            return Err(ConfigError::ValidationError {
                field: format!("teams[{i}].captain"),
                message: format!("'{}' already captains another team", team.captain),
            });
        }
    }

    if config.data_paths.players.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.players".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
