//! Configuration for switchyard engines.
//!
//! TOML file + environment loading via figment, translation to
//! `switchyard_core::EngineConfig`, and the file-backed copy of the static
//! topology overlay. The core never reads files itself; binaries go
//! through this crate.

mod static_file;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use switchyard_core::EngineConfig;
use switchyard_core::config::{DEFAULT_EVENT_CHANNEL_SIZE, DEFAULT_PORT_COST_BASE};

pub use static_file::{EDGE_PORTS_FILE, SWITCH_LINKS_FILE, TomlStaticTopologyStore};

/// Prefix of environment overrides. Nested keys use a double underscore,
/// e.g. `SWITCHYARD_ENGINE__INITIAL_OWNER=false`.
pub const ENV_PREFIX: &str = "SWITCHYARD_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub static_topology: StaticTopologySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    /// Start as inventory owner (publishes events).
    #[serde(default = "default_true")]
    pub initial_owner: bool,

    /// Load the persisted static topology into the store on start.
    #[serde(default = "default_true")]
    pub restore_static_topology: bool,

    /// Reference speed in kb/s for port cost.
    #[serde(default = "default_port_cost_base")]
    pub port_cost_base: u64,

    /// Capacity of the inventory event channel.
    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            initial_owner: true,
            restore_static_topology: true,
            port_cost_base: DEFAULT_PORT_COST_BASE,
            event_channel_size: DEFAULT_EVENT_CHANNEL_SIZE,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_port_cost_base() -> u64 {
    DEFAULT_PORT_COST_BASE
}
fn default_event_channel_size() -> usize {
    DEFAULT_EVENT_CHANNEL_SIZE
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticTopologySection {
    /// Directory holding the static topology files. Defaults to the
    /// platform data directory.
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Validate and translate the `[engine]` section.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let engine = &self.engine;
        if engine.port_cost_base == 0 {
            return Err(ConfigError::Validation {
                field: "engine.port_cost_base".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if engine.event_channel_size == 0 {
            return Err(ConfigError::Validation {
                field: "engine.event_channel_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(EngineConfig {
            initial_owner: engine.initial_owner,
            restore_static_topology: engine.restore_static_topology,
            port_cost_base: engine.port_cost_base,
            event_channel_size: engine.event_channel_size,
        })
    }

    /// Where the static topology files live.
    pub fn static_topology_dir(&self) -> PathBuf {
        self.static_topology
            .directory
            .clone()
            .unwrap_or_else(default_data_dir)
    }

    /// File-backed persister for the configured directory.
    pub fn static_topology_store(&self) -> TomlStaticTopologyStore {
        TomlStaticTopologyStore::new(self.static_topology_dir())
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "switchyard", "switchyard")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("switchyard.toml"),
        |dirs| dirs.config_dir().join("switchyard.toml"),
    )
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("switchyard");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(&config_path())
}

/// Load the Config from `path` + environment. A missing file means
/// defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
