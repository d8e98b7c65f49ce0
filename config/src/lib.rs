//! Configuration for the ghul language server.
//!
//! Looked up at `<workspace>/.ghul/config.toml`, then `~/.ghul/config.toml`.
//! Every section is optional; a missing or broken file means defaults.
//!
//! ```toml
//! [compiler]
//! command = "dotnet"
//! args = ["${GHUL_HOME}/ghul-compiler.dll"]
//!
//! [sources]
//! globs = ["src/**/*.ghul"]
//!
//! [timing]
//! edit_debounce_ms = 100
//! watchdog_secs = 120
//! ```

mod env;
mod error;
mod sources;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ghul_bridge::{BridgeConfig, CompilerConfig, DEFAULT_EDIT_DEBOUNCE, DEFAULT_WATCHDOG_TIMEOUT};
use serde::Deserialize;

pub use env::expand_env_vars;
pub use error::ConfigError;
pub use sources::discover_sources;

const CONFIG_DIR: &str = ".ghul";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GhulConfig {
    pub compiler: CompilerConfig,
    pub sources: SourcesConfig,
    pub timing: TimingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Matched against paths relative to the workspace root.
    pub globs: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            globs: vec![String::from("**/*.ghul")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub edit_debounce_ms: u64,
    pub watchdog_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            edit_debounce_ms: DEFAULT_EDIT_DEBOUNCE.as_millis() as u64,
            watchdog_secs: DEFAULT_WATCHDOG_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Write logs here instead of stderr.
    pub file: Option<PathBuf>,
}

impl GhulConfig {
    /// Load the first config file that exists, falling back to defaults when
    /// none does or it cannot be used.
    pub fn load(workspace_root: &Path) -> Self {
        let Some(path) = config_paths(workspace_root)
            .into_iter()
            .find(|path| path.exists())
        else {
            tracing::debug!("No config file found; using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config");
                config
            }
            Err(err) => {
                tracing::warn!("Ignoring config: {err}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Bridge settings for `workspace_root`, with `${VAR}` references in the
    /// compiler command line expanded.
    pub fn bridge_config(&self, workspace_root: &Path) -> BridgeConfig {
        let compiler = CompilerConfig {
            command: expand_env_vars(&self.compiler.command),
            args: self.compiler.args.iter().map(|a| expand_env_vars(a)).collect(),
            analyse_args: self
                .compiler
                .analyse_args
                .iter()
                .map(|a| expand_env_vars(a))
                .collect(),
            block: self.compiler.block,
        };
        BridgeConfig::new(compiler, workspace_root)
            .with_edit_debounce(Duration::from_millis(self.timing.edit_debounce_ms))
            .with_watchdog_timeout(Duration::from_secs(self.timing.watchdog_secs))
    }

    pub fn discover_sources(&self, workspace_root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        discover_sources(workspace_root, &self.sources.globs)
    }
}

/// Candidate config files, most specific first.
pub fn config_paths(workspace_root: &Path) -> Vec<PathBuf> {
    let mut paths = vec![workspace_root.join(CONFIG_DIR).join(CONFIG_FILE)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_DIR).join(CONFIG_FILE));
    }
    paths
}
