//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use tk_db::{BackendConfig, DEFAULT_BUSY_TIMEOUT_MS};

/// Application configuration.
///
/// ```toml
/// actor = "alice"
///
/// [backend]
/// kind = "file"
/// path = "/home/alice/timers.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Recorded as `last_updated_by` on every change this client makes.
    pub actor: String,

    /// Storage backend, selected once at startup.
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            actor: "tk".to_string(),
            backend: BackendConfig::Sqlite {
                path: data_dir.join("tk.db"),
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            },
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later layers win: defaults, the user config file, `config_path`, then
    /// `TK_*` environment variables (`TK_BACKEND__KIND=memory`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TK_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tk.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tk"))
}

/// Returns the platform-specific data directory for tk.
///
/// On Linux: `~/.local/share/tk`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tk"))
}
