//! Configuration file support.
//!
//! Two locations are consulted:
//! - Global: `~/.vssetup/config.toml` - User-wide defaults
//! - Project: `.vssetup/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! ```toml
//! [setup]
//! version = 17
//! install-location = 'C:\Program Files\Microsoft Visual Studio\2022\Community'
//! ewdk = true
//! common-tools-hint = false
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Query configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Instance selection settings
    pub setup: SetupSettings,
}

/// Instance selection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SetupSettings {
    /// Required major version (e.g., 17 for Visual Studio 2022)
    pub version: Option<u16>,

    /// Pin selection to the instance installed here
    pub install_location: Option<PathBuf>,

    /// Honor the Enterprise WDK environment markers (default: true)
    pub ewdk: Option<bool>,

    /// Honor the `VS<major>0COMNTOOLS` hint (default: true)
    pub common_tools_hint: Option<bool>,
}

impl SetupConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read setup config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse setup config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist
    /// or can't be read.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load setup config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: SetupConfig) {
        if other.setup.version.is_some() {
            self.setup.version = other.setup.version;
        }
        if other.setup.install_location.is_some() {
            self.setup.install_location = other.setup.install_location;
        }
        if other.setup.ewdk.is_some() {
            self.setup.ewdk = other.setup.ewdk;
        }
        if other.setup.common_tools_hint.is_some() {
            self.setup.common_tools_hint = other.setup.common_tools_hint;
        }
    }

    /// Configured major version, or `default` when unset.
    pub fn required_major(&self, default: u16) -> u16 {
        self.setup.version.unwrap_or(default)
    }

    pub fn install_location(&self) -> Option<&Path> {
        self.setup.install_location.as_deref()
    }

    pub fn honor_ewdk(&self) -> bool {
        self.setup.ewdk.unwrap_or(true)
    }

    pub fn honor_common_tools_hint(&self) -> bool {
        self.setup.common_tools_hint.unwrap_or(true)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.vssetup/config.toml)
/// 2. Global config (~/.vssetup/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> SetupConfig {
    let mut config = SetupConfig::default();

    if global_path.exists() {
        config.merge(SetupConfig::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(SetupConfig::load_or_default(project_path));
    }

    config
}

/// Load configuration for a project rooted at `project_root`.
pub fn load_project_config(project_root: &Path) -> SetupConfig {
    let project_path = project_config_path(project_root);
    match global_config_path() {
        Some(global) => load_config(&global, &project_path),
        None => load_config(&PathBuf::new(), &project_path),
    }
}

/// Get the global config directory (~/.vssetup).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".vssetup"))
}

/// Get the global config path (~/.vssetup/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.vssetup/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".vssetup").join("config.toml")
}
