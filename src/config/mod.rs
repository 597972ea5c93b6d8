use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::install::PackageManager;

pub const CONFIG_DIR: &str = ".mediadeck";
pub const CONFIG_FILE: &str = "config.json";
pub const HOME_ENV: &str = "MEDIADECK_HOME";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads `<workdir>/.mediadeck/config.json`, or defaults when it is absent.
    pub fn load(workdir: &Path) -> Result<Self> {
        let path = Self::path(workdir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn path(workdir: &Path) -> PathBuf {
        workdir.join(CONFIG_DIR).join(CONFIG_FILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Global,
    Local,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "defaults::package_prefix")]
    pub package_prefix: String,
    #[serde(default = "defaults::package_managers")]
    pub package_managers: Vec<String>,
    /// Overrides `$MEDIADECK_HOME/plugins` for the global scope.
    #[serde(default)]
    pub global_root: Option<PathBuf>,
}

impl PluginsConfig {
    pub fn package_managers(&self) -> Result<Vec<PackageManager>> {
        if self.package_managers.is_empty() {
            bail!("plugins.package_managers must list at least one package manager");
        }
        self.package_managers
            .iter()
            .map(|raw| {
                PackageManager::parse(raw).with_context(|| {
                    format!(
                        "invalid plugins.package_managers entry '{}', expected bun|pnpm|yarn|npm",
                        raw
                    )
                })
            })
            .collect()
    }

    pub fn local_root(&self, workdir: &Path) -> PathBuf {
        workdir.join(CONFIG_DIR).join("plugins")
    }

    pub fn global_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.global_root {
            return Ok(root.clone());
        }
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home).join("plugins"));
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|v| !v.is_empty())
            .with_context(|| {
                format!("cannot locate a home directory; set {} or plugins.global_root", HOME_ENV)
            })?;
        Ok(PathBuf::from(home).join(CONFIG_DIR).join("plugins"))
    }

    pub fn root_for(&self, scope: Scope, workdir: &Path) -> Result<PathBuf> {
        match scope {
            Scope::Local => Ok(self.local_root(workdir)),
            Scope::Global => self.global_root(),
        }
    }

    /// Roots the installed probe searches: project-local first.
    pub fn search_roots(&self, workdir: &Path) -> Result<Vec<PathBuf>> {
        Ok(vec![self.local_root(workdir), self.global_root()?])
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            package_prefix: defaults::package_prefix(),
            package_managers: defaults::package_managers(),
            global_root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use crate::install::PackageManager;
    use crate::registry::DEFAULT_PACKAGE_PREFIX;

    pub fn package_prefix() -> String {
        DEFAULT_PACKAGE_PREFIX.to_string()
    }

    pub fn package_managers() -> Vec<String> {
        PackageManager::PRIORITY
            .iter()
            .map(|manager| manager.command().to_string())
            .collect()
    }

    pub fn log_level() -> String {
        "warn".to_string()
    }
}
