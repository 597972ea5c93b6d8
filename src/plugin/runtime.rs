use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::plugin::CommandSurface;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPluginRecord {
    pub package_id: String,
    pub is_built_in: bool,
    /// Commands this package owns on the surface.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoaded,
}

/// Which packages are loaded into this process, and the commands they added.
///
/// Owned by one provisioner per process and never persisted.
#[derive(Debug, Default)]
pub struct PluginRuntime {
    surface: CommandSurface,
    loaded: BTreeMap<String, LoadedPluginRecord>,
}

impl PluginRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, package_id: &str) -> bool {
        self.loaded.contains_key(package_id)
    }

    /// Runs `register` against a staging surface and publishes its commands.
    ///
    /// A second call for the same package is a successful no-op that never
    /// calls `register`. If `register` fails, nothing it registered is kept.
    pub fn load<F>(
        &mut self,
        package_id: &str,
        register: F,
        is_built_in: bool,
    ) -> Result<LoadOutcome, EngineError>
    where
        F: FnOnce(&mut CommandSurface) -> Result<()>,
    {
        if self.is_loaded(package_id) {
            debug!(package_id, "plugin already loaded");
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let mut staged = CommandSurface::new();
        register(&mut staged).map_err(|err| EngineError::PluginContractViolation {
            package_id: package_id.to_string(),
            reason: format!("register failed: {}", err),
            diagnostics: Some(format!("{:?}", err)),
        })?;

        let commands = self
            .surface
            .absorb(staged, package_id)
            .map_err(|(command, owner)| {
                EngineError::contract(
                    package_id,
                    format!("command '{}' is already registered by {}", command, owner),
                )
            })?;

        info!(
            package_id,
            built_in = is_built_in,
            commands = %commands.join(","),
            "plugin loaded"
        );
        self.loaded.insert(
            package_id.to_string(),
            LoadedPluginRecord {
                package_id: package_id.to_string(),
                is_built_in,
                commands,
            },
        );
        Ok(LoadOutcome::Loaded)
    }

    /// Forgets the package. Its commands stay on the surface.
    pub fn unload(&mut self, package_id: &str) -> bool {
        self.loaded.remove(package_id).is_some()
    }

    pub fn surface(&self) -> &CommandSurface {
        &self.surface
    }

    pub fn record(&self, package_id: &str) -> Option<&LoadedPluginRecord> {
        self.loaded.get(package_id)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &LoadedPluginRecord> {
        self.loaded.values()
    }
}
