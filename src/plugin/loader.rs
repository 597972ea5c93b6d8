use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::error::EngineError;
use crate::plugin::manifest::{manifest_path, package_dir, read_manifest, CommandDecl};
use crate::plugin::{CommandSurface, Plugin};

/// Finds installed plugin packages and turns them into [`Plugin`]s.
pub trait PluginLoader {
    /// Installed probe: true when the package manifest is present on disk.
    fn is_installed(&self, package_id: &str) -> bool;

    fn load(&self, package_id: &str) -> Result<Box<dyn Plugin>, EngineError>;
}

/// Loads plugin packages from package-manager install roots, first match wins.
#[derive(Debug, Clone)]
pub struct PackageLoader {
    roots: Vec<PathBuf>,
}

impl PackageLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn locate(&self, package_id: &str) -> Option<&Path> {
        self.roots
            .iter()
            .find(|root| manifest_path(root, package_id).is_file())
            .map(PathBuf::as_path)
    }
}

impl PluginLoader for PackageLoader {
    fn is_installed(&self, package_id: &str) -> bool {
        self.locate(package_id).is_some()
    }

    fn load(&self, package_id: &str) -> Result<Box<dyn Plugin>, EngineError> {
        let root = self
            .locate(package_id)
            .ok_or_else(|| EngineError::contract(package_id, "package manifest not found"))?;
        let path = manifest_path(root, package_id);
        let manifest = read_manifest(&path).map_err(|err| EngineError::PluginContractViolation {
            package_id: package_id.to_string(),
            reason: "unreadable package manifest".to_string(),
            diagnostics: Some(format!("{:#}", err)),
        })?;

        let section = manifest.mediadeck.ok_or_else(|| {
            EngineError::contract(
                package_id,
                "package.json has no `mediadeck` section, nothing to register",
            )
        })?;
        let entry = section.entry.ok_or_else(|| {
            EngineError::contract(package_id, "`mediadeck.entry` is missing")
        })?;
        if section.commands.is_empty() {
            return Err(EngineError::contract(
                package_id,
                "`mediadeck.commands` declares no commands",
            ));
        }

        let dir = package_dir(root, package_id);
        let entry_path = dir.join(&entry);
        if !entry_path.is_file() {
            return Err(EngineError::contract(
                package_id,
                format!("entry {} does not exist", entry_path.display()),
            ));
        }

        debug!(
            package_id,
            entry = %entry_path.display(),
            version = manifest.version.as_deref().unwrap_or("unknown"),
            "package manifest accepted"
        );
        Ok(Box::new(ExternalPlugin {
            package_id: package_id.to_string(),
            package_dir: dir,
            entry: entry_path,
            runner: section.runner,
            commands: section.commands,
        }))
    }
}

/// A plugin whose commands run the package's entry executable.
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    package_id: String,
    package_dir: PathBuf,
    entry: PathBuf,
    runner: Option<String>,
    commands: Vec<CommandDecl>,
}

impl Plugin for ExternalPlugin {
    fn package_id(&self) -> &str {
        &self.package_id
    }

    fn register(&self, surface: &mut CommandSurface) -> Result<()> {
        for decl in &self.commands {
            let launch = Launch {
                package_id: self.package_id.clone(),
                package_dir: self.package_dir.clone(),
                entry: self.entry.clone(),
                runner: self.runner.clone(),
                command: decl.name.clone(),
            };
            surface.add_command(decl.name.clone(), decl.description.clone(), move |args| {
                launch.run(args)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Launch {
    package_id: String,
    package_dir: PathBuf,
    entry: PathBuf,
    runner: Option<String>,
    command: String,
}

impl Launch {
    fn argv(&self, args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        if let Some(runner) = &self.runner {
            argv.push(runner.clone());
        }
        argv.push(self.entry.display().to_string());
        argv.push(self.command.clone());
        argv.extend(args.iter().cloned());
        argv
    }

    fn run(&self, args: &[String]) -> Result<()> {
        let argv = self.argv(args);
        debug!(package_id = %self.package_id, argv = %shell_words::join(&argv), "running plugin command");

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .env("MEDIADECK_PLUGIN_DIR", &self.package_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("failed to start {} for {}", argv[0], self.package_id))?;

        if !status.success() {
            bail!(
                "{} command '{}' exited with {}",
                self.package_id,
                self.command,
                status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            );
        }
        Ok(())
    }
}
