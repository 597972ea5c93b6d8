//! Package-manager backed installation of plugin packages.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

pub mod ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Bun,
    Pnpm,
    Yarn,
    Npm,
}

impl PackageManager {
    /// Fastest first; npm ships with node and is the fallback.
    pub const PRIORITY: [PackageManager; 4] = [
        PackageManager::Bun,
        PackageManager::Pnpm,
        PackageManager::Yarn,
        PackageManager::Npm,
    ];

    pub fn command(self) -> &'static str {
        match self {
            PackageManager::Bun => "bun",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Npm => "npm",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bun" => Some(Self::Bun),
            "pnpm" => Some(Self::Pnpm),
            "yarn" => Some(Self::Yarn),
            "npm" => Some(Self::Npm),
            _ => None,
        }
    }

    pub fn install_args(self, package_id: &str) -> Vec<String> {
        let verb = match self {
            PackageManager::Npm => "install",
            PackageManager::Bun | PackageManager::Pnpm | PackageManager::Yarn => "add",
        };
        vec![verb.to_string(), package_id.to_string()]
    }

    pub fn manual_command(self, package_id: &str) -> String {
        let mut argv = vec![self.command().to_string()];
        argv.extend(self.install_args(package_id));
        shell_words::join(argv)
    }
}

/// Runs `<manager> --version`; `Some(version)` when it exits successfully.
pub fn probe_version(manager: PackageManager) -> Option<String> {
    let output = Command::new(manager.command())
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    Some(version)
}

/// First candidate, in order, for which `probe` succeeds.
pub fn select_package_manager<P>(candidates: &[PackageManager], probe: P) -> Option<PackageManager>
where
    P: Fn(PackageManager) -> bool,
{
    candidates.iter().copied().find(|manager| {
        let available = probe(*manager);
        debug!(manager = manager.command(), available, "package manager probe");
        available
    })
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u128,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output_summary(&self, max_chars: usize) -> String {
        let mut text = String::new();
        if !self.stdout.trim().is_empty() {
            text.push_str(self.stdout.trim());
        }

        if !self.stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(self.stderr.trim());
        }

        if text.is_empty() {
            text = format!("exit_code={}", self.exit_code);
        }

        if text.chars().count() > max_chars {
            tail(&text, max_chars)
        } else {
            text
        }
    }
}

/// Keeps the last `max_chars` characters, where installers print their errors.
fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    let skipped: String = text.chars().skip(count.saturating_sub(max_chars)).collect();
    format!("...{}", skipped)
}

/// Installs one package and reports what the installer printed.
///
/// A non-zero exit is reported through [`CommandOutput::exit_code`]; `Err` is
/// reserved for failing to run the installer at all.
pub trait Installer {
    fn manager(&self) -> &str;

    fn install(&self, package_id: &str) -> Result<CommandOutput>;

    fn manual_command(&self, package_id: &str) -> String;
}

pub type SelectInstaller = Box<dyn Fn() -> Option<Box<dyn Installer>>>;

const YARNRC_FILE: &str = ".yarnrc.yml";

/// Installs into a plugin root by running a real package manager there.
#[derive(Debug, Clone)]
pub struct PackageManagerInstaller {
    manager: PackageManager,
    root: PathBuf,
}

impl PackageManagerInstaller {
    pub fn new(manager: PackageManager, root: impl AsRef<Path>) -> Self {
        Self {
            manager,
            root: root.as_ref().to_path_buf(),
        }
    }

    /// A private manifest keeps the package manager from walking up into an
    /// unrelated project.
    fn prepare_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create plugin root {}", self.root.display()))?;
        let manifest = self.root.join("package.json");
        if !manifest.exists() {
            let content = serde_json::to_string_pretty(&serde_json::json!({
                "name": "mediadeck-plugins",
                "private": true,
                "dependencies": {}
            }))
            .context("failed to serialize plugin root manifest")?;
            std::fs::write(&manifest, content)
                .with_context(|| format!("failed to write {}", manifest.display()))?;
        }
        // Yarn Berry defaults to Plug'n'Play, which leaves no node_modules to probe.
        let yarnrc = self.root.join(YARNRC_FILE);
        if !yarnrc.exists() {
            std::fs::write(&yarnrc, "nodeLinker: node-modules\n")
                .with_context(|| format!("failed to write {}", yarnrc.display()))?;
        }
        Ok(())
    }
}

impl Installer for PackageManagerInstaller {
    fn manager(&self) -> &str {
        self.manager.command()
    }

    fn install(&self, package_id: &str) -> Result<CommandOutput> {
        self.prepare_root()?;

        let args = self.manager.install_args(package_id);
        let command = self.manual_command(package_id);
        info!(command = %command, root = %self.root.display(), "running package manager");

        let started = Instant::now();
        let output = Command::new(self.manager.command())
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to spawn {}", command))?;

        Ok(CommandOutput {
            command,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: started.elapsed().as_millis(),
        })
    }

    fn manual_command(&self, package_id: &str) -> String {
        self.manager.manual_command(package_id)
    }
}

/// Selector that probes `candidates` on every call and installs into `root`.
pub fn system_installer(candidates: Vec<PackageManager>, root: PathBuf) -> SelectInstaller {
    Box::new(move || {
        let manager = select_package_manager(&candidates, |m| probe_version(m).is_some())?;
        info!(manager = manager.command(), "selected package manager");
        Some(Box::new(PackageManagerInstaller::new(manager, &root)) as Box<dyn Installer>)
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn selects_first_available_in_priority_order() {
        let probed = RefCell::new(Vec::new());
        let selected = select_package_manager(&PackageManager::PRIORITY, |m| {
            probed.borrow_mut().push(m);
            matches!(m, PackageManager::Yarn | PackageManager::Npm)
        });

        assert_eq!(selected, Some(PackageManager::Yarn));
        assert_eq!(
            *probed.borrow(),
            vec![PackageManager::Bun, PackageManager::Pnpm, PackageManager::Yarn]
        );
    }

    #[test]
    fn selection_fails_when_nothing_answers() {
        assert_eq!(select_package_manager(&PackageManager::PRIORITY, |_| false), None);
    }

    #[test]
    fn install_verbs_follow_each_manager() {
        assert_eq!(
            PackageManager::Npm.manual_command("@mediadeck/video"),
            "npm install @mediadeck/video"
        );
        assert_eq!(
            PackageManager::Pnpm.install_args("@mediadeck/video"),
            vec!["add", "@mediadeck/video"]
        );
        assert_eq!(PackageManager::parse(" Bun "), Some(PackageManager::Bun));
        assert_eq!(PackageManager::parse("cargo"), None);
    }

    #[test]
    fn summary_keeps_the_tail_of_long_output() {
        let output = CommandOutput {
            command: "npm install @mediadeck/video".to_string(),
            exit_code: 1,
            stdout: "resolving\n".repeat(20),
            stderr: "npm ERR! 404 Not Found".to_string(),
            duration_ms: 12,
        };
        let summary = output.output_summary(22);
        assert_eq!(summary, "...npm ERR! 404 Not Found");

        let silent = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            ..output
        };
        assert_eq!(silent.output_summary(100), "exit_code=1");
    }

    #[test]
    fn prepares_a_private_plugin_root() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("plugins");
        let installer = PackageManagerInstaller::new(PackageManager::Npm, &root);
        installer.prepare_root()?;

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(root.join("package.json"))?)?;
        assert_eq!(manifest["private"], serde_json::Value::Bool(true));
        assert_eq!(installer.manager(), "npm");
        assert_eq!(
            std::fs::read_to_string(root.join(YARNRC_FILE))?,
            "nodeLinker: node-modules\n"
        );
        Ok(())
    }
}
