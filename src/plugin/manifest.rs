use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of a plugin package's `package.json` the engine reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub mediadeck: Option<PluginSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginSection {
    /// Executable path relative to the package directory.
    #[serde(default)]
    pub entry: Option<String>,
    /// Interpreter used to start `entry`, e.g. `node`.
    #[serde(default)]
    pub runner: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub fn package_dir(root: &Path, package_id: &str) -> PathBuf {
    package_id
        .split('/')
        .fold(root.join("node_modules"), |dir, part| dir.join(part))
}

pub fn manifest_path(root: &Path, package_id: &str) -> PathBuf {
    package_dir(root, package_id).join(MANIFEST_FILE)
}

pub fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Manifests of every package installed under `prefix` in `root`.
///
/// A package whose manifest cannot be read is skipped with a warning.
pub fn scan_installed(root: &Path, prefix: &str) -> Result<Vec<PackageManifest>> {
    let scope_dir = package_dir(root, prefix);
    if !scope_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut manifests = Vec::new();
    for entry in WalkDir::new(&scope_dir)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry
            .with_context(|| format!("failed to scan plugin scope {}", scope_dir.display()))?;
        if entry.file_name() != MANIFEST_FILE || !entry.file_type().is_file() {
            continue;
        }
        match read_manifest(entry.path()) {
            Ok(manifest) => manifests.push(manifest),
            Err(err) => warn!(
                path = %entry.path().display(),
                error = %format!("{:#}", err),
                "skipping unreadable plugin manifest"
            ),
        }
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    fn write_package(root: &Path, package_id: &str, body: &str) -> Result<()> {
        let dir = package_dir(root, package_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(MANIFEST_FILE), body)?;
        Ok(())
    }

    #[test]
    fn locates_scoped_packages_under_node_modules() {
        let path = manifest_path(Path::new("/plugins"), "@mediadeck/image");
        assert_eq!(
            path,
            PathBuf::from("/plugins/node_modules/@mediadeck/image/package.json")
        );
    }

    #[test]
    fn parses_plugin_section() -> Result<()> {
        let temp = TempDir::new()?;
        write_package(
            temp.path(),
            "@mediadeck/audio",
            r#"{
                "name": "@mediadeck/audio",
                "version": "1.2.0",
                "dependencies": {"fluent-ffmpeg": "^2.1.2"},
                "mediadeck": {
                    "entry": "bin/audio.js",
                    "runner": "node",
                    "commands": [{"name": "audio", "description": "audio tools"}]
                }
            }"#,
        )?;

        let manifest = read_manifest(&manifest_path(temp.path(), "@mediadeck/audio"))?;
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        let section = manifest.mediadeck.expect("plugin section");
        assert_eq!(section.entry.as_deref(), Some("bin/audio.js"));
        assert_eq!(section.runner.as_deref(), Some("node"));
        assert_eq!(section.commands[0].name, "audio");
        Ok(())
    }

    #[test]
    fn scans_only_the_requested_scope() -> Result<()> {
        let temp = TempDir::new()?;
        write_package(temp.path(), "@mediadeck/video", r#"{"name": "@mediadeck/video"}"#)?;
        write_package(temp.path(), "@mediadeck/image", r#"{"name": "@mediadeck/image"}"#)?;
        write_package(temp.path(), "@acme/other", r#"{"name": "@acme/other"}"#)?;

        let names: Vec<_> = scan_installed(temp.path(), "@mediadeck")?
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["@mediadeck/image", "@mediadeck/video"]);

        assert!(scan_installed(temp.path(), "@missing")?.is_empty());
        Ok(())
    }

    #[test]
    fn scan_skips_malformed_manifests() -> Result<()> {
        let temp = TempDir::new()?;
        write_package(temp.path(), "@mediadeck/broken", "{not json")?;
        write_package(temp.path(), "@mediadeck/video", r#"{"name": "@mediadeck/video"}"#)?;

        let names: Vec<_> = scan_installed(temp.path(), "@mediadeck")?
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["@mediadeck/video"]);
        Ok(())
    }
}
