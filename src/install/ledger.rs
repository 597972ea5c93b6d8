use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LEDGER_FILE: &str = "installed.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub package_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub capability: Option<String>,
    pub manager: String,
    pub installed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    plugins: Vec<LedgerEntry>,
}

/// Record of packages installed into one plugin root, kept for later runs.
///
/// Only written after an install has fully completed.
#[derive(Debug, Clone)]
pub struct InstallLedger {
    path: PathBuf,
}

impl InstallLedger {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(LEDGER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.read()?.plugins)
    }

    pub fn find(&self, package_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self
            .read()?
            .plugins
            .into_iter()
            .find(|entry| entry.package_id == package_id))
    }

    /// Inserts or replaces the entry for `entry.package_id`.
    pub fn record(&self, entry: LedgerEntry) -> Result<()> {
        let mut file = self.read()?;
        match file
            .plugins
            .iter_mut()
            .find(|existing| existing.package_id == entry.package_id)
        {
            Some(existing) => *existing = entry,
            None => file.plugins.push(entry),
        }
        self.write(&file)
    }

    fn read(&self) -> Result<LedgerFile> {
        if !self.path.exists() {
            return Ok(LedgerFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn write(&self, file: &LedgerFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(file).context("failed to serialize install ledger")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    fn entry(package_id: &str, manager: &str) -> LedgerEntry {
        LedgerEntry {
            package_id: package_id.to_string(),
            capability: Some("video".to_string()),
            manager: manager.to_string(),
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn missing_ledger_reads_as_empty() -> Result<()> {
        let temp = TempDir::new()?;
        let ledger = InstallLedger::new(&temp.path().join("never-created"));
        assert!(ledger.entries()?.is_empty());
        assert!(!ledger.path().exists());
        Ok(())
    }

    #[test]
    fn record_upserts_by_package_id() -> Result<()> {
        let temp = TempDir::new()?;
        let ledger = InstallLedger::new(temp.path());

        ledger.record(entry("@mediadeck/video", "npm"))?;
        ledger.record(entry("@mediadeck/image", "npm"))?;
        ledger.record(entry("@mediadeck/video", "pnpm"))?;

        let entries = ledger.entries()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(
            ledger.find("@mediadeck/video")?.map(|e| e.manager),
            Some("pnpm".to_string())
        );
        assert_eq!(ledger.find("@mediadeck/audio")?, None);
        Ok(())
    }
}
