//! Capability registry: short names and aliases mapped to plugin packages.
//!
//! The registry is built once from the compiled-in catalog and never mutated,
//! so resolution depends on nothing but its input.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::error::EngineError;

mod catalog;

use self::catalog::CATALOG;

pub const DEFAULT_PACKAGE_PREFIX: &str = "@mediadeck";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Core,
    Advanced,
    Experimental,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Advanced => "advanced",
            Category::Experimental => "experimental",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub short_name: String,
    pub package_id: String,
    pub category: Category,
    pub system_requirements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
}

impl CapabilityDescriptor {
    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    prefix: String,
    descriptors: Vec<CapabilityDescriptor>,
    package_pattern: Regex,
}

impl CapabilityRegistry {
    pub fn new() -> Result<Self> {
        Self::with_prefix(DEFAULT_PACKAGE_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let prefix = prefix.trim().trim_end_matches('/').to_string();
        let package_pattern = Regex::new(r"^@[a-z0-9][a-z0-9._~-]*/[a-z0-9][a-z0-9._~-]*$")
            .context("failed to compile package id regex")?;
        if !package_pattern.is_match(&format!("{}/probe", prefix)) {
            bail!(
                "invalid package prefix '{}', expected a scope like @mediadeck",
                prefix
            );
        }

        let mut descriptors: Vec<CapabilityDescriptor> = Vec::with_capacity(CATALOG.len());
        for entry in CATALOG {
            let descriptor = match entry.alias_of {
                None => CapabilityDescriptor {
                    short_name: entry.short_name.to_string(),
                    package_id: format!("{}/{}", prefix, entry.package),
                    category: entry.category,
                    system_requirements: entry
                        .system_requirements
                        .iter()
                        .map(|req| req.to_string())
                        .collect(),
                    alias_of: None,
                },
                Some(target) => {
                    let canonical = descriptors
                        .iter()
                        .find(|d| d.short_name == target && !d.is_alias())
                        .with_context(|| {
                            format!(
                                "catalog alias '{}' points at unknown capability '{}'",
                                entry.short_name, target
                            )
                        })?;
                    CapabilityDescriptor {
                        short_name: entry.short_name.to_string(),
                        alias_of: Some(canonical.package_id.clone()),
                        ..canonical.clone()
                    }
                }
            };
            descriptors.push(descriptor);
        }

        Ok(Self {
            prefix,
            descriptors,
            package_pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolves a short name, alias or literal package id to a package id.
    pub fn resolve(&self, name: &str) -> Result<String, EngineError> {
        let key = normalize(name);
        if let Some(descriptor) = self.find_short_name(&key) {
            return Ok(descriptor.package_id.clone());
        }
        if self.package_pattern.is_match(&key) {
            return Ok(key);
        }
        Err(EngineError::unknown_capability(name.trim()))
    }

    /// Canonical descriptor for a short name, alias or known package id.
    pub fn describe(&self, name: &str) -> Result<&CapabilityDescriptor, EngineError> {
        let key = normalize(name);
        let found = match self.find_short_name(&key) {
            Some(descriptor) => self.canonical(&descriptor.package_id),
            None => self.canonical(&key),
        };
        found.ok_or_else(|| EngineError::unknown_capability(name.trim()))
    }

    /// The non-alias descriptor owning `package_id`.
    pub fn canonical(&self, package_id: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors
            .iter()
            .find(|d| !d.is_alias() && d.package_id == package_id)
    }

    pub fn is_valid(&self, name: &str) -> bool {
        let key = normalize(name);
        self.find_short_name(&key).is_some() || self.package_pattern.is_match(&key)
    }

    pub fn list_by_category(&self) -> BTreeMap<Category, Vec<&CapabilityDescriptor>> {
        let mut grouped: BTreeMap<Category, Vec<&CapabilityDescriptor>> = BTreeMap::new();
        for descriptor in &self.descriptors {
            grouped.entry(descriptor.category).or_default().push(descriptor);
        }
        grouped
    }

    pub fn aliases_of(&self, package_id: &str) -> Vec<&str> {
        self.descriptors
            .iter()
            .filter(|d| d.alias_of.as_deref() == Some(package_id))
            .map(|d| d.short_name.as_str())
            .collect()
    }

    fn find_short_name(&self, key: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors.iter().find(|d| d.short_name == key)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
