//! classify → route → ensure → dispatch, strictly in that order, one
//! invocation at a time.

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::EngineError;
use crate::provision::{ProvisioningRequest, Provisioner};
use crate::registry::CapabilityRegistry;
use crate::router::{self, UniversalInvocation};

pub struct Engine {
    registry: CapabilityRegistry,
    provisioner: Provisioner,
}

impl Engine {
    pub fn new(registry: CapabilityRegistry, provisioner: Provisioner) -> Self {
        Self {
            registry,
            provisioner,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Installs (if needed) and loads the package behind `capability`.
    pub fn add(&mut self, capability: &str) -> Result<ProvisioningRequest, EngineError> {
        let package_id = self.registry.resolve(capability)?;
        self.provisioner.ensure(capability.trim(), &package_id)
    }

    pub fn run_universal(&mut self, invocation: &UniversalInvocation) -> Result<()> {
        let descriptor =
            router::route(&self.registry, invocation.input(), invocation.output())?.clone();
        let request = self
            .provisioner
            .ensure(&descriptor.short_name, &descriptor.package_id)?;
        debug!(
            package_id = %descriptor.package_id,
            states = ?request.history(),
            "capability provisioned for universal command"
        );
        router::dispatch(self.provisioner.runtime().surface(), &descriptor, invocation)
    }

    /// Runs `name` from the command surface, provisioning the capability of
    /// the same name first when nothing has registered it yet.
    pub fn run_command(&mut self, name: &str, args: &[String]) -> Result<()> {
        if let Some(command) = self.provisioner.runtime().surface().find(name) {
            return command
                .invoke(args)
                .with_context(|| format!("{} failed", name));
        }

        let descriptor = self.registry.describe(name)?.clone();
        self.provisioner.ensure(name, &descriptor.package_id)?;
        let command = self
            .provisioner
            .runtime()
            .surface()
            .find(&descriptor.short_name)
            .ok_or_else(|| EngineError::DispatchError {
                package_id: descriptor.package_id.clone(),
                command: descriptor.short_name.clone(),
            })?;
        command
            .invoke(args)
            .with_context(|| format!("{} failed", descriptor.short_name))
    }
}
