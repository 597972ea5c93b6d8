//! Drives a requested package from "not installed" to "loaded".
//!
//! ```text
//! NotInstalled -> Installing -> InstalledNotLoaded -> Loading -> Loaded
//!                     |                                  |
//!                     +------------> Failed <------------+
//! ```
//!
//! Installed and loaded are tracked separately: a package installed by an
//! earlier run enters at `InstalledNotLoaded` and is never reinstalled.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::install::ledger::{InstallLedger, LedgerEntry};
use crate::install::SelectInstaller;
use crate::plugin::loader::PluginLoader;
use crate::plugin::runtime::PluginRuntime;
use crate::plugin::Plugin;
use crate::runtime::signal;

const DIAGNOSTICS_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    NotInstalled,
    Installing,
    InstalledNotLoaded,
    Loading,
    Loaded,
    Failed,
}

impl ProvisionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProvisionState::NotInstalled => "not_installed",
            ProvisionState::Installing => "installing",
            ProvisionState::InstalledNotLoaded => "installed_not_loaded",
            ProvisionState::Loading => "loading",
            ProvisionState::Loaded => "loaded",
            ProvisionState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisionState::Loaded | ProvisionState::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningRequest {
    pub requested_capability: String,
    pub resolved_package_id: String,
    history: Vec<ProvisionState>,
}

impl ProvisioningRequest {
    pub fn new(requested_capability: &str, resolved_package_id: &str) -> Self {
        Self {
            requested_capability: requested_capability.to_string(),
            resolved_package_id: resolved_package_id.to_string(),
            history: Vec::new(),
        }
    }

    /// Latest state; `NotInstalled` until provisioning has looked at the package.
    pub fn current_state(&self) -> ProvisionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ProvisionState::NotInstalled)
    }

    /// Every state the request passed through, in order.
    pub fn history(&self) -> &[ProvisionState] {
        &self.history
    }

    pub fn installed_now(&self) -> bool {
        self.history.contains(&ProvisionState::Installing)
            && self.current_state() == ProvisionState::Loaded
    }

    fn enter(&mut self, next: ProvisionState) {
        debug!(
            package_id = %self.resolved_package_id,
            from = self.history.last().map(|s| s.as_str()).unwrap_or("start"),
            to = next.as_str(),
            "provisioning transition"
        );
        self.history.push(next);
    }
}

/// Owns the process's plugin runtime state and provisions packages into it.
pub struct Provisioner {
    runtime: PluginRuntime,
    loader: Box<dyn PluginLoader>,
    select_installer: SelectInstaller,
    ledger: Option<InstallLedger>,
    interrupted: Box<dyn Fn() -> bool>,
}

impl Provisioner {
    pub fn new(loader: Box<dyn PluginLoader>, select_installer: SelectInstaller) -> Self {
        Self {
            runtime: PluginRuntime::new(),
            loader,
            select_installer,
            ledger: None,
            interrupted: Box::new(signal::interrupted),
        }
    }

    pub fn with_ledger(mut self, ledger: InstallLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_interrupt_check(mut self, check: impl Fn() -> bool + 'static) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    pub fn runtime(&self) -> &PluginRuntime {
        &self.runtime
    }

    pub fn is_installed(&self, package_id: &str) -> bool {
        self.loader.is_installed(package_id)
    }

    /// Loads a statically linked plugin; it never goes through the installer.
    pub fn load_builtin(&mut self, plugin: Box<dyn Plugin>) -> Result<(), EngineError> {
        let package_id = plugin.package_id().to_string();
        self.runtime
            .load(&package_id, |surface| plugin.register(surface), true)
            .map(|_| ())
    }

    pub fn ensure(
        &mut self,
        capability: &str,
        package_id: &str,
    ) -> Result<ProvisioningRequest, EngineError> {
        let mut request = ProvisioningRequest::new(capability, package_id);
        self.provision(&mut request)?;
        Ok(request)
    }

    /// Advances `request` to `Loaded`, or to `Failed` returning why.
    pub fn provision(&mut self, request: &mut ProvisioningRequest) -> Result<(), EngineError> {
        let package_id = request.resolved_package_id.clone();

        if self.runtime.is_loaded(&package_id) {
            request.enter(ProvisionState::Loaded);
            return Ok(());
        }

        if self.loader.is_installed(&package_id) {
            request.enter(ProvisionState::InstalledNotLoaded);
        } else {
            request.enter(ProvisionState::NotInstalled);
            self.checkpoint(request)?;
            request.enter(ProvisionState::Installing);
            if let Err(err) = self.install(request) {
                return Err(fail(request, err));
            }
            request.enter(ProvisionState::InstalledNotLoaded);
        }

        self.checkpoint(request)?;
        request.enter(ProvisionState::Loading);
        let loaded = self.loader.load(&package_id).and_then(|plugin| {
            self.runtime
                .load(&package_id, |surface| plugin.register(surface), false)
        });
        if let Err(err) = loaded {
            return Err(fail(request, err));
        }

        request.enter(ProvisionState::Loaded);
        info!(
            capability = %request.requested_capability,
            package_id = %package_id,
            installed = request.installed_now(),
            "capability ready"
        );
        Ok(())
    }

    fn install(&self, request: &ProvisioningRequest) -> Result<(), EngineError> {
        let package_id = request.resolved_package_id.as_str();
        let installer = (self.select_installer)().ok_or_else(|| EngineError::NoPackageManager {
            package_id: package_id.to_string(),
        })?;
        let manual_command = installer.manual_command(package_id);

        let output = installer
            .install(package_id)
            .map_err(|err| EngineError::InstallFailure {
                package_id: package_id.to_string(),
                manager: installer.manager().to_string(),
                diagnostics: format!("{:#}", err),
                manual_command: manual_command.clone(),
            })?;

        if !output.success() {
            return Err(EngineError::InstallFailure {
                package_id: package_id.to_string(),
                manager: installer.manager().to_string(),
                diagnostics: output.output_summary(DIAGNOSTICS_MAX_CHARS),
                manual_command,
            });
        }

        if !self.loader.is_installed(package_id) {
            return Err(EngineError::InstallFailure {
                package_id: package_id.to_string(),
                manager: installer.manager().to_string(),
                diagnostics: format!(
                    "{} exited successfully but the package manifest is still missing",
                    output.command
                ),
                manual_command,
            });
        }

        info!(
            package_id,
            manager = installer.manager(),
            duration_ms = output.duration_ms as u64,
            "package installed"
        );
        self.record_install(request, installer.manager());

        // The package is on disk and recorded; stop before loading it.
        if (self.interrupted)() {
            return Err(EngineError::Interrupted {
                package_id: package_id.to_string(),
            });
        }
        Ok(())
    }

    fn record_install(&self, request: &ProvisioningRequest, manager: &str) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let entry = LedgerEntry {
            package_id: request.resolved_package_id.clone(),
            capability: Some(request.requested_capability.clone()),
            manager: manager.to_string(),
            installed_at: Utc::now(),
        };
        if let Err(err) = ledger.record(entry) {
            warn!(error = %format!("{:#}", err), "failed to update install ledger");
        }
    }

    fn checkpoint(&self, request: &mut ProvisioningRequest) -> Result<(), EngineError> {
        if (self.interrupted)() {
            let err = EngineError::Interrupted {
                package_id: request.resolved_package_id.clone(),
            };
            return Err(fail(request, err));
        }
        Ok(())
    }
}

fn fail(request: &mut ProvisioningRequest, err: EngineError) -> EngineError {
    request.enter(ProvisionState::Failed);
    warn!(
        package_id = %request.resolved_package_id,
        error = %err,
        "provisioning failed"
    );
    err
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by provisioning and engine tests.

    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;
    use std::rc::Rc;

    use anyhow::{anyhow, Result};

    use super::*;
    use crate::install::{CommandOutput, Installer};
    use crate::plugin::CommandSurface;

    /// Shared view of what the fakes did.
    #[derive(Debug, Default)]
    pub struct FakeWorld {
        pub installed: RefCell<BTreeSet<String>>,
        pub installer_calls: Cell<u32>,
        pub selector_calls: Cell<u32>,
        pub loader_calls: Cell<u32>,
        pub register_calls: Cell<u32>,
        pub invocations: RefCell<Vec<Vec<String>>>,
        pub install_exit_code: Cell<i32>,
        pub broken_register: RefCell<BTreeSet<String>>,
        pub skip_commands: RefCell<BTreeSet<String>>,
    }

    impl FakeWorld {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn mark_installed(&self, package_id: &str) {
            self.installed.borrow_mut().insert(package_id.to_string());
        }
    }

    pub struct FakeInstaller {
        world: Rc<FakeWorld>,
    }

    impl Installer for FakeInstaller {
        fn manager(&self) -> &str {
            "fakepm"
        }

        fn install(&self, package_id: &str) -> Result<CommandOutput> {
            let world = &self.world;
            world.installer_calls.set(world.installer_calls.get() + 1);
            let exit_code = world.install_exit_code.get();
            if exit_code == 0 {
                world.mark_installed(package_id);
            }
            Ok(CommandOutput {
                command: self.manual_command(package_id),
                exit_code,
                stdout: String::new(),
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    format!("404 Not Found - {}", package_id)
                },
                duration_ms: 1,
            })
        }

        fn manual_command(&self, package_id: &str) -> String {
            format!("fakepm add {}", package_id)
        }
    }

    pub struct FakeLoader {
        world: Rc<FakeWorld>,
    }

    impl FakeLoader {
        pub fn for_world(world: &Rc<FakeWorld>) -> Self {
            Self {
                world: Rc::clone(world),
            }
        }
    }

    impl PluginLoader for FakeLoader {
        fn is_installed(&self, package_id: &str) -> bool {
            self.world.installed.borrow().contains(package_id)
        }

        fn load(&self, package_id: &str) -> Result<Box<dyn Plugin>, EngineError> {
            let world = &self.world;
            world.loader_calls.set(world.loader_calls.get() + 1);
            Ok(Box::new(FakePlugin {
                package_id: package_id.to_string(),
                world: Rc::clone(world),
            }))
        }
    }

    /// Registers one command named after the last segment of its package id.
    pub struct FakePlugin {
        package_id: String,
        world: Rc<FakeWorld>,
    }

    impl Plugin for FakePlugin {
        fn package_id(&self) -> &str {
            &self.package_id
        }

        fn register(&self, surface: &mut CommandSurface) -> Result<()> {
            let world = &self.world;
            world.register_calls.set(world.register_calls.get() + 1);
            if world.broken_register.borrow().contains(&self.package_id) {
                return Err(anyhow!("register is not a function"));
            }
            if world.skip_commands.borrow().contains(&self.package_id) {
                return Ok(());
            }

            let name = self
                .package_id
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            let sink = Rc::clone(world);
            surface.add_command(name, "fake plugin command", move |args| {
                sink.invocations.borrow_mut().push(args.to_vec());
                Ok(())
            })
        }
    }

    pub fn provisioner(world: &Rc<FakeWorld>) -> Provisioner {
        let selector_world = Rc::clone(world);
        Provisioner::new(
            Box::new(FakeLoader::for_world(world)),
            Box::new(move || {
                let world = &selector_world;
                world.selector_calls.set(world.selector_calls.get() + 1);
                Some(Box::new(FakeInstaller {
                    world: Rc::clone(world),
                }) as Box<dyn Installer>)
            }),
        )
        .with_interrupt_check(|| false)
    }
}
