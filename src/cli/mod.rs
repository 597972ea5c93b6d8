mod args;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::cli::args::{Cli, Command};
use crate::config::{AppConfig, Scope};
use crate::engine::Engine;
use crate::error::{exit_code_for, EngineError};
use crate::install::ledger::InstallLedger;
use crate::install::{probe_version, system_installer};
use crate::plugin::builtin::builtin_plugins;
use crate::plugin::loader::PackageLoader;
use crate::plugin::manifest::scan_installed;
use crate::provision::Provisioner;
use crate::registry::CapabilityRegistry;
use crate::router::{self, UniversalInvocation};
use crate::runtime::signal::{install_ctrlc_handler, interrupted};

/// Parses the command line, runs it, and returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_failure(&err, verbose);
            exit_code_for(&err)
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let workdir = std::env::current_dir().context("failed to resolve current directory")?;
    let config = AppConfig::load(&workdir)?;
    init_tracing(cli.verbose, &config.logging.level)?;
    install_ctrlc_handler()?;

    match cli.command {
        Command::Add(args) => {
            let scope = args.scope().unwrap_or(config.plugins.scope);
            let mut engine = build_engine(&config, &workdir, scope)?;
            add_capability(&mut engine, &config, &workdir, &args.capability, scope)
        }
        Command::Convert(args) => {
            let mut engine = build_engine(&config, &workdir, config.plugins.scope)?;
            run_universal(&mut engine, args.into_invocation(cli.verbose))
        }
        Command::Optimize(args) => {
            let mut engine = build_engine(&config, &workdir, config.plugins.scope)?;
            run_universal(&mut engine, args.into_invocation(cli.verbose))
        }
        Command::Plugins => {
            let engine = build_engine(&config, &workdir, config.plugins.scope)?;
            print_plugin_list(&engine, &config, &workdir)
        }
        Command::Doctor => run_doctor(&config, &workdir),
        Command::External(tokens) => {
            let (name, rest) = tokens
                .split_first()
                .context("usage: mediadeck <capability> [args...]")?;
            let mut engine = build_engine(&config, &workdir, config.plugins.scope)?;
            engine.run_command(name, rest)
        }
    }
}

fn build_engine(config: &AppConfig, workdir: &Path, scope: Scope) -> Result<Engine> {
    let registry = CapabilityRegistry::with_prefix(&config.plugins.package_prefix)?;
    let install_root = config.plugins.root_for(scope, workdir)?;
    let loader = PackageLoader::new(config.plugins.search_roots(workdir)?);
    let managers = config.plugins.package_managers()?;

    let mut provisioner = Provisioner::new(
        Box::new(loader),
        system_installer(managers, install_root.clone()),
    )
    .with_ledger(InstallLedger::new(&install_root))
    .with_interrupt_check(interrupted);
    for plugin in builtin_plugins(registry.prefix()) {
        provisioner.load_builtin(plugin)?;
    }

    info!(
        scope = scope.as_str(),
        install_root = %install_root.display(),
        "engine ready"
    );
    Ok(Engine::new(registry, provisioner))
}

fn add_capability(
    engine: &mut Engine,
    config: &AppConfig,
    workdir: &Path,
    capability: &str,
    scope: Scope,
) -> Result<()> {
    let package_id = engine.registry().resolve(capability)?;
    if !engine.provisioner().is_installed(&package_id) {
        let root = config.plugins.root_for(scope, workdir)?;
        ui::print_step(&format!(
            "installing {} into {} ({})",
            package_id,
            root.display(),
            scope.as_str()
        ));
    }

    let request = engine.add(capability)?;
    if request.installed_now() {
        ui::print_success(&format!("installed and loaded {}", package_id));
    } else {
        ui::print_success(&format!("{} is already installed; loaded", package_id));
    }

    if let Some(descriptor) = engine.registry().canonical(&package_id) {
        if !descriptor.system_requirements.is_empty() {
            ui::print_hint(&format!(
                "{} also needs on PATH: {}",
                descriptor.short_name,
                descriptor.system_requirements.join(", ")
            ));
        }
    }
    Ok(())
}

fn run_universal(engine: &mut Engine, invocation: UniversalInvocation) -> Result<()> {
    if let Ok(descriptor) = router::route(engine.registry(), invocation.input(), invocation.output())
    {
        let provisioner = engine.provisioner();
        if !provisioner.runtime().is_loaded(&descriptor.package_id)
            && !provisioner.is_installed(&descriptor.package_id)
        {
            ui::print_step(&format!(
                "{} support is not installed yet, installing {}",
                descriptor.short_name, descriptor.package_id
            ));
        }
    }
    engine.run_universal(&invocation)
}

fn print_plugin_list(engine: &Engine, config: &AppConfig, workdir: &Path) -> Result<()> {
    let registry = engine.registry();
    let provisioner = engine.provisioner();

    for (category, descriptors) in registry.list_by_category() {
        println!("{}", ui::heading(category.as_str()));
        for descriptor in descriptors.into_iter().filter(|d| !d.is_alias()) {
            let package_id = &descriptor.package_id;
            let aliases = registry.aliases_of(package_id);
            let mut line = format!("  {:<10} {:<22}", descriptor.short_name, package_id);
            if !aliases.is_empty() {
                line.push_str(&format!(" aliases={}", aliases.join(",")));
            }
            if !descriptor.system_requirements.is_empty() {
                line.push_str(&format!(
                    " requires={}",
                    descriptor.system_requirements.join(",")
                ));
            }
            println!(
                "{} {}{}",
                line,
                ui::marker(provisioner.is_installed(package_id), "installed"),
                ui::marker(provisioner.runtime().is_loaded(package_id), "loaded")
            );
        }
    }

    println!("{}", ui::heading("built-in"));
    for record in provisioner.runtime().loaded().filter(|r| r.is_built_in) {
        println!("  {:<22} commands={}", record.package_id, record.commands.join(","));
    }

    let mut others = Vec::new();
    for root in config.plugins.search_roots(workdir)? {
        for manifest in scan_installed(&root, registry.prefix())? {
            if registry.canonical(&manifest.name).is_none() {
                others.push((manifest, root.clone()));
            }
        }
    }
    if !others.is_empty() {
        println!("{}", ui::heading("other installed"));
        for (manifest, root) in others {
            println!(
                "  {:<22} {} ({})",
                manifest.name,
                manifest.version.as_deref().unwrap_or("-"),
                root.display()
            );
        }
    }
    Ok(())
}

fn run_doctor(config: &AppConfig, workdir: &Path) -> Result<()> {
    println!("mediadeck doctor");
    println!("- cwd: {}", workdir.display());
    let config_path = AppConfig::path(workdir);
    println!(
        "- config: {} (exists: {})",
        config_path.display(),
        config_path.exists()
    );
    println!("- default scope: {}", config.plugins.scope.as_str());
    println!("- package prefix: {}", config.plugins.package_prefix);

    let roots: [(&str, PathBuf); 2] = [
        ("local", config.plugins.local_root(workdir)),
        ("global", config.plugins.global_root()?),
    ];
    for (label, root) in &roots {
        let ledger = InstallLedger::new(root);
        println!(
            "- {} root: {} (exists: {}, recorded installs: {})",
            label,
            root.display(),
            root.exists(),
            ledger.entries()?.len()
        );
    }

    let mut selected = None;
    for manager in config.plugins.package_managers()? {
        match probe_version(manager) {
            Some(version) => {
                println!("- {}: available ({})", manager.command(), version);
                selected.get_or_insert(manager);
            }
            None => println!("- {}: not found", manager.command()),
        }
    }
    match selected {
        Some(manager) => println!("- installs will use: {}", manager.command()),
        None => ui::print_warn("no package manager found; plugins cannot be installed"),
    }

    info!("doctor completed");
    Ok(())
}

fn report_failure(err: &anyhow::Error, verbose: bool) {
    ui::print_error(&format!("{:#}", err));
    let Some(engine_err) = err.downcast_ref::<EngineError>() else {
        return;
    };
    if let Some(hint) = engine_err.hint() {
        ui::print_hint(&hint);
    }
    if verbose {
        if let Some(diagnostics) = engine_err.diagnostics() {
            ui::print_diagnostics(diagnostics);
        }
    }
}

fn init_tracing(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        "mediadeck=debug".to_string()
    } else {
        format!("mediadeck={}", level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize logger: {}", err))
}
