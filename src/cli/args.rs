use clap::{Args, Parser, Subcommand};

use crate::config::Scope;
use crate::router::{OptimizeMode, UniversalInvocation};

#[derive(Debug, Parser)]
#[command(name = "mediadeck")]
#[command(about = "Media toolkit that installs capability plugins on demand")]
pub struct Cli {
    /// Enable verbose logs and installer diagnostics
    #[arg(global = true, long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install and load a capability plugin
    Add(AddArgs),
    /// Convert a file, picking the plugin from the file extensions
    Convert(ConvertArgs),
    /// Optimize a file in place or into --output
    Optimize(OptimizeArgs),
    /// List capabilities and whether they are installed or loaded
    #[command(visible_alias = "list")]
    Plugins,
    /// Inspect package managers and plugin roots
    Doctor,
    /// Run a plugin command: mediadeck <capability> [args...]
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Capability short name or package id
    pub capability: String,
    /// Install into the user-wide plugin root
    #[arg(long, conflicts_with = "local")]
    pub global: bool,
    /// Install into ./.mediadeck/plugins
    #[arg(long)]
    pub local: bool,
}

impl AddArgs {
    pub fn scope(&self) -> Option<Scope> {
        match (self.global, self.local) {
            (true, _) => Some(Scope::Global),
            (_, true) => Some(Scope::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    pub input: String,
    pub output: String,
    /// Output quality, 1-100
    #[arg(long, short = 'q', value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,
    /// Overwrite the output file
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct OptimizeArgs {
    pub file: String,
    /// Write the optimized file here instead of in place
    #[arg(long, short = 'o')]
    pub output: Option<String>,
    /// Smaller output, visible quality loss allowed
    #[arg(long, conflicts_with = "lossless")]
    pub aggressive: bool,
    /// Never drop quality
    #[arg(long)]
    pub lossless: bool,
}

impl ConvertArgs {
    pub fn into_invocation(self, verbose: bool) -> UniversalInvocation {
        UniversalInvocation::Convert {
            input: self.input,
            output: self.output,
            quality: self.quality,
            force: self.force,
            verbose,
        }
    }
}

impl OptimizeArgs {
    pub fn into_invocation(self, verbose: bool) -> UniversalInvocation {
        let mode = if self.aggressive {
            OptimizeMode::Aggressive
        } else if self.lossless {
            OptimizeMode::Lossless
        } else {
            OptimizeMode::Balanced
        };
        UniversalInvocation::Optimize {
            input: self.file,
            output: self.output,
            mode,
            verbose,
        }
    }
}
