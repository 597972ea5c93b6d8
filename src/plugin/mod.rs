//! Plugin contract and the command surface plugins register into.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};

pub mod builtin;
pub mod loader;
pub mod manifest;
pub mod runtime;

/// A plugin package as seen by the engine.
///
/// `register` is called at most once per process; the runtime guarantees it.
pub trait Plugin {
    fn package_id(&self) -> &str;

    fn register(&self, surface: &mut CommandSurface) -> Result<()>;
}

pub type CommandHandler = Box<dyn Fn(&[String]) -> Result<()>>;

pub struct RegisteredCommand {
    pub name: String,
    pub about: String,
    /// Package that registered the command. Empty while staged.
    pub owner: String,
    handler: CommandHandler,
}

impl RegisteredCommand {
    pub fn invoke(&self, args: &[String]) -> Result<()> {
        (self.handler)(args)
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("name", &self.name)
            .field("about", &self.about)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Named subcommands registered by loaded plugins.
#[derive(Debug, Default)]
pub struct CommandSurface {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_command<F>(
        &mut self,
        name: impl Into<String>,
        about: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&[String]) -> Result<()> + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            bail!("command name must not be empty");
        }
        if self.commands.contains_key(&name) {
            bail!("command '{}' registered twice", name);
        }

        self.commands.insert(
            name.clone(),
            RegisteredCommand {
                name,
                about: about.into(),
                owner: String::new(),
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }

    /// Moves every staged command into this surface under `owner`.
    ///
    /// All-or-nothing: on a name clash nothing is moved and the clashing
    /// command's current owner is returned.
    pub(crate) fn absorb(
        &mut self,
        staged: CommandSurface,
        owner: &str,
    ) -> std::result::Result<Vec<String>, (String, String)> {
        if let Some(existing) = staged
            .commands
            .keys()
            .find_map(|name| self.commands.get(name))
        {
            return Err((existing.name.clone(), existing.owner.clone()));
        }

        let mut names = Vec::with_capacity(staged.commands.len());
        for (name, mut command) in staged.commands {
            command.owner = owner.to_string();
            names.push(name.clone());
            self.commands.insert(name, command);
        }
        Ok(names)
    }
}
