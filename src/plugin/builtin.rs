use anyhow::{bail, Result};

use crate::plugin::{CommandSurface, Plugin};
use crate::router::formats::DOMAIN_EXTENSIONS;

/// Statically linked plugin loaded into every process.
#[derive(Debug, Clone)]
pub struct CorePlugin {
    package_id: String,
}

impl CorePlugin {
    pub fn new(prefix: &str) -> Self {
        Self {
            package_id: format!("{}/core", prefix),
        }
    }
}

impl Plugin for CorePlugin {
    fn package_id(&self) -> &str {
        &self.package_id
    }

    fn register(&self, surface: &mut CommandSurface) -> Result<()> {
        surface.add_command(
            "formats",
            "List file extensions recognized by convert and optimize",
            |args| {
                if !args.is_empty() {
                    bail!("formats takes no arguments");
                }
                print!("{}", formats_table());
                Ok(())
            },
        )
    }
}

pub fn builtin_plugins(prefix: &str) -> Vec<Box<dyn Plugin>> {
    vec![Box::new(CorePlugin::new(prefix))]
}

fn formats_table() -> String {
    let mut text = String::new();
    for (domain, extensions) in DOMAIN_EXTENSIONS {
        text.push_str(&format!("{:<9} {}\n", domain.as_str(), extensions.join(" ")));
    }
    text
}
