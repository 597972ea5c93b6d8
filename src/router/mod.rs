//! Infers the capability a universal command needs from file extensions and
//! forwards the command to that capability's plugin.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::EngineError;
use crate::plugin::CommandSurface;
use crate::registry::{CapabilityDescriptor, CapabilityRegistry};

pub mod formats;

use self::formats::{domain_for_extension, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionClassification {
    /// Lowercased, without the dot. Empty when the path has none.
    pub extension: String,
    pub domain: Domain,
}

pub fn classify(path: &str) -> ExtensionClassification {
    let extension = Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let domain = if extension.is_empty() {
        Domain::Unknown
    } else {
        domain_for_extension(&extension)
    };
    ExtensionClassification { extension, domain }
}

/// Capability for a file pair: the input's domain wins, the output's is the
/// fallback.
pub fn route<'a>(
    registry: &'a CapabilityRegistry,
    input: &str,
    output: Option<&str>,
) -> Result<&'a CapabilityDescriptor, EngineError> {
    let input_class = classify(input);
    let domain = if input_class.domain.is_known() {
        input_class.domain
    } else {
        output
            .map(|path| classify(path).domain)
            .unwrap_or(Domain::Unknown)
    };

    debug!(
        input,
        output = output.unwrap_or("-"),
        domain = domain.as_str(),
        "routing by extension"
    );
    let Some(capability) = domain.capability() else {
        return Err(EngineError::UnsupportedFormat {
            input: input.to_string(),
            output: output.map(str::to_string),
        });
    };
    registry.describe(capability)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizeMode {
    #[default]
    Balanced,
    Aggressive,
    Lossless,
}

/// A user-level command that is not tied to one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniversalInvocation {
    Convert {
        input: String,
        output: String,
        quality: Option<u8>,
        force: bool,
        verbose: bool,
    },
    Optimize {
        input: String,
        output: Option<String>,
        mode: OptimizeMode,
        verbose: bool,
    },
}

impl UniversalInvocation {
    pub fn input(&self) -> &str {
        match self {
            UniversalInvocation::Convert { input, .. }
            | UniversalInvocation::Optimize { input, .. } => input,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            UniversalInvocation::Convert { output, .. } => Some(output),
            UniversalInvocation::Optimize { output, .. } => output.as_deref(),
        }
    }

    /// Plugin verb for this command. Media plugins call optimizing
    /// time-based and paged media "compress".
    pub fn verb(&self, capability: &str) -> &'static str {
        match self {
            UniversalInvocation::Convert { .. } => "convert",
            UniversalInvocation::Optimize { .. } => match capability {
                "video" | "audio" | "document" => "compress",
                _ => "optimize",
            },
        }
    }

    /// Arguments for the plugin command: verb, paths, then the pass-through flags.
    pub fn plugin_args(&self, capability: &str) -> Vec<String> {
        let mut args = vec![self.verb(capability).to_string()];
        match self {
            UniversalInvocation::Convert {
                input,
                output,
                quality,
                force,
                verbose,
            } => {
                args.push(input.clone());
                args.push(output.clone());
                if let Some(quality) = quality {
                    args.push("--quality".to_string());
                    args.push(quality.to_string());
                }
                if *force {
                    args.push("--force".to_string());
                }
                if *verbose {
                    args.push("--verbose".to_string());
                }
            }
            UniversalInvocation::Optimize {
                input,
                output,
                mode,
                verbose,
            } => {
                args.push(input.clone());
                if let Some(output) = output {
                    args.push("--output".to_string());
                    args.push(output.clone());
                }
                match mode {
                    OptimizeMode::Balanced => {}
                    OptimizeMode::Aggressive => args.push("--aggressive".to_string()),
                    OptimizeMode::Lossless => args.push("--lossless".to_string()),
                }
                if *verbose {
                    args.push("--verbose".to_string());
                }
            }
        }
        args
    }
}

/// Runs the loaded plugin command named after the capability.
///
/// A missing command means the plugin registered something other than what
/// its capability promises; that is reported, never retried.
pub fn dispatch(
    surface: &CommandSurface,
    descriptor: &CapabilityDescriptor,
    invocation: &UniversalInvocation,
) -> Result<()> {
    let command = surface
        .find(&descriptor.short_name)
        .ok_or_else(|| EngineError::DispatchError {
            package_id: descriptor.package_id.clone(),
            command: descriptor.short_name.clone(),
        })?;

    let args = invocation.plugin_args(&descriptor.short_name);
    debug!(
        command = %command.name,
        owner = %command.owner,
        args = %shell_words::join(&args),
        "dispatching universal command"
    );
    command
        .invoke(&args)
        .with_context(|| format!("{} {} failed", descriptor.short_name, args[0]))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::Result;

    use super::*;

    fn convert(input: &str, output: &str) -> UniversalInvocation {
        UniversalInvocation::Convert {
            input: input.to_string(),
            output: output.to_string(),
            quality: None,
            force: false,
            verbose: false,
        }
    }

    #[test]
    fn classifies_by_lowercased_extension() {
        assert_eq!(classify("photo.jpg").domain, Domain::Image);
        assert_eq!(classify("HOLIDAY.MOV").domain, Domain::Video);
        assert_eq!(classify("HOLIDAY.MOV").extension, "mov");
        assert_eq!(classify("dir.v2/track.flac").domain, Domain::Audio);
        assert_eq!(classify("scan.pdf").domain, Domain::Document);
        assert_eq!(classify("mesh.glb").domain, Domain::Model);
    }

    #[test]
    fn unknown_extensions_never_fail() {
        assert_eq!(classify("archive.zip").domain, Domain::Unknown);
        assert_eq!(classify("Makefile").domain, Domain::Unknown);
        assert_eq!(classify("Makefile").extension, "");
        assert_eq!(classify(".jpg").domain, Domain::Unknown);
    }

    #[test]
    fn routes_by_input_then_output() -> Result<()> {
        let registry = CapabilityRegistry::new()?;
        assert_eq!(route(&registry, "a.jpg", Some("b.png"))?.short_name, "image");
        // Input wins even when the output names another domain.
        assert_eq!(route(&registry, "clip.mp4", Some("clip.gif"))?.short_name, "video");
        assert_eq!(route(&registry, "dump.bin", Some("song.mp3"))?.short_name, "audio");
        assert_eq!(route(&registry, "report.docx", None)?.package_id, "@mediadeck/document");
        Ok(())
    }

    #[test]
    fn unroutable_pairs_are_unsupported() -> Result<()> {
        let registry = CapabilityRegistry::new()?;
        let err = route(&registry, "a.unknown", Some("b.unknown")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat { .. }));
        assert!(route(&registry, "file.xyz", None).is_err());
        Ok(())
    }

    #[test]
    fn translates_convert_flags() {
        let invocation = UniversalInvocation::Convert {
            input: "in.png".to_string(),
            output: "out.webp".to_string(),
            quality: Some(80),
            force: true,
            verbose: true,
        };
        assert_eq!(
            invocation.plugin_args("image"),
            vec!["convert", "in.png", "out.webp", "--quality", "80", "--force", "--verbose"]
        );
    }

    #[test]
    fn optimize_verb_depends_on_capability() {
        let invocation = UniversalInvocation::Optimize {
            input: "talk.mp4".to_string(),
            output: Some("talk.small.mp4".to_string()),
            mode: OptimizeMode::Lossless,
            verbose: false,
        };
        assert_eq!(
            invocation.plugin_args("video"),
            vec!["compress", "talk.mp4", "--output", "talk.small.mp4", "--lossless"]
        );
        assert_eq!(invocation.verb("image"), "optimize");
        assert_eq!(invocation.output(), Some("talk.small.mp4"));
    }

    #[test]
    fn dispatch_invokes_the_capability_command() -> Result<()> {
        let registry = CapabilityRegistry::new()?;
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut surface = CommandSurface::new();
        surface.add_command("image", "", move |args| {
            sink.borrow_mut().push(args.to_vec());
            Ok(())
        })?;

        let invocation = convert("a.jpg", "b.png");
        let descriptor = route(&registry, invocation.input(), invocation.output())?;
        dispatch(&surface, descriptor, &invocation)?;
        assert_eq!(*seen.borrow(), vec![vec!["convert", "a.jpg", "b.png"]]);
        Ok(())
    }

    #[test]
    fn missing_command_after_load_is_a_dispatch_error() -> Result<()> {
        let registry = CapabilityRegistry::new()?;
        let surface = CommandSurface::new();
        let descriptor = registry.describe("audio")?;

        let err = dispatch(&surface, descriptor, &convert("a.wav", "b.mp3")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::DispatchError { command, .. }) if command == "audio"
        ));
        Ok(())
    }
}
