use thiserror::Error;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_UNKNOWN_CAPABILITY: i32 = 2;
pub const EXIT_UNSUPPORTED_FORMAT: i32 = 3;
pub const EXIT_INSTALL_FAILURE: i32 = 4;
pub const EXIT_PLUGIN_CONTRACT: i32 = 5;
pub const EXIT_DISPATCH: i32 = 6;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Failures the provisioning and routing engine reports to the user.
///
/// None of these are retried: install and load problems are assumed to persist
/// for the rest of the invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown capability '{name}'")]
    UnknownCapability { name: String },

    #[error("unsupported format: no capability handles {}", describe_paths(.input, .output))]
    UnsupportedFormat {
        input: String,
        output: Option<String>,
    },

    #[error("plugin {package_id} violated the plugin contract: {reason}")]
    PluginContractViolation {
        package_id: String,
        reason: String,
        diagnostics: Option<String>,
    },

    #[error("failed to install {package_id} with {manager}")]
    InstallFailure {
        package_id: String,
        manager: String,
        diagnostics: String,
        manual_command: String,
    },

    #[error("no package manager available to install {package_id}")]
    NoPackageManager { package_id: String },

    #[error("plugin {package_id} loaded but did not register the '{command}' command")]
    DispatchError { package_id: String, command: String },

    #[error("interrupted while provisioning {package_id}")]
    Interrupted { package_id: String },
}

impl EngineError {
    pub fn unknown_capability(name: impl Into<String>) -> Self {
        Self::UnknownCapability { name: name.into() }
    }

    pub fn contract(package_id: &str, reason: impl Into<String>) -> Self {
        Self::PluginContractViolation {
            package_id: package_id.to_string(),
            reason: reason.into(),
            diagnostics: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::UnknownCapability { .. } => EXIT_UNKNOWN_CAPABILITY,
            EngineError::UnsupportedFormat { .. } => EXIT_UNSUPPORTED_FORMAT,
            EngineError::InstallFailure { .. } | EngineError::NoPackageManager { .. } => {
                EXIT_INSTALL_FAILURE
            }
            EngineError::PluginContractViolation { .. } => EXIT_PLUGIN_CONTRACT,
            EngineError::DispatchError { .. } => EXIT_DISPATCH,
            EngineError::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }

    /// Manual remedy printed under the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            EngineError::UnknownCapability { .. } => {
                Some("run `mediadeck plugins` to list available capabilities".to_string())
            }
            EngineError::UnsupportedFormat { .. } => {
                Some("run `mediadeck formats` to list recognized extensions".to_string())
            }
            EngineError::InstallFailure { manual_command, .. } => {
                Some(format!("try manually: {}", manual_command))
            }
            EngineError::NoPackageManager { package_id, .. } => Some(format!(
                "install bun, pnpm, yarn or npm, then try: mediadeck add {}",
                package_id
            )),
            EngineError::PluginContractViolation { package_id, .. }
            | EngineError::DispatchError { package_id, .. } => {
                Some(format!("try: mediadeck add {}", package_id))
            }
            EngineError::Interrupted { .. } => None,
        }
    }

    /// Raw installer or loader output, shown only in verbose mode.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            EngineError::InstallFailure { diagnostics, .. } => Some(diagnostics.as_str()),
            EngineError::PluginContractViolation { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }
}

fn describe_paths(input: &str, output: &Option<String>) -> String {
    match output {
        Some(output) => format!("'{}' or '{}'", input, output),
        None => format!("'{}'", input),
    }
}

/// Exit code for any error bubbling out of the CLI.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<EngineError>()
        .map(EngineError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn unsupported_format_message_names_both_paths() {
        let err = EngineError::UnsupportedFormat {
            input: "a.xyz".to_string(),
            output: Some("b.abc".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unsupported format: no capability handles 'a.xyz' or 'b.abc'"
        );
        assert_eq!(err.exit_code(), EXIT_UNSUPPORTED_FORMAT);
    }

    #[test]
    fn install_failure_hint_carries_manual_command() {
        let err = EngineError::InstallFailure {
            package_id: "@mediadeck/video".to_string(),
            manager: "npm".to_string(),
            diagnostics: "E404".to_string(),
            manual_command: "npm install @mediadeck/video".to_string(),
        };
        assert_eq!(
            err.hint().as_deref(),
            Some("try manually: npm install @mediadeck/video")
        );
        assert_eq!(err.diagnostics(), Some("E404"));
    }

    #[test]
    fn exit_code_falls_back_for_untyped_errors() {
        let typed = anyhow::Error::new(EngineError::unknown_capability("bogus"));
        assert_eq!(exit_code_for(&typed), EXIT_UNKNOWN_CAPABILITY);

        let contextual = anyhow::Error::new(EngineError::DispatchError {
            package_id: "@mediadeck/image".to_string(),
            command: "image".to_string(),
        })
        .context("convert failed");
        assert_eq!(exit_code_for(&contextual), EXIT_DISPATCH);

        assert_eq!(exit_code_for(&anyhow!("plugin exited 1")), EXIT_FAILURE);
    }
}
