use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Ctrl+C only raises a flag; the provisioner checks it between steps.
pub fn install_ctrlc_handler() -> Result<()> {
    INTERRUPTED.store(false, Ordering::SeqCst);
    ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: stop waiting for the current step.
            std::process::exit(crate::error::EXIT_INTERRUPTED);
        }
    })
    .context("failed to install Ctrl+C handler")
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
