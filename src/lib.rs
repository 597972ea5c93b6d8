pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod install;
pub mod plugin;
pub mod provision;
pub mod registry;
pub mod router;
pub mod runtime;
