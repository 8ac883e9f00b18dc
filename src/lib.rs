pub mod config;
pub mod launch;
pub mod startup;
pub mod utils;

pub use config::AppContext;
pub use launch::{build_command, LaunchCommand, LaunchError, LaunchSpec};
pub use startup::{run_startup_update, StartupOutcome, UpdatePrompt};
