use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

/// Parse the command line, set up logging and tracing, and resolve the action to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be initialized or the arguments are invalid
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_count("verbose");

    telemetry::init(verbosity)?;

    handler(&matches)
}
