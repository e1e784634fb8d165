use crate::cli::{actions::Action, telemetry};
use crate::exporter::new;
use anyhow::Result;

/// Handle the run action
///
/// # Errors
///
/// Returns an error if the exporter fails to start
pub async fn handle(action: Action) -> Result<()> {
    let result = match action {
        Action::Run {
            port,
            listen,
            servers,
            config,
        } => new(port, listen, servers, config).await,
    };

    telemetry::shutdown();

    result
}
