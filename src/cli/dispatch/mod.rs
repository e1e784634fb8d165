use crate::{
    cli::actions::Action,
    collectors::{
        catalog::{DatabaseType, QueryVersion},
        config::{AuthMethod, CollectorConfig},
    },
};
use anyhow::{Result, anyhow, bail};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use tracing::info;

/// # Errors
///
/// Returns an error if required arguments are missing or the configuration is invalid
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    // Get the port or return an error
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches
        .get_one::<String>("listen")
        .map(std::string::ToString::to_string);

    let servers: Vec<SecretString> = values(matches, "server")
        .into_iter()
        .map(SecretString::from)
        .collect();

    if servers.is_empty() {
        bail!("At least one server is required. Please provide it using the --server flag.");
    }

    let config = collector_config(matches)?;

    info!(
        servers = servers.len(),
        catalog = %config.catalog(),
        auth = config.auth.name(),
        "configuration loaded"
    );

    Ok(Action::Run {
        port,
        listen,
        servers,
        config,
    })
}

/// Build the collector configuration from CLI/env values.
///
/// # Errors
///
/// Returns an error for an unknown database type, an unsupported query
/// version or an unusable authentication setup.
pub fn collector_config(matches: &ArgMatches) -> Result<CollectorConfig> {
    let database_type = matches
        .get_one::<String>("database-type")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<DatabaseType>())
        .transpose()?;

    let query_version = matches
        .get_one::<String>("query-version")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<QueryVersion>())
        .transpose()?;

    let auth = match matches.get_one::<String>("auth-method").map(String::as_str) {
        None | Some("connection_string") => AuthMethod::ConnectionString,
        Some("aad") => AuthMethod::Aad(SecretString::from(
            matches
                .get_one::<String>("access-token")
                .cloned()
                .unwrap_or_default(),
        )),
        Some(other) => bail!("Unknown auth method '{other}', expected connection_string or aad"),
    };

    let timeout = matches.get_one::<u64>("query-timeout").copied().unwrap_or(0);

    let config = CollectorConfig::new()
        .with_database_type(database_type)
        .with_query_version(query_version)
        .with_azuredb(matches.get_flag("azuredb"))
        .with_include(&values(matches, "include-query"))
        .with_exclude(&values(matches, "exclude-query"))
        .with_query_timeout(Duration::from_secs(timeout))
        .with_health_metric(matches.get_flag("health-metric"))
        .with_auth(auth)
        .with_defaults();

    config.validate()?;

    Ok(config)
}

fn values(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|vals| {
            vals.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
