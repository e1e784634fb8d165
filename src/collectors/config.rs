use crate::collectors::catalog::{CatalogKind, DatabaseType, QueryVersion};
use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::warn;

/// How the driver authenticates against targets.
#[derive(Clone, Debug, Default)]
pub enum AuthMethod {
    /// Credentials come from the connection string itself.
    #[default]
    ConnectionString,
    /// Pre-acquired Azure AD access token.
    Aad(SecretString),
}

impl AuthMethod {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionString => "connection_string",
            Self::Aad(_) => "aad",
        }
    }
}

/// Resolved collector configuration, built once at start-up and injected.
#[derive(Clone, Debug, Default)]
pub struct CollectorConfig {
    pub database_type: Option<DatabaseType>,
    pub query_version: Option<QueryVersion>,
    pub azuredb: bool,
    pub include_query: Vec<String>,
    pub exclude_query: Vec<String>,
    pub query_timeout: Option<Duration>,
    pub health_metric: bool,
    pub auth: AuthMethod,
}

impl CollectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_database_type(mut self, database_type: Option<DatabaseType>) -> Self {
        self.database_type = database_type;
        self
    }

    #[must_use]
    pub const fn with_query_version(mut self, query_version: Option<QueryVersion>) -> Self {
        self.query_version = query_version;
        self
    }

    #[must_use]
    pub const fn with_azuredb(mut self, azuredb: bool) -> Self {
        self.azuredb = azuredb;
        self
    }

    #[must_use]
    pub fn with_include(mut self, names: &[String]) -> Self {
        self.include_query = clean(names);
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, names: &[String]) -> Self {
        self.exclude_query = clean(names);
        self
    }

    /// A zero duration disables the timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    #[must_use]
    pub const fn with_health_metric(mut self, enabled: bool) -> Self {
        self.health_metric = enabled;
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    /// Pin `SQLServer` when no database type, query version or `azuredb`
    /// flag is set. Applying it twice is a no-op.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.database_type.is_none() && self.query_version.is_none() && !self.azuredb {
            warn!("no database type configured, defaulting to SQLServer");
            self.database_type = Some(DatabaseType::SqlServer);
        }
        self
    }

    /// Database type the targets are treated as, including the `SQLServer`
    /// fallback. Legacy catalogs have none.
    #[must_use]
    pub const fn effective_database_type(&self) -> Option<DatabaseType> {
        match (self.database_type, self.query_version) {
            (Some(database_type), _) => Some(database_type),
            (None, None) if !self.azuredb => Some(DatabaseType::SqlServer),
            _ => None,
        }
    }

    /// Catalog this configuration runs.
    ///
    /// An explicit database type wins. Otherwise a query version (or the
    /// `azuredb` flag alone) selects the legacy catalog, and a configuration
    /// with none of them falls back to `SQLServer`.
    #[must_use]
    pub const fn catalog(&self) -> CatalogKind {
        if let Some(database_type) = self.effective_database_type() {
            return CatalogKind::Database(database_type);
        }

        CatalogKind::Legacy {
            version: match self.query_version {
                Some(version) => version,
                None => QueryVersion::V2,
            },
            azuredb: self.azuredb,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the authentication method cannot be used with the
    /// configured database type.
    pub fn validate(&self) -> Result<()> {
        if let AuthMethod::Aad(token) = &self.auth {
            if token.expose_secret().trim().is_empty() {
                bail!("auth method 'aad' requires an access token (--access-token)");
            }

            if let Some(database_type) = self.effective_database_type()
                && !database_type.is_azure()
            {
                bail!("auth method 'aad' is not supported with database type {database_type}");
            }
        }

        Ok(())
    }
}

fn clean(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
