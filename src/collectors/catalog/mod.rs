//! Named query catalogs.
//!
//! Every deployment flavour has its own fixed, ordered list of queries. Bodies
//! live under `queries/<catalog>/<Name>.sql` and are embedded at compile time;
//! this module only knows names, bodies and the result shape of each query.

use anyhow::{Result, anyhow};
use std::fmt;
use std::str::FromStr;

/// One named diagnostic query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefinition {
    pub name: &'static str,
    pub body: &'static str,
    /// One row is one `value` series instead of one wide metric.
    pub result_by_row: bool,
}

/// SQL Server deployment flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    SqlServer,
    AzureSqlDb,
    AzureSqlManagedInstance,
    AzureSqlPool,
    AzureArcSqlManagedInstance,
}

impl DatabaseType {
    pub const ALL: [Self; 5] = [
        Self::SqlServer,
        Self::AzureSqlDb,
        Self::AzureSqlManagedInstance,
        Self::AzureSqlPool,
        Self::AzureArcSqlManagedInstance,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SqlServer => "SQLServer",
            Self::AzureSqlDb => "AzureSQLDB",
            Self::AzureSqlManagedInstance => "AzureSQLManagedInstance",
            Self::AzureSqlPool => "AzureSQLPool",
            Self::AzureArcSqlManagedInstance => "AzureArcSQLManagedInstance",
        }
    }

    /// Azure flavours accept token based authentication.
    #[must_use]
    pub const fn is_azure(self) -> bool {
        !matches!(self, Self::SqlServer)
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow!(
                    "unknown database type '{s}', expected one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                )
            })
    }
}

/// Generation of the legacy on-premises catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryVersion {
    V1,
    V2,
}

impl FromStr for QueryVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            other => Err(anyhow!("unsupported query version '{other}', expected 1 or 2")),
        }
    }
}

impl fmt::Display for QueryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("1"),
            Self::V2 => f.write_str("2"),
        }
    }
}

/// Which catalog a configuration resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Database(DatabaseType),
    /// Version-selected catalog, optionally extended with Azure DB resource queries.
    Legacy { version: QueryVersion, azuredb: bool },
}

impl CatalogKind {
    /// Ordered query definitions of this catalog.
    #[must_use]
    pub fn queries(self) -> Vec<QueryDefinition> {
        match self {
            Self::Database(DatabaseType::SqlServer) => SQL_SERVER.to_vec(),
            Self::Database(DatabaseType::AzureSqlDb) => AZURE_SQL_DB.to_vec(),
            Self::Database(DatabaseType::AzureSqlManagedInstance) => {
                AZURE_SQL_MANAGED_INSTANCE.to_vec()
            }
            Self::Database(DatabaseType::AzureSqlPool) => AZURE_SQL_POOL.to_vec(),
            Self::Database(DatabaseType::AzureArcSqlManagedInstance) => {
                AZURE_ARC_SQL_MANAGED_INSTANCE.to_vec()
            }
            Self::Legacy { version, azuredb } => {
                let mut queries = if azuredb {
                    LEGACY_AZURE.to_vec()
                } else {
                    Vec::new()
                };

                queries.extend_from_slice(match version {
                    QueryVersion::V1 => LEGACY_V1,
                    QueryVersion::V2 => LEGACY_V2,
                });

                queries
            }
        }
    }

    #[must_use]
    pub fn lookup(self, name: &str) -> Option<QueryDefinition> {
        self.queries().into_iter().find(|q| q.name == name)
    }

    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        self.queries().iter().map(|q| q.name).collect()
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(t) => write!(f, "{t}"),
            Self::Legacy { version, azuredb } => {
                write!(f, "legacy v{version}")?;
                if *azuredb {
                    f.write_str(" + azuredb")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! catalog {
    ($dir:literal => [$(($name:literal, $by_row:literal)),* $(,)?]) => {
        &[
            $(
                QueryDefinition {
                    name: $name,
                    body: include_str!(concat!(
                        env!("CARGO_MANIFEST_DIR"),
                        "/queries/",
                        $dir,
                        "/",
                        $name,
                        ".sql"
                    )),
                    result_by_row: $by_row,
                },
            )*
        ]
    };
}

static SQL_SERVER: &[QueryDefinition] = catalog!("sqlserver" => [
    ("SQLServerPerformanceCounters", false),
    ("SQLServerWaitStatsCategorized", false),
    ("SQLServerDatabaseIO", false),
    ("SQLServerProperties", false),
    ("SQLServerMemoryClerks", false),
    ("SQLServerSchedulers", false),
    ("SQLServerRequests", false),
    ("SQLServerVolumeSpace", false),
    ("SQLServerCpu", false),
    ("SQLServerAvailabilityReplicaStates", false),
    ("SQLServerDatabaseReplicaStates", false),
    ("SQLServerRecentBackups", false),
]);

static AZURE_SQL_DB: &[QueryDefinition] = catalog!("azure_sql_db" => [
    ("AzureSQLDBResourceStats", false),
    ("AzureSQLDBResourceGovernance", false),
    ("AzureSQLDBWaitStats", false),
    ("AzureSQLDBDatabaseIO", false),
    ("AzureSQLDBServerProperties", false),
    ("AzureSQLDBOsWaitstats", false),
    ("AzureSQLDBMemoryClerks", false),
    ("AzureSQLDBPerformanceCounters", false),
    ("AzureSQLDBRequests", false),
    ("AzureSQLDBSchedulers", false),
]);

static AZURE_SQL_MANAGED_INSTANCE: &[QueryDefinition] = catalog!("azure_sql_managed_instance" => [
    ("AzureSQLMIResourceStats", false),
    ("AzureSQLMIResourceGovernance", false),
    ("AzureSQLMIDatabaseIO", false),
    ("AzureSQLMIServerProperties", false),
    ("AzureSQLMIOsWaitstats", false),
    ("AzureSQLMIMemoryClerks", false),
    ("AzureSQLMIPerformanceCounters", false),
    ("AzureSQLMIRequests", false),
    ("AzureSQLMISchedulers", false),
]);

static AZURE_SQL_POOL: &[QueryDefinition] = catalog!("azure_sql_pool" => [
    ("AzureSQLPoolResourceStats", false),
    ("AzureSQLPoolResourceGovernance", false),
    ("AzureSQLPoolDatabaseIO", false),
    ("AzureSQLPoolOsWaitStats", false),
    ("AzureSQLPoolMemoryClerks", false),
    ("AzureSQLPoolPerformanceCounters", false),
    ("AzureSQLPoolSchedulers", false),
]);

static AZURE_ARC_SQL_MANAGED_INSTANCE: &[QueryDefinition] = catalog!("azure_arc_sql_managed_instance" => [
    ("AzureArcSQLMIDatabaseIO", false),
    ("AzureArcSQLMIServerProperties", false),
    ("AzureArcSQLMIOsWaitstats", false),
    ("AzureArcSQLMIMemoryClerks", false),
    ("AzureArcSQLMIPerformanceCounters", false),
    ("AzureArcSQLMIRequests", false),
    ("AzureArcSQLMISchedulers", false),
]);

static LEGACY_V1: &[QueryDefinition] = catalog!("legacy_v1" => [
    ("PerformanceCounters", true),
    ("WaitStatsCategorized", false),
    ("CPUHistory", false),
    ("DatabaseIO", false),
    ("DatabaseSize", false),
    ("DatabaseStats", false),
    ("DatabaseProperties", false),
    ("MemoryClerk", false),
    ("VolumeSpace", false),
    ("PerformanceMetrics", false),
]);

static LEGACY_V2: &[QueryDefinition] = catalog!("legacy_v2" => [
    ("PerformanceCounters", true),
    ("WaitStatsCategorized", false),
    ("DatabaseIO", false),
    ("ServerProperties", false),
    ("MemoryClerk", false),
    ("Schedulers", false),
    ("SqlRequests", false),
    ("VolumeSpace", false),
    ("Cpu", false),
]);

static LEGACY_AZURE: &[QueryDefinition] = catalog!("legacy_azure" => [
    ("AzureDBResourceStats", false),
    ("AzureDBResourceGovernance", false),
]);
