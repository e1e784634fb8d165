use crate::collectors::{
    catalog::DatabaseType,
    row::{Metric, Value},
    sink::MetricSink,
    target::Target,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub const HEALTH_MEASUREMENT: &str = "mssql_exporter_health";

/// Query outcome counts for one target during one gather cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHealth {
    pub sql_instance: String,
    pub database_name: String,
    pub attempted: u64,
    pub successful: u64,
}

impl TargetHealth {
    /// A target is healthy unless every attempted query failed.
    #[must_use]
    pub const fn is_up(&self) -> bool {
        self.attempted == 0 || self.successful > 0
    }
}

/// Counts attempted and successful queries per target, shared by every unit
/// of a gather cycle.
#[derive(Debug)]
pub struct HealthTracker {
    targets: Mutex<Vec<TargetHealth>>,
}

impl HealthTracker {
    #[must_use]
    pub fn new(targets: &[Target]) -> Self {
        Self {
            targets: Mutex::new(
                targets
                    .iter()
                    .map(|t| TargetHealth {
                        sql_instance: t.sql_instance.clone(),
                        database_name: t.database_name.clone(),
                        attempted: 0,
                        successful: 0,
                    })
                    .collect(),
            ),
        }
    }

    /// Record the outcome of one query against the target at `index`.
    pub fn record(&self, index: usize, success: bool) {
        if let Some(entry) = self.lock().get_mut(index) {
            entry.attempted += 1;
            if success {
                entry.successful += 1;
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TargetHealth> {
        self.lock().clone()
    }

    /// Push one `mssql_exporter_health` metric per target.
    pub fn emit(&self, sink: &dyn MetricSink, database_type: Option<DatabaseType>) {
        let timestamp = Utc::now();
        let database_type = database_type.map_or("", DatabaseType::as_str);

        for entry in self.snapshot() {
            let tags = BTreeMap::from([
                ("sql_instance".to_string(), entry.sql_instance),
                ("database_name".to_string(), entry.database_name),
            ]);

            let fields = BTreeMap::from([
                ("attempted_queries".to_string(), Value::Int(saturating_i64(entry.attempted))),
                ("successful_queries".to_string(), Value::Int(saturating_i64(entry.successful))),
                ("database_type".to_string(), Value::String(database_type.to_string())),
            ]);

            sink.add_metric(Metric {
                measurement: HEALTH_MEASUREMENT.to_string(),
                tags,
                fields,
                timestamp,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TargetHealth>> {
        match self.targets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("HealthTracker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
