use anyhow::Result;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

/// Exporter self-monitoring: per-query timings and outcomes.
#[derive(Clone)]
pub struct ScraperCollector {
    query_duration_seconds: HistogramVec,
    query_errors_total: CounterVec,
    query_last_success: GaugeVec,

    metrics_total: IntGauge,
    scrapes_total: IntCounter,
}

impl Default for ScraperCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScraperCollector {
    /// # Panics
    ///
    /// Panics if metric creation fails.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let query_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mssql_exporter_query_duration_seconds",
                "Time spent running each query in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["query"],
        )
        .expect("mssql_exporter_query_duration_seconds");

        let query_errors_total = CounterVec::new(
            Opts::new(
                "mssql_exporter_query_errors_total",
                "Total number of failed queries per target",
            ),
            &["sql_instance", "query"],
        )
        .expect("mssql_exporter_query_errors_total");

        let query_last_success = GaugeVec::new(
            Opts::new(
                "mssql_exporter_query_last_success",
                "Whether the last run of a query was successful (1=success, 0=failure)",
            ),
            &["sql_instance", "query"],
        )
        .expect("mssql_exporter_query_last_success");

        let metrics_total = IntGauge::with_opts(Opts::new(
            "mssql_exporter_metrics_total",
            "Number of metrics produced by the last scrape (for cardinality monitoring)",
        ))
        .expect("mssql_exporter_metrics_total");

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "mssql_exporter_scrapes_total",
            "Total number of scrapes performed since start",
        ))
        .expect("mssql_exporter_scrapes_total");

        Self {
            query_duration_seconds,
            query_errors_total,
            query_last_success,
            metrics_total,
            scrapes_total,
        }
    }

    /// Start timing `query` against `sql_instance`. The outcome is recorded when
    /// the timer is finished, or as a failure if it is dropped unfinished.
    #[must_use]
    pub fn start_query(&self, sql_instance: &str, query: &str) -> ScrapeTimer {
        ScrapeTimer {
            sql_instance: sql_instance.to_string(),
            query: query.to_string(),
            start: Instant::now(),
            scraper: Some(self.clone()),
        }
    }

    pub fn update_metrics_count(&self, count: usize) {
        self.metrics_total.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn increment_scrapes(&self) {
        self.scrapes_total.inc();
    }

    fn record_success(&self, sql_instance: &str, query: &str, duration: f64) {
        self.query_duration_seconds
            .with_label_values(&[query])
            .observe(duration);

        self.query_last_success
            .with_label_values(&[sql_instance, query])
            .set(1.0);
    }

    fn record_error(&self, sql_instance: &str, query: &str, duration: f64) {
        self.query_duration_seconds
            .with_label_values(&[query])
            .observe(duration);

        self.query_errors_total
            .with_label_values(&[sql_instance, query])
            .inc();

        self.query_last_success
            .with_label_values(&[sql_instance, query])
            .set(0.0);
    }

    /// # Errors
    ///
    /// Returns an error if metric registration fails.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.query_duration_seconds.clone()))?;
        registry.register(Box::new(self.query_errors_total.clone()))?;
        registry.register(Box::new(self.query_last_success.clone()))?;
        registry.register(Box::new(self.metrics_total.clone()))?;
        registry.register(Box::new(self.scrapes_total.clone()))?;
        Ok(())
    }
}

pub struct ScrapeTimer {
    sql_instance: String,
    query: String,
    start: Instant,
    scraper: Option<ScraperCollector>,
}

impl ScrapeTimer {
    pub fn success(mut self) {
        if let Some(scraper) = self.scraper.take() {
            scraper.record_success(&self.sql_instance, &self.query, self.elapsed());
        }
    }

    pub fn error(mut self) {
        if let Some(scraper) = self.scraper.take() {
            scraper.record_error(&self.sql_instance, &self.query, self.elapsed());
        }
    }

    fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

// A unit that never finished (cancelled future, panic) counts as a failure.
impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        if let Some(scraper) = self.scraper.take() {
            scraper.record_error(&self.sql_instance, &self.query, self.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn sample(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        registry
            .gather()
            .iter()
            .find(|m| m.name() == name)?
            .get_metric()
            .iter()
            .find(|m| {
                labels.iter().all(|(k, v)| {
                    m.get_label().iter().any(|l| l.name() == *k && l.value() == *v)
                })
            })
            .map(|m| {
                m.get_counter()
                    .value
                    .or(m.get_gauge().value)
                    .unwrap_or(0.0)
            })
    }

    #[test]
    fn test_scraper_collector_new() {
        let scraper = ScraperCollector::new();
        assert_eq!(scraper.metrics_total.get(), 0);
        assert_eq!(scraper.scrapes_total.get(), 0);
    }

    #[test]
    fn test_scraper_collector_registers_without_error() {
        let scraper = ScraperCollector::new();
        let registry = Registry::new();
        assert!(scraper.register(&registry).is_ok());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    #[allow(clippy::expect_used)]
    fn test_scrape_timer_records_duration() {
        let scraper = ScraperCollector::new();
        let registry = Registry::new();
        scraper.register(&registry).unwrap();

        {
            let timer = scraper.start_query("db1", "SQLServerCpu");
            thread::sleep(Duration::from_millis(10));
            timer.success();
        }

        let metrics = registry.gather();
        let duration_metric = metrics
            .iter()
            .find(|m| m.name() == "mssql_exporter_query_duration_seconds")
            .expect("duration metric should exist");

        assert!(!duration_metric.get_metric().is_empty());
        assert_eq!(
            sample(&registry, "mssql_exporter_query_last_success", &[("query", "SQLServerCpu")]),
            Some(1.0)
        );
        assert_eq!(
            sample(&registry, "mssql_exporter_query_errors_total", &[("query", "SQLServerCpu")]),
            None
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_scrape_timer_records_error() {
        let scraper = ScraperCollector::new();
        let registry = Registry::new();
        scraper.register(&registry).unwrap();

        scraper.start_query("db1", "SQLServerCpu").error();

        assert_eq!(
            sample(
                &registry,
                "mssql_exporter_query_errors_total",
                &[("sql_instance", "db1"), ("query", "SQLServerCpu")]
            ),
            Some(1.0)
        );
        assert_eq!(
            sample(&registry, "mssql_exporter_query_last_success", &[("query", "SQLServerCpu")]),
            Some(0.0)
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_dropped_timer_counts_as_error() {
        let scraper = ScraperCollector::new();
        let registry = Registry::new();
        scraper.register(&registry).unwrap();

        drop(scraper.start_query("db1", "SQLServerCpu"));

        assert_eq!(
            sample(&registry, "mssql_exporter_query_errors_total", &[("query", "SQLServerCpu")]),
            Some(1.0)
        );
    }

    #[test]
    fn test_update_metrics_count() {
        let scraper = ScraperCollector::new();
        scraper.update_metrics_count(42);
        assert_eq!(scraper.metrics_total.get(), 42);
    }

    #[test]
    fn test_increment_scrapes() {
        let scraper = ScraperCollector::new();
        scraper.increment_scrapes();
        assert_eq!(scraper.scrapes_total.get(), 1);
        scraper.increment_scrapes();
        assert_eq!(scraper.scrapes_total.get(), 2);
    }
}
