//! Fan-out of every (target, query) pairing of a gather cycle.
//!
//! All pairings run concurrently and are joined before the cycle ends. A
//! failing pairing never cancels or delays its siblings: its error is logged,
//! handed to the sink and counted in the [`GatherReport`].

use crate::collectors::{
    catalog::QueryDefinition,
    driver::Driver,
    error::IncompleteGather,
    executor::{ExecutorOptions, execute},
    exporter::ScraperCollector,
    health::{HealthTracker, TargetHealth},
    sink::MetricSink,
    target::Target,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, instrument};
use tracing_futures::Instrument as _;

/// Outcome of one gather cycle.
#[derive(Debug, Clone, Default)]
pub struct GatherReport {
    pub attempted: usize,
    pub failed: usize,
    pub metrics: usize,
    pub targets: Vec<TargetHealth>,
}

impl GatherReport {
    /// Every target with attempted queries had at least one success.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.targets.iter().all(TargetHealth::is_up)
    }

    /// # Errors
    ///
    /// Returns [`IncompleteGather`] if any pairing failed.
    pub const fn check(&self) -> Result<(), IncompleteGather> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(IncompleteGather {
                attempted: self.attempted,
                failed: self.failed,
            })
        }
    }
}

pub struct Gatherer {
    driver: Arc<dyn Driver>,
    options: ExecutorOptions,
    health_metric: bool,
    scraper: Option<ScraperCollector>,
    cancel: CancellationToken,
}

impl Gatherer {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            options: ExecutorOptions::default(),
            health_metric: false,
            scraper: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn with_health_metric(mut self, enabled: bool) -> Self {
        self.health_metric = enabled;
        self
    }

    #[must_use]
    pub fn with_scraper(mut self, scraper: ScraperCollector) -> Self {
        self.scraper = Some(scraper);
        self
    }

    /// Pairings in flight abort with a cancelled error once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every query against every target.
    ///
    /// # Errors
    ///
    /// Returns [`IncompleteGather`] if one or more pairings failed; the
    /// individual errors went to `sink`.
    pub async fn gather(
        &self,
        targets: &[Target],
        queries: &[QueryDefinition],
        sink: &dyn MetricSink,
    ) -> Result<(), IncompleteGather> {
        self.gather_report(targets, queries, sink).await.check()
    }

    /// Like [`Gatherer::gather`], returning counts and per-target health.
    #[instrument(
        skip_all,
        level = "info",
        fields(driver = self.driver.name(), targets = targets.len(), queries = queries.len(), otel.kind = "internal")
    )]
    pub async fn gather_report(
        &self,
        targets: &[Target],
        queries: &[QueryDefinition],
        sink: &dyn MetricSink,
    ) -> GatherReport {
        let health = HealthTracker::new(targets);
        let mut tasks = FuturesUnordered::new();

        for (index, target) in targets.iter().enumerate() {
            for query in queries {
                let span = info_span!(
                    "collector.query",
                    sql_instance = %target.sql_instance,
                    database = %target.database_name,
                    query = query.name,
                    otel.kind = "internal"
                );

                let health = &health;

                tasks.push(
                    async move {
                        let timer = self
                            .scraper
                            .as_ref()
                            .map(|s| s.start_query(&target.sql_instance, query.name));

                        let result = execute(
                            self.driver.as_ref(),
                            target,
                            query,
                            sink,
                            &self.options,
                            &self.cancel,
                        )
                        .await;

                        health.record(index, result.is_ok());

                        if let Some(timer) = timer {
                            if result.is_ok() {
                                timer.success();
                            } else {
                                timer.error();
                            }
                        }

                        result
                    }
                    .instrument(span),
                );
            }
        }

        let mut report = GatherReport::default();

        while let Some(result) = tasks.next().await {
            report.attempted += 1;

            match result {
                Ok(count) => report.metrics += count,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        sql_instance = %e.sql_instance,
                        database = %e.database_name,
                        query = %e.query,
                        error = %e.kind,
                        "query failed"
                    );
                    sink.add_error(e);
                }
            }
        }

        if self.health_metric {
            health.emit(sink, self.options.database_type);
        }

        report.targets = health.snapshot();

        debug!(
            attempted = report.attempted,
            failed = report.failed,
            metrics = report.metrics,
            "gather finished"
        );

        report
    }
}
