use crate::collectors::{
    catalog::QueryDefinition,
    config::CollectorConfig,
    driver::Driver,
    executor::ExecutorOptions,
    exporter::ScraperCollector,
    gather::Gatherer,
    row::{Metric, Value},
    selector::QuerySelector,
    sink::MetricBuffer,
    target::Target,
    util::{sanitize_label_name, sanitize_metric_name},
};
use anyhow::Result;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder, proto::MetricFamily};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Measurement used when a query row carries no `measurement` column.
pub const DEFAULT_MEASUREMENT: &str = "sqlserver";

pub const UP_METRIC: &str = "mssql_up";

/// Owns the targets, the active query selection and the exporter's own
/// metrics. Every scrape runs a full gather cycle.
pub struct CollectorRegistry {
    config: CollectorConfig,
    targets: Vec<Target>,
    selector: QuerySelector,
    gatherer: Gatherer,
    scraper: ScraperCollector,
    registry: Registry,
}

impl CollectorRegistry {
    /// # Errors
    ///
    /// Returns an error if the self-monitoring metrics cannot be registered.
    pub fn new(config: CollectorConfig, targets: Vec<Target>, driver: Arc<dyn Driver>) -> Result<Self> {
        let registry = Registry::new();
        let scraper = ScraperCollector::new();
        scraper.register(&registry)?;

        let config = config.with_defaults();
        let selector = QuerySelector::new(&config);

        let gatherer = Gatherer::new(driver)
            .with_options(ExecutorOptions {
                database_type: config.effective_database_type(),
                timeout: config.query_timeout,
            })
            .with_health_metric(config.health_metric)
            .with_scraper(scraper.clone());

        Ok(Self {
            config,
            targets,
            selector,
            gatherer,
            scraper,
            registry,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// # Errors
    ///
    /// Returns an error if an include or exclude pattern is invalid.
    pub fn active_queries(&self) -> Result<Arc<[QueryDefinition]>> {
        self.selector.active()
    }

    /// Run one gather cycle and render it in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if the query selection is invalid or encoding fails.
    /// Failing queries only drop their own metrics and turn `mssql_up` to 0.
    #[instrument(skip(self), level = "info", err, fields(otel.kind = "internal"))]
    pub async fn collect_all(&self) -> Result<String> {
        self.scraper.increment_scrapes();

        let queries = self.selector.active()?;
        let buffer = MetricBuffer::new();

        let report = self.gatherer.gather_report(&self.targets, &queries, &buffer).await;

        if let Err(e) = report.check() {
            debug!(error = %e, "gather completed with errors");
        }

        let metrics = buffer.take_metrics();
        self.scraper.update_metrics_count(metrics.len());

        let mut families = render(&metrics, report.is_up())?;
        families.extend(self.registry.gather());

        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;

        Ok(String::from_utf8(buf)?)
    }
}

#[derive(Default)]
struct Family {
    help: String,
    labels: BTreeSet<String>,
    samples: Vec<(BTreeMap<String, String>, f64)>,
}

/// Render mapped metrics as gauge families plus `mssql_up`.
///
/// Every numeric field becomes `<measurement>_<field>` labelled with the row's
/// tags; string fields become `<measurement>_<field>_info` with the text in a
/// `value` label; NULL fields are skipped. Rows repeating a label set
/// overwrite each other, so the last one wins.
///
/// # Errors
///
/// Returns an error if the `mssql_up` gauge cannot be built.
pub fn render(metrics: &[Metric], up: bool) -> Result<Vec<MetricFamily>> {
    let mut families: BTreeMap<String, Family> = BTreeMap::new();

    for metric in metrics {
        let measurement = if metric.measurement.is_empty() {
            DEFAULT_MEASUREMENT
        } else {
            metric.measurement.as_str()
        };

        let labels: BTreeMap<String, String> = metric
            .tags
            .iter()
            .map(|(k, v)| (sanitize_label_name(k), v.clone()))
            .collect();

        for (field, value) in &metric.fields {
            let (name, labels, sample) = match value {
                Value::Null => continue,
                Value::String(s) => {
                    let mut labels = labels.clone();
                    labels.insert("value".to_string(), s.clone());
                    (format!("{measurement}_{field}_info"), labels, 1.0)
                }
                other => match other.as_f64() {
                    Some(sample) => (format!("{measurement}_{field}"), labels.clone(), sample),
                    None => continue,
                },
            };

            let family = families.entry(sanitize_metric_name(&name)).or_default();
            if family.help.is_empty() {
                family.help = format!("{measurement} {field}");
            }
            family.labels.extend(labels.keys().cloned());
            family.samples.push((labels, sample));
        }
    }

    let registry = Registry::new();

    for (name, family) in families {
        let label_names: Vec<&str> = family.labels.iter().map(String::as_str).collect();

        let gauge = match GaugeVec::new(Opts::new(name.as_str(), family.help.as_str()), &label_names) {
            Ok(gauge) => gauge,
            Err(e) => {
                warn!(metric = %name, error = %e, "skipping metric family");
                continue;
            }
        };

        let mut seen = BTreeSet::new();

        for (labels, sample) in &family.samples {
            let values: Vec<&str> = family
                .labels
                .iter()
                .map(|k| labels.get(k).map_or("", String::as_str))
                .collect();
            gauge.with_label_values(values.as_slice()).set(*sample);

            if !seen.insert(values) {
                debug!(metric = %name, labels = ?labels, "duplicate label set, last row wins");
            }
        }

        if let Err(e) = registry.register(Box::new(gauge)) {
            warn!(metric = %name, error = %e, "skipping metric family");
        }
    }

    let up_gauge = Gauge::with_opts(Opts::new(
        UP_METRIC,
        "Whether every target answered at least one query in the last scrape (1=up, 0=down)",
    ))?;
    up_gauge.set(if up { 1.0 } else { 0.0 });
    registry.register(Box::new(up_gauge))?;

    Ok(registry.gather())
}
