//! Exporter self-monitoring.

mod scraper;

pub use scraper::{ScrapeTimer, ScraperCollector};
