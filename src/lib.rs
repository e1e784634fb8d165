//! Prometheus exporter for Microsoft SQL Server and the Azure SQL family.
//!
//! The exporter runs a catalog of diagnostic queries against every configured
//! server on each scrape and turns every result row into a metric. Query
//! bodies live under `queries/` and are embedded at build time; the engine in
//! [`collectors`] only knows their names and their result shape.

pub mod cli;
pub mod collectors;
pub mod exporter;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Version string including the git commit when available.
#[must_use]
pub fn version() -> String {
    built_info::GIT_COMMIT_HASH.map_or_else(
        || built_info::PKG_VERSION.to_string(),
        |hash| format!("{} - {hash}", built_info::PKG_VERSION),
    )
}
