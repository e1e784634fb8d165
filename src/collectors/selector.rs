//! Active query selection.
//!
//! The catalog comes from configuration; include and exclude lists accept
//! exact names or `*`/`?` glob patterns. The selection is computed at most
//! once per [`QuerySelector`] and reused by every gather cycle.

use crate::collectors::{
    catalog::{CatalogKind, QueryDefinition},
    config::CollectorConfig,
};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

pub struct QuerySelector {
    catalog: CatalogKind,
    include: Vec<String>,
    exclude: Vec<String>,
    active: OnceCell<Arc<[QueryDefinition]>>,
}

impl QuerySelector {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self::with_catalog(
            config.catalog(),
            config.include_query.clone(),
            config.exclude_query.clone(),
        )
    }

    #[must_use]
    pub const fn with_catalog(catalog: CatalogKind, include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            catalog,
            include,
            exclude,
            active: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> CatalogKind {
        self.catalog
    }

    /// Active queries in catalog order, built on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if an include or exclude pattern cannot be compiled.
    pub fn active(&self) -> Result<Arc<[QueryDefinition]>> {
        self.active
            .get_or_try_init(|| {
                let queries = build_active_queries(self.catalog.queries(), &self.include, &self.exclude)?;

                info!(
                    catalog = %self.catalog,
                    queries = ?queries.iter().map(|q| q.name).collect::<Vec<_>>(),
                    "active queries"
                );

                Ok(Arc::from(queries))
            })
            .cloned()
    }
}

/// Restrict `catalog` to `include` (when non-empty), then drop `exclude`.
///
/// Unknown include names are logged and skipped.
///
/// # Errors
///
/// Returns an error if a pattern cannot be compiled.
pub fn build_active_queries(
    catalog: Vec<QueryDefinition>,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<QueryDefinition>> {
    let include = compile(include)?;
    let exclude = compile(exclude)?;

    for (pattern, re) in &include {
        if !catalog.iter().any(|q| re.is_match(q.name)) {
            warn!(query = %pattern, "included query not found in catalog, skipping");
        }
    }

    Ok(catalog
        .into_iter()
        .filter(|q| include.is_empty() || include.iter().any(|(_, re)| re.is_match(q.name)))
        .filter(|q| !exclude.iter().any(|(_, re)| re.is_match(q.name)))
        .collect())
}

fn compile(patterns: &[String]) -> Result<Vec<(String, Regex)>> {
    patterns
        .iter()
        .map(|pattern| {
            let re = glob_to_regex(pattern)
                .with_context(|| format!("invalid query pattern '{pattern}'"))?;
            Ok((pattern.clone(), re))
        })
        .collect()
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');

    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    re.push('$');
    Ok(Regex::new(&re)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::catalog::DatabaseType;

    fn def(name: &'static str) -> QueryDefinition {
        QueryDefinition {
            name,
            body: "SELECT 1",
            result_by_row: false,
        }
    }

    fn names(queries: &[QueryDefinition]) -> Vec<&'static str> {
        queries.iter().map(|q| q.name).collect()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_include_then_exclude() {
        let catalog = vec![def("A"), def("B"), def("C")];
        let active = build_active_queries(catalog, &strings(&["A", "B"]), &strings(&["B"])).unwrap();
        assert_eq!(names(&active), vec!["A"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_empty_include_keeps_catalog_order() {
        let catalog = vec![def("C"), def("A"), def("B")];
        let active = build_active_queries(catalog, &[], &strings(&["A"])).unwrap();
        assert_eq!(names(&active), vec!["C", "B"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_unknown_include_is_skipped() {
        let catalog = vec![def("A"), def("B")];
        let active = build_active_queries(catalog, &strings(&["A", "Nope"]), &[]).unwrap();
        assert_eq!(names(&active), vec!["A"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_glob_patterns() {
        let catalog = vec![
            def("SQLServerCpu"),
            def("SQLServerDatabaseIO"),
            def("SQLServerDatabaseReplicaStates"),
            def("SQLServerRequests"),
        ];

        let active = build_active_queries(catalog.clone(), &strings(&["SQLServerDatabase*"]), &[]).unwrap();
        assert_eq!(names(&active), vec!["SQLServerDatabaseIO", "SQLServerDatabaseReplicaStates"]);

        let active = build_active_queries(catalog, &[], &strings(&["*Replica*", "SQLServerCp?"])).unwrap();
        assert_eq!(names(&active), vec!["SQLServerDatabaseIO", "SQLServerRequests"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_patterns_are_literal_outside_wildcards() {
        let catalog = vec![def("a.b"), def("axb")];
        let active = build_active_queries(catalog, &strings(&["a.b"]), &[]).unwrap();
        assert_eq!(names(&active), vec!["a.b"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_selector_caches_selection() {
        let selector = QuerySelector::with_catalog(
            CatalogKind::Database(DatabaseType::SqlServer),
            strings(&["SQLServerSchedulers", "SQLServerDatabaseIO"]),
            Vec::new(),
        );

        let first = selector.active().unwrap();
        let second = selector.active().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(names(&first), vec!["SQLServerDatabaseIO", "SQLServerSchedulers"]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_selector_from_config() {
        let config = CollectorConfig::new()
            .with_database_type(Some(DatabaseType::AzureSqlDb))
            .with_exclude(&strings(&["AzureSQLDBRequests"]));

        let selector = QuerySelector::new(&config);
        let active = selector.active().unwrap();

        assert!(!active.is_empty());
        assert!(active.iter().all(|q| q.name.starts_with("AzureSQLDB")));
        assert!(active.iter().all(|q| q.name != "AzureSQLDBRequests"));
    }
}
