//! Query dispatch and row-to-metric engine.
//!
//! - [`catalog`] / [`selector`]: which queries exist and which ones run.
//! - [`driver`]: the seam to the database (`tiberius` in production).
//! - [`executor`] / [`gather`]: one unit of work per (server, query) pair.
//! - [`row`]: schema-free row mapping.
//! - [`registry`]: ties everything together and renders Prometheus text.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod exporter;
pub mod gather;
pub mod health;
pub mod registry;
pub mod row;
pub mod selector;
pub mod sink;
pub mod target;
pub mod util;
