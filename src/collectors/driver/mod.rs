//! Database execution seam.
//!
//! The executor only needs to open a connection, check it is alive, run one
//! query and walk its rows. [`MssqlDriver`] implements it over `tiberius`;
//! tests plug in fakes.

mod mssql;

pub use mssql::{MssqlDriver, to_ado_string};

use crate::collectors::{row::Value, target::Target};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Result of one query: column names, then rows in server order.
pub struct ResultSet<'a> {
    pub columns: Vec<String>,
    pub rows: BoxStream<'a, Result<Vec<Value>>>,
}

pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a fresh connection to `target`.
    fn open<'a>(&'a self, target: &'a Target) -> BoxFuture<'a, Result<Box<dyn Connection>>>;
}

pub trait Connection: Send {
    fn ping(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Run `sql` verbatim. Only the first result set is returned.
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ResultSet<'a>>>;

    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}
