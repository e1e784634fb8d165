// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use anyhow::{Result, bail};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use mssql_exporter::collectors::{
    driver::{Connection, Driver, ResultSet},
    row::Value,
    target::Target,
};
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Canned result of one query body.
#[derive(Clone, Debug, Default)]
pub struct Canned {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Canned {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows,
        }
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Stats {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory driver: hosts listed as unreachable refuse connections, every
/// other host answers the canned result registered for a query body.
#[derive(Clone, Default)]
pub struct FakeDriver {
    unreachable: HashSet<String>,
    failing: Arc<HashSet<(String, String)>>,
    responses: Arc<HashMap<String, Canned>>,
    delay: Option<Duration>,
    pub stats: Arc<Stats>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self, sql_instance: &str) -> Self {
        self.unreachable.insert(sql_instance.to_string());
        self
    }

    pub fn respond(mut self, body: &str, canned: Canned) -> Self {
        Arc::make_mut(&mut self.responses).insert(body.trim().to_string(), canned);
        self
    }

    /// Fail only `body` on `sql_instance`.
    pub fn fail(mut self, sql_instance: &str, body: &str) -> Self {
        Arc::make_mut(&mut self.failing).insert((sql_instance.to_string(), body.trim().to_string()));
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Driver for FakeDriver {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn open<'a>(&'a self, target: &'a Target) -> BoxFuture<'a, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            self.stats.opened.fetch_add(1, Ordering::SeqCst);

            if self.unreachable.contains(&target.sql_instance) {
                bail!("Login timed out connecting to {}", target.sql_instance);
            }

            Ok(Box::new(FakeConnection {
                sql_instance: target.sql_instance.clone(),
                failing: Arc::clone(&self.failing),
                responses: Arc::clone(&self.responses),
                delay: self.delay,
                stats: Arc::clone(&self.stats),
            }) as Box<dyn Connection>)
        })
    }
}

struct FakeConnection {
    sql_instance: String,
    failing: Arc<HashSet<(String, String)>>,
    responses: Arc<HashMap<String, Canned>>,
    delay: Option<Duration>,
    stats: Arc<Stats>,
}

impl Connection for FakeConnection {
    fn ping(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ResultSet<'a>>> {
        Box::pin(async move {
            if self.failing.contains(&(self.sql_instance.clone(), sql.trim().to_string())) {
                bail!("Msg 1222, Level 16, State 18, Line 1, Error: Lock request time out period exceeded");
            }

            let Some(canned) = self.responses.get(sql.trim()).cloned() else {
                bail!("Msg 208, Level 16, State 1, Line 1, Error: Invalid object name");
            };

            self.stats.enter();
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.stats.leave();

            let rows: Vec<Result<Vec<Value>>> = canned.rows.into_iter().map(Ok).collect();

            Ok(ResultSet {
                columns: canned.columns,
                rows: stream::iter(rows).boxed(),
            })
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        let stats = Arc::clone(&self.stats);
        Box::pin(async move {
            stats.closed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

pub fn target(connection_string: &str) -> Target {
    Target::new(SecretString::from(connection_string.to_string()))
}

pub fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Wide `DatabaseIO`-style result for one instance.
pub fn database_io(sql_instance: &str) -> Canned {
    Canned::new(
        &["measurement", "sql_instance", "database_name", "read_bytes", "write_bytes"],
        vec![
            vec![
                text("sqlserver_database_io"),
                text(sql_instance),
                text("master"),
                Value::Int(1024),
                Value::Int(2048),
            ],
            vec![
                text("sqlserver_database_io"),
                text(sql_instance),
                text("tempdb"),
                Value::Int(10),
                Value::Int(20),
            ],
        ],
    )
}

pub fn schedulers(sql_instance: &str) -> Canned {
    Canned::new(
        &["measurement", "sql_instance", "scheduler_id", "current_tasks_count", "is_online"],
        vec![vec![
            text("sqlserver_schedulers"),
            text(sql_instance),
            text("0"),
            Value::Int(4),
            Value::Bool(true),
        ]],
    )
}

/// Get an available port for testing
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to ephemeral port")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

/// Build test URL for HTTP requests
pub fn get_test_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Wait for server to be ready
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}
