use crate::collectors::{
    catalog::{DatabaseType, QueryDefinition},
    driver::{Connection, Driver, ResultSet},
    error::{DecodeError, GatherError, GatherErrorKind},
    row::map_row,
    sink::MetricSink,
    target::Target,
};
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

/// Tag added to every metric when a database type is configured.
pub const DB_TYPE_TAG: &str = "measurement_db_type";

#[derive(Clone, Debug, Default)]
pub struct ExecutorOptions {
    pub database_type: Option<DatabaseType>,
    pub timeout: Option<Duration>,
}

/// Run one query against one target, pushing every mapped row to `sink` as
/// soon as it is read. Returns the number of metrics emitted.
///
/// # Errors
///
/// Any failure aborts only this pairing and is returned as a [`GatherError`].
#[instrument(
    skip_all,
    level = "info",
    fields(sql_instance = %target.sql_instance, query = query.name, otel.kind = "internal")
)]
pub async fn execute(
    driver: &dyn Driver,
    target: &Target,
    query: &QueryDefinition,
    sink: &dyn MetricSink,
    options: &ExecutorOptions,
    cancel: &CancellationToken,
) -> Result<usize, GatherError> {
    let work = async {
        let run = run(driver, target, query, sink, options.database_type);

        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .unwrap_or(Err(GatherErrorKind::Timeout(timeout))),
            None => run.await,
        }
    };

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(GatherErrorKind::Cancelled),
        res = work => res,
    };

    outcome.map_err(|kind| GatherError {
        sql_instance: target.sql_instance.clone(),
        database_name: target.database_name.clone(),
        query: query.name.to_string(),
        kind,
    })
}

async fn run(
    driver: &dyn Driver,
    target: &Target,
    query: &QueryDefinition,
    sink: &dyn MetricSink,
    database_type: Option<DatabaseType>,
) -> Result<usize, GatherErrorKind> {
    let mut conn = driver
        .open(target)
        .await
        .map_err(GatherErrorKind::Connect)?;

    let result = stream_rows(&mut *conn, target, query, sink, database_type).await;

    conn.close().await;

    result
}

async fn stream_rows(
    conn: &mut dyn Connection,
    target: &Target,
    query: &QueryDefinition,
    sink: &dyn MetricSink,
    database_type: Option<DatabaseType>,
) -> Result<usize, GatherErrorKind> {
    conn.ping().await.map_err(GatherErrorKind::Ping)?;

    let span = info_span!(
        "db.query",
        db.system = "mssql",
        db.operation = "SELECT",
        db.statement = query.name,
        db.name = %target.database_name,
        otel.kind = "client"
    );

    async move {
        let ResultSet { columns, mut rows } = conn
            .query(query.body)
            .await
            .map_err(GatherErrorKind::Query)?;

        let mut count = 0;

        while let Some(row) = rows.next().await {
            let values = row.map_err(|e| {
                if e.downcast_ref::<DecodeError>().is_some() {
                    GatherErrorKind::Decode(e)
                } else {
                    GatherErrorKind::Query(e)
                }
            })?;

            let mut metric = map_row(&columns, values, query.result_by_row)
                .map_err(|e| GatherErrorKind::Decode(e.into()))?;

            if let Some(database_type) = database_type {
                metric
                    .tags
                    .insert(DB_TYPE_TAG.to_string(), database_type.as_str().to_string());
            }

            sink.add_metric(metric);
            count += 1;
        }

        debug!(rows = count, "query finished");

        Ok(count)
    }
    .instrument(span)
    .await
}
