use std::time::Duration;
use thiserror::Error;

/// Stage at which a (target, query) pairing failed.
#[derive(Debug, Error)]
pub enum GatherErrorKind {
    #[error("connection error: {0:#}")]
    Connect(anyhow::Error),

    #[error("ping error: {0:#}")]
    Ping(anyhow::Error),

    #[error("query error: {0:#}")]
    Query(anyhow::Error),

    #[error("row decode error: {0:#}")]
    Decode(anyhow::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// Failure of one (target, query) pairing. Never fatal to sibling pairings.
#[derive(Debug, Error)]
#[error("query {query} failed for server: {sql_instance} and database: {database_name} with {kind}")]
pub struct GatherError {
    pub sql_instance: String,
    pub database_name: String,
    pub query: String,
    #[source]
    pub kind: GatherErrorKind,
}

/// Aggregate outcome of a gather cycle in which at least one pairing failed.
#[derive(Debug, Error)]
#[error("{failed} of {attempted} queries failed")]
pub struct IncompleteGather {
    pub attempted: usize,
    pub failed: usize,
}

/// A row that could not be decoded into values.
///
/// Drivers wrap column decoding failures in this type so the executor can tell
/// them apart from server side query errors.
#[derive(Debug, Error)]
#[error("column {column}: {message}")]
pub struct DecodeError {
    pub column: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_gather_error_display() {
        let err = GatherError {
            sql_instance: "serverB".to_string(),
            database_name: "master".to_string(),
            query: "SQLServerSchedulers".to_string(),
            kind: GatherErrorKind::Connect(anyhow!("connection refused")),
        };

        assert_eq!(
            err.to_string(),
            "query SQLServerSchedulers failed for server: serverB and database: master with connection error: connection refused"
        );
    }

    #[test]
    fn test_gather_error_keeps_context_chain() {
        let inner = anyhow!("tcp reset").context("login failed");
        let kind = GatherErrorKind::Query(inner);
        assert_eq!(kind.to_string(), "query error: login failed: tcp reset");
    }

    #[test]
    fn test_gather_error_source_is_kind() {
        use std::error::Error as _;

        let err = GatherError {
            sql_instance: "a".to_string(),
            database_name: "b".to_string(),
            query: "q".to_string(),
            kind: GatherErrorKind::Timeout(Duration::from_secs(3)),
        };

        assert_eq!(
            err.source().map(ToString::to_string),
            Some("timed out after 3s".to_string())
        );
    }

    #[test]
    fn test_incomplete_gather_display() {
        let err = IncompleteGather {
            attempted: 4,
            failed: 2,
        };
        assert_eq!(err.to_string(), "2 of 4 queries failed");
    }
}
