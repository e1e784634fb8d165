//! Shared utilities for collectors:
//! - Display identity (`sql_instance`, `database_name`) derived from a connection string.
//! - Prometheus-safe metric and label names.

use url::Url;

/// Placeholder used when a connection string carries no server.
pub const EMPTY_SQL_INSTANCE: &str = "<empty-sql-instance>";

/// Placeholder used when a connection string carries no database.
pub const EMPTY_DATABASE_NAME: &str = "<empty-database-name>";

const ODBC_PREFIX: &str = "odbc:";
const URL_PREFIX: &str = "sqlserver://";

/// Resolve the `(sql_instance, database_name)` pair used to tag metrics and errors.
///
/// Accepts ADO style `key=value;` strings (optionally prefixed with `odbc:`) and
/// `sqlserver://` URLs. Never fails: anything that cannot be understood resolves
/// to [`EMPTY_SQL_INSTANCE`] / [`EMPTY_DATABASE_NAME`].
#[must_use]
pub fn connection_identifiers(connection_string: &str) -> (String, String) {
    let trimmed = connection_string.trim();

    if let Some(rest) = trimmed.strip_prefix(ODBC_PREFIX) {
        return parse_key_value(rest);
    }

    if trimmed.starts_with(URL_PREFIX) {
        return parse_url(trimmed);
    }

    parse_key_value(trimmed)
}

fn parse_key_value(connection_string: &str) -> (String, String) {
    let mut sql_instance: Option<String> = None;
    let mut database_name: Option<String> = None;

    for pair in connection_string.split(';') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = value.trim();

        if key.eq_ignore_ascii_case("server") {
            if sql_instance.is_none() {
                sql_instance = Some(value.to_string());
            }
        } else if key.eq_ignore_ascii_case("database") && database_name.is_none() {
            database_name = Some(value.to_string());
        }
    }

    with_placeholders(sql_instance, database_name)
}

fn parse_url(connection_string: &str) -> (String, String) {
    let Ok(url) = Url::parse(connection_string) else {
        return with_placeholders(None, None);
    };

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string());

    // "host:port/InstanceName" is the URL spelling of a named instance.
    let path = url.path();
    let sql_instance = match (host, path.len() > 1) {
        (Some(host), true) if !host.is_empty() => {
            Some(format!("{host}\\{}", path.trim_start_matches('/')))
        }
        (host, _) => host,
    };

    let database_name = url
        .query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("database"))
        .map(|(_, value)| value.into_owned());

    with_placeholders(sql_instance, database_name)
}

fn with_placeholders(sql_instance: Option<String>, database_name: Option<String>) -> (String, String) {
    (
        sql_instance
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| EMPTY_SQL_INSTANCE.to_string()),
        database_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| EMPTY_DATABASE_NAME.to_string()),
    )
}

/// Turn an arbitrary string into a valid Prometheus metric name
/// (`[a-zA-Z_:][a-zA-Z0-9_:]*`).
#[must_use]
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize(name, true)
}

/// Turn an arbitrary string into a valid Prometheus label name
/// (`[a-zA-Z_][a-zA-Z0-9_]*`, never starting with `__`).
#[must_use]
pub fn sanitize_label_name(name: &str) -> String {
    let label = sanitize(name, false);
    if label.starts_with("__") {
        format!("label{label}")
    } else {
        label
    }
}

fn sanitize(name: &str, allow_colon: bool) -> String {
    let mut out = String::with_capacity(name.len() + 1);

    for (i, c) in name.chars().enumerate() {
        let valid = c.is_ascii_alphabetic()
            || c == '_'
            || (allow_colon && c == ':')
            || (i > 0 && c.is_ascii_digit());

        if valid {
            out.push(c);
        } else if i == 0 && c.is_ascii_digit() {
            out.push('_');
            out.push(c);
        } else {
            out.push('_');
        }
    }

    if out.is_empty() {
        out.push('_');
    }

    out
}
