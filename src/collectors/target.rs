use crate::collectors::util::connection_identifiers;
use secrecy::SecretString;
use std::fmt;

/// A configured server: the secret connection string plus its display identity.
#[derive(Clone)]
pub struct Target {
    pub connection_string: SecretString,
    pub sql_instance: String,
    pub database_name: String,
}

impl Target {
    #[must_use]
    pub fn new(connection_string: SecretString) -> Self {
        use secrecy::ExposeSecret;

        let (sql_instance, database_name) = connection_identifiers(connection_string.expose_secret());

        Self {
            connection_string,
            sql_instance,
            database_name,
        }
    }
}

// Never print the connection string, it carries credentials.
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("sql_instance", &self.sql_instance)
            .field("database_name", &self.database_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sql_instance, self.database_name)
    }
}
