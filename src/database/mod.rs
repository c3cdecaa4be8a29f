use std::ops::Deref;

use derive_new::new;
use serde::Deserialize;
use snafu::{Location, ResultExt, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use url::Url;

/// Helper trait for executing arbitrary SurrealQL queries.
pub mod query;

/// Typed record ids.
pub mod record;

/// Macros for defining tables.
pub mod macros;

pub use query::{Bindings, DatabaseQueryError, Sql};
pub use record::{Record, Table};
pub use surrealdb::sql::Thing;

const SETUP: &str = include_str!("../../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}`: {source}"))]
    DatabaseConnection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot sign in to the database as `{username}`: {source}"))]
    SignIn {
        username: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot use namespace `{namespace}` and database `{database}`: {source}"))]
    SelectDatabase {
        namespace: String,
        database: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to define the database schema: {source}"))]
    DefineSchema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "surreal_url", default = "default_url")]
    pub url: Url,
    #[serde(rename = "surreal_ns", default = "default_name")]
    pub namespace: String,
    #[serde(rename = "surreal_db", default = "default_name")]
    pub database: String,
    #[serde(flatten)]
    pub credentials: Option<DatabaseCredentials>,
}

fn default_url() -> Url {
    Url::parse("mem://").expect("`mem://` is a valid url")
}

fn default_name() -> String {
    "adstats".to_string()
}

impl Default for DatabaseConfig {
    /// An in-memory database that lives as long as the connection.
    fn default() -> Self {
        DatabaseConfig {
            url: default_url(),
            namespace: default_name(),
            database: default_name(),
            credentials: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseCredentials {
    #[serde(rename = "surreal_user")]
    pub username: String,
    #[serde(rename = "surreal_pass")]
    pub password: String,
}

impl DatabaseCredentials {
    fn auth<'a>(
        &'a self, namespace: &'a str, database: &'a str,
    ) -> impl auth::Credentials<auth::Signin, auth::Jwt> + 'a {
        auth::Database {
            namespace,
            database,
            username: &self.username,
            password: &self.password,
        }
    }
}

/// A connection to the statistics database.
///
/// Cheap to clone. Every store operation takes it as an explicit argument.
#[derive(Debug, Clone, new)]
pub struct Database {
    inner: Surreal<Any>,
}

impl Database {
    #[tracing::instrument(skip(config), fields(url = %config.url))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .context(DatabaseConnectionSnafu {
                url: config.url.clone(),
            })?;

        if let Some(credentials) = &config.credentials {
            db.signin(credentials.auth(&config.namespace, &config.database))
                .await
                .context(SignInSnafu {
                    username: &credentials.username,
                })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .context(SelectDatabaseSnafu {
                namespace: &config.namespace,
                database: &config.database,
            })?;

        let database = Database::new(db);
        database.setup().await?;

        tracing::info!("connected to the database");
        Ok(database)
    }

    /// Define the tables and indexes. Running it again on an existing database is harmless.
    async fn setup(&self) -> Result<(), DatabaseError> {
        self.inner
            .query(SETUP)
            .await
            .context(DefineSchemaSnafu)?
            .check()
            .context(DefineSchemaSnafu)?;

        Ok(())
    }
}

impl Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Whether the error came from a `UNIQUE` index rejecting a write.
///
/// Remote engines only forward the error message, so the message is matched rather than the error variant.
pub fn is_unique_violation(error: &surrealdb::Error, index: &str) -> bool {
    let message = error.to_string();
    message.contains(index) && message.contains("already contains")
}
