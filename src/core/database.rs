/// Database collaborator
///
/// MariaDB running as a compose service. Every client call goes through
/// `docker compose exec`, with passwords passed via the client environment
/// (`MYSQL_PWD`) rather than the command line.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::core::credentials::CredentialSet;
use crate::core::docker::{Compose, Redirect};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Liveness probe: the server accepts connections
    async fn ping(&self) -> Result<bool>;

    /// Size of the application schema in bytes, from the engine's metadata
    async fn size_estimate(&self) -> Result<u64>;

    /// Logical dump of the application schema into `dest`; returns bytes written
    async fn dump(&self, dest: &Path) -> Result<u64>;

    /// Drop and recreate the schema, then load `source` into it
    async fn restore(&self, source: &Path) -> Result<()>;

    /// Change the password accepted for `credentials.user`
    async fn set_password(&self, credentials: &CredentialSet) -> Result<()>;

    /// Attempt a login with the given credentials
    async fn authenticate(&self, credentials: &CredentialSet) -> Result<bool>;
}

/// Quote a value for a single-quoted SQL string literal
pub fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Quote an identifier with backticks
pub fn sql_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

pub struct MariaDb {
    compose: Compose,
    service: String,
    schema: String,
    root_password: String,
}

impl MariaDb {
    pub fn new(compose: Compose, service: &str, schema: &str, root_password: &str) -> Self {
        Self {
            compose,
            service: service.to_string(),
            schema: schema.to_string(),
            root_password: root_password.to_string(),
        }
    }

    async fn client(
        &self,
        user: &str,
        password: &str,
        program: &str,
        extra: &[&str],
        io: Redirect<'_>,
    ) -> Result<String> {
        let user_arg = format!("-u{}", user);
        let mut args = vec![
            "exec",
            "-T",
            "-e",
            "MYSQL_PWD",
            self.service.as_str(),
            program,
            user_arg.as_str(),
        ];
        args.extend_from_slice(extra);
        self.compose
            .run_with(&args, &[("MYSQL_PWD", password)], io)
            .await
    }

    async fn root_sql(&self, sql: &str) -> Result<String> {
        self.client("root", &self.root_password, "mysql", &["-N", "-B", "-e", sql], Redirect::Capture)
            .await
    }
}

#[async_trait]
impl Database for MariaDb {
    async fn ping(&self) -> Result<bool> {
        match self
            .client("root", &self.root_password, "mysqladmin", &["ping"], Redirect::Capture)
            .await
        {
            Ok(output) => Ok(output.contains("alive")),
            Err(e) => {
                debug!(error = %e, "database ping failed");
                Ok(false)
            }
        }
    }

    async fn size_estimate(&self) -> Result<u64> {
        let sql = format!(
            "SELECT COALESCE(SUM(data_length + index_length), 0) FROM information_schema.tables WHERE table_schema = {}",
            sql_quote(&self.schema)
        );
        let output = self.root_sql(&sql).await?;
        let value = output.trim();
        value
            .parse::<f64>()
            .map(|bytes| bytes as u64)
            .with_context(|| format!("Unexpected size query output: '{}'", value))
    }

    async fn dump(&self, dest: &Path) -> Result<u64> {
        self.client(
            "root",
            &self.root_password,
            "mysqldump",
            &[
                "--single-transaction",
                "--quick",
                "--routines",
                "--triggers",
                "--default-character-set=utf8mb4",
                self.schema.as_str(),
            ],
            Redirect::StdoutTo(dest),
        )
        .await
        .context("mysqldump failed")?;

        let size = tokio::fs::metadata(dest)
            .await
            .with_context(|| format!("Dump file missing at {}", dest.display()))?
            .len();
        Ok(size)
    }

    async fn restore(&self, source: &Path) -> Result<()> {
        let schema = sql_ident(&self.schema);
        let recreate = format!(
            "DROP DATABASE IF EXISTS {schema}; CREATE DATABASE {schema} CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci;"
        );
        self.root_sql(&recreate)
            .await
            .context("Failed to recreate database")?;

        self.client(
            "root",
            &self.root_password,
            "mysql",
            &[self.schema.as_str()],
            Redirect::StdinFrom(source),
        )
        .await
        .context("Failed to load database dump")?;
        Ok(())
    }

    async fn set_password(&self, credentials: &CredentialSet) -> Result<()> {
        let sql = format!(
            "ALTER USER {}@'%' IDENTIFIED BY {}; FLUSH PRIVILEGES;",
            sql_quote(&credentials.user),
            sql_quote(credentials.password())
        );
        self.root_sql(&sql)
            .await
            .map_err(|e| anyhow!("ALTER USER for '{}' failed: {}", credentials.user, e))?;
        Ok(())
    }

    async fn authenticate(&self, credentials: &CredentialSet) -> Result<bool> {
        let result = self
            .client(
                &credentials.user,
                credentials.password(),
                "mysql",
                &["-N", "-B", "-e", "SELECT 1"],
                Redirect::Capture,
            )
            .await;
        Ok(result.is_ok())
    }
}
