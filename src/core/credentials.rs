/// Credential reconciliation
///
/// A restored `config.php` carries the database password that was valid when
/// the snapshot was taken. After restoring config, that credential is copied
/// into the deployment environment first and then applied to the live
/// database engine, so config, `.env` and the engine agree again. Writing the
/// environment first means a later `reapply_from_env` alone can finish an
/// interrupted reconciliation.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::core::config::EnvStore;
use crate::core::database::Database;
use crate::core::error::{EngineError, EngineResult};
use crate::utils::app_config::DatabaseSettings;
use crate::utils::{mask_sensitive, APP_CONFIG_FILE};

/// Database username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub user: String,
    password: String,
}

impl CredentialSet {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("user", &self.user)
            .field("password", &mask_sensitive(&self.password, 2))
            .finish()
    }
}

fn config_value_regex(key: &str) -> Regex {
    // PHP single- or double-quoted string value of `'key' => ...`
    Regex::new(&format!(
        r#"['"]{}['"]\s*=>\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
        regex::escape(key)
    ))
    .expect("static credential pattern")
}

fn user_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| config_value_regex("dbuser"))
}

fn password_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| config_value_regex("dbpassword"))
}

/// Undo PHP string escaping (`\\` and `\'` / `\"`)
fn php_unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '\'' | '"')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn capture_value(re: &Regex, content: &str) -> Option<String> {
    let caps = re.captures(content)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| php_unescape(m.as_str()))
}

/// Extract the database credential from the application's config.php text
pub fn parse_app_config(content: &str) -> Result<CredentialSet> {
    let user = capture_value(user_regex(), content)
        .ok_or_else(|| anyhow!("'dbuser' not found in {}", APP_CONFIG_FILE))?;
    let password = capture_value(password_regex(), content)
        .ok_or_else(|| anyhow!("'dbpassword' not found in {}", APP_CONFIG_FILE))?;

    if user.is_empty() {
        return Err(anyhow!("'dbuser' is empty in {}", APP_CONFIG_FILE));
    }

    Ok(CredentialSet::new(user, password))
}

/// Extract the database credential from a config tree (reads `<dir>/config.php`)
pub fn extract_from_config_dir(config_dir: &Path) -> Result<CredentialSet> {
    let path = config_dir.join(APP_CONFIG_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_app_config(&content)
}

pub struct CredentialReconciler {
    database: Arc<dyn Database>,
    settings: DatabaseSettings,
}

impl CredentialReconciler {
    pub fn new(database: Arc<dyn Database>, settings: DatabaseSettings) -> Self {
        Self { database, settings }
    }

    /// Align `.env` and the live engine with the credential in the restored config.
    ///
    /// Returns `Ok(None)` when the credential cannot be extracted (the caller
    /// warns and continues), `ReconciliationFailed` when a write step fails.
    pub async fn reconcile(&self, config_dir: &Path, env: &mut EnvStore) -> EngineResult<Option<CredentialSet>> {
        let credentials = match extract_from_config_dir(config_dir) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "could not extract database credential from restored config");
                return Ok(None);
            }
        };

        info!(user = %credentials.user, "reconciling database credential");

        env.set(self.settings.user_env_key.clone(), credentials.user.clone());
        env.set(self.settings.password_env_key.clone(), credentials.password().to_string());
        env.save().map_err(|e| {
            EngineError::ReconciliationFailed(format!("writing {}: {:#}", env.path().display(), e))
        })?;
        self.check_persisted(env.path(), &credentials)?;

        self.apply(&credentials).await?;
        Ok(Some(credentials))
    }

    /// Re-apply the credential currently stored in `.env` to the live engine
    pub async fn reapply_from_env(&self, env: &EnvStore) -> EngineResult<CredentialSet> {
        let user = env
            .get(&self.settings.user_env_key)
            .unwrap_or(&self.settings.default_user)
            .to_string();
        let password = env.get(&self.settings.password_env_key).ok_or_else(|| {
            EngineError::ReconciliationFailed(format!(
                "{} is not set in {}",
                self.settings.password_env_key,
                env.path().display()
            ))
        })?;

        let credentials = CredentialSet::new(user, password);
        self.apply(&credentials).await?;
        Ok(credentials)
    }

    /// The credential as docker compose will read it back from `.env`
    fn check_persisted(&self, env_file: &Path, credentials: &CredentialSet) -> EngineResult<()> {
        let stored = EnvStore::load(env_file)
            .map_err(|e| EngineError::ReconciliationFailed(format!("{:#}", e)))?;
        let user = stored.get(&self.settings.user_env_key);
        let password = stored.get(&self.settings.password_env_key);
        if user != Some(credentials.user.as_str()) || password != Some(credentials.password()) {
            return Err(EngineError::ReconciliationFailed(format!(
                "{} does not hold the restored credential after saving",
                env_file.display()
            )));
        }
        Ok(())
    }

    async fn apply(&self, credentials: &CredentialSet) -> EngineResult<()> {
        self.database
            .set_password(credentials)
            .await
            .map_err(|e| EngineError::ReconciliationFailed(format!("{:#}", e)))?;

        match self.database.authenticate(credentials).await {
            Ok(true) => {
                info!(user = %credentials.user, "database accepts reconciled credential");
                Ok(())
            }
            Ok(false) => Err(EngineError::ReconciliationFailed(format!(
                "database rejected login for '{}' after password change",
                credentials.user
            ))),
            Err(e) => Err(EngineError::ReconciliationFailed(format!("login check failed: {:#}", e))),
        }
    }
}
