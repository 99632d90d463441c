//! Configuration file parsing for `sieve.toml`.
//!
//! ```toml
//! [database]
//! provider = "postgresql"
//!
//! [operators]
//! options_limit = 25
//! searchable = true
//!
//! [debug]
//! log_queries = true
//!
//! [[models]]
//! name = "Author"
//! table = "authors"
//! columns = ["id", "name"]
//!
//! [[models]]
//! name = "Post"
//! table = "posts"
//! relations = [{ name = "author", kind = "many_to_one", model = "Author" }]
//!
//! [environments.test.debug]
//! log_queries = false
//! ```
//!
//! `${VAR}` references are replaced with the environment variable's value
//! before parsing. Unset variables are left untouched.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::schema::{ModelDef, Schema};
use crate::sql::DatabaseType;

/// Main configuration structure for `sieve.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SieveConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Defaults seeded into operators.
    #[serde(default)]
    pub operators: OperatorDefaults,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Declarative model metadata.
    #[serde(default)]
    pub models: Vec<ModelDef>,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl SieveConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("Failed to read {}", path.display())).with_source(e)
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content)?;

        let config: Self = toml::from_str(&expanded).map_err(|e| {
            QueryError::configuration(format!("Invalid sieve configuration: {}", e.message())).with_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> QueryResult<()> {
        if self.operators.options_limit == 0 {
            return Err(QueryError::configuration("operators.options_limit must be greater than zero")
                .with_field("options_limit"));
        }
        Ok(())
    }

    /// The SQL dialect queries are rendered for.
    pub fn database_type(&self) -> DatabaseType {
        self.database.provider
    }

    /// Build the schema declared under `[[models]]`.
    pub fn schema(&self) -> QueryResult<Schema> {
        Schema::from_models(self.models.iter().cloned())
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(db) = overrides.database {
                if let Some(provider) = db.provider {
                    self.database.provider = provider;
                }
                if let Some(url) = db.url {
                    self.database.url = Some(url);
                }
            }
            if let Some(ops) = overrides.operators {
                if let Some(limit) = ops.options_limit {
                    self.operators.options_limit = limit;
                }
                if let Some(native) = ops.native {
                    self.operators.native = native;
                }
                if let Some(preload) = ops.preload {
                    self.operators.preload = preload;
                }
                if let Some(searchable) = ops.searchable {
                    self.operators.searchable = searchable;
                }
                if ops.search_case_insensitive.is_some() {
                    self.operators.search_case_insensitive = ops.search_case_insensitive;
                }
            }
            if let Some(debug) = overrides.debug {
                if let Some(log_queries) = debug.log_queries {
                    self.debug.log_queries = log_queries;
                }
            }
        }
        self
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQL dialect.
    #[serde(default)]
    pub provider: DatabaseType,

    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,
}

/// Defaults for operator configuration that callers did not set explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorDefaults {
    /// Maximum number of options loaded into a select.
    #[serde(default = "default_options_limit")]
    pub options_limit: usize,

    /// Render selects with the platform-native control.
    #[serde(default = "default_true")]
    pub native: bool,

    /// Load options up front.
    #[serde(default)]
    pub preload: bool,

    /// Let users search options.
    #[serde(default)]
    pub searchable: bool,

    /// Force case-insensitive search; unset defers to the database.
    #[serde(default)]
    pub search_case_insensitive: Option<bool>,
}

impl Default for OperatorDefaults {
    fn default() -> Self {
        Self {
            options_limit: default_options_limit(),
            native: true,
            preload: false,
            searchable: false,
            search_case_insensitive: None,
        }
    }
}

fn default_options_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Debug configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every query the engine evaluates.
    #[serde(default)]
    pub log_queries: bool,
}

/// Environment-specific overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Database overrides.
    pub database: Option<DatabaseOverride>,

    /// Operator default overrides.
    pub operators: Option<OperatorOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Database configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Override provider.
    pub provider: Option<DatabaseType>,

    /// Override connection URL.
    pub url: Option<String>,
}

/// Operator default overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorOverride {
    /// Override options limit.
    pub options_limit: Option<usize>,
    /// Override native rendering.
    pub native: Option<bool>,
    /// Override preloading.
    pub preload: Option<bool>,
    /// Override searchability.
    pub searchable: Option<bool>,
    /// Override case-insensitive search.
    pub search_case_insensitive: Option<bool>,
}

/// Debug configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override query logging.
    pub log_queries: Option<bool>,
}

/// Expand `${VAR}` references.
fn expand_env_vars(content: &str) -> QueryResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| QueryError::internal(format!("invalid env pattern: {}", e)))?;

    let expanded = re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SieveConfig::default();
        assert_eq!(config.database_type(), DatabaseType::PostgreSQL);
        assert_eq!(config.operators.options_limit, 50);
        assert!(config.operators.native);
        assert!(!config.debug.log_queries);
    }

    #[test]
    fn test_parse_operator_defaults() {
        let config = SieveConfig::from_str(
            r#"
            [database]
            provider = "sqlite"

            [operators]
            options_limit = 10
            search_case_insensitive = true
        "#,
        )
        .unwrap();
        assert_eq!(config.database_type(), DatabaseType::SQLite);
        assert_eq!(config.operators.options_limit, 10);
        assert_eq!(config.operators.search_case_insensitive, Some(true));
        assert!(config.operators.native);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = SieveConfig::from_str("[operators]\nlimit = 3\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_rejects_zero_limit() {
        let err = SieveConfig::from_str("[operators]\noptions_limit = 0\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_models_build_schema() {
        let config = SieveConfig::from_str(
            r#"
            [[models]]
            name = "Author"
            table = "authors"

            [[models]]
            name = "Post"
            table = "posts"
            relations = [{ name = "author", kind = "many_to_one", model = "Author" }]
        "#,
        )
        .unwrap();
        let schema = config.schema().unwrap();
        assert_eq!(schema.len(), 2);
        assert!(schema.get_model("Post").unwrap().is_relation("author"));
    }

    #[test]
    fn test_environment_override() {
        let config = SieveConfig::from_str(
            r#"
            [operators]
            options_limit = 20

            [environments.test.operators]
            options_limit = 5

            [environments.test.debug]
            log_queries = true
        "#,
        )
        .unwrap()
        .with_environment("test");
        assert_eq!(config.operators.options_limit, 5);
        assert!(config.debug.log_queries);
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("SIEVE_TEST_DB_URL", "postgres://test");
        }
        let expanded = expand_env_vars("url = \"${SIEVE_TEST_DB_URL}\" other = \"${SIEVE_UNSET_VAR}\"").unwrap();
        assert_eq!(expanded, "url = \"postgres://test\" other = \"${SIEVE_UNSET_VAR}\"");
        unsafe {
            std::env::remove_var("SIEVE_TEST_DB_URL");
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[debug]\nlog_queries = true").unwrap();
        let config = SieveConfig::from_file(file.path()).unwrap();
        assert!(config.debug.log_queries);

        let err = SieveConfig::from_file(file.path().with_extension("missing")).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
