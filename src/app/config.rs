//! Fixture configuration loader.
//!
//! Settings come from a `cognito-fixtures.json` file in the working directory
//! (optional), then `COGNITO_FIXTURES_*` environment variables, which win.
//!
//! # cognito-fixtures.json Format
//!
//! ```json
//! {
//!   "region": "us-east-1",
//!   "user_pool_id_parameter": "/myapp/test/COGNITO_USER_POOL_ID",
//!   "client_id_parameter": "/myapp/test/COGNITO_CLIENT_ID",
//!   "admin_group": "admingroup"
//! }
//! ```
//!
//! `user_pool_id` and `client_id` may be given literally instead of through
//! parameters; a literal id takes precedence over its parameter.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::app::identity_provider::PoolConfig;
use crate::app::parameter_store::ParameterStore;
use crate::app::test_identity::NamingPolicy;

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "cognito-fixtures.json";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "COGNITO_FIXTURES_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// AWS region; the SDK provider chain decides when unset.
    pub region: Option<String>,

    /// Literal user pool id.
    pub user_pool_id: Option<String>,

    /// Literal app client id.
    pub client_id: Option<String>,

    /// Parameter Store name holding the user pool id.
    pub user_pool_id_parameter: Option<String>,

    /// Parameter Store name holding the app client id.
    pub client_id_parameter: Option<String>,

    pub username_prefix: String,
    pub username_domain: String,

    /// Group the admin fixture adds its user to. Must already exist.
    pub admin_group: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        let naming = NamingPolicy::default();
        Self {
            region: None,
            user_pool_id: None,
            client_id: None,
            user_pool_id_parameter: None,
            client_id_parameter: None,
            username_prefix: naming.prefix,
            username_domain: naming.domain,
            admin_group: "admingroup".to_string(),
        }
    }
}

impl FixtureConfig {
    /// Load `cognito-fixtures.json` from the working directory, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(CONFIG_FILE_NAME)?;
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No fixture config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture config {:?}", path))?;
        let config: FixtureConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse fixture config {:?}", path))?;

        debug!(
            "Loaded fixture config: region={:?}, admin_group={}",
            config.region, config.admin_group
        );
        Ok(config)
    }

    /// Apply `COGNITO_FIXTURES_*` overrides using `lookup` to read variables.
    /// Empty values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
        };

        if let Some(value) = get("REGION") {
            self.region = Some(value);
        }
        if let Some(value) = get("USER_POOL_ID") {
            self.user_pool_id = Some(value);
        }
        if let Some(value) = get("CLIENT_ID") {
            self.client_id = Some(value);
        }
        if let Some(value) = get("USER_POOL_ID_PARAMETER") {
            self.user_pool_id_parameter = Some(value);
        }
        if let Some(value) = get("CLIENT_ID_PARAMETER") {
            self.client_id_parameter = Some(value);
        }
        if let Some(value) = get("USERNAME_PREFIX") {
            self.username_prefix = value;
        }
        if let Some(value) = get("USERNAME_DOMAIN") {
            self.username_domain = value;
        }
        if let Some(value) = get("ADMIN_GROUP") {
            self.admin_group = value;
        }
    }

    /// Resolve the pool and client ids, reading parameters for whichever id
    /// is not given literally.
    pub fn resolve(&self, store: &dyn ParameterStore) -> Result<PoolConfig> {
        let user_pool_id = resolve_id(
            "user pool id",
            self.user_pool_id.as_deref(),
            self.user_pool_id_parameter.as_deref(),
            store,
        )?;
        let client_id = resolve_id(
            "client id",
            self.client_id.as_deref(),
            self.client_id_parameter.as_deref(),
            store,
        )?;

        Ok(PoolConfig::new(user_pool_id, client_id)?)
    }

    pub fn naming_policy(&self) -> NamingPolicy {
        NamingPolicy {
            prefix: self.username_prefix.clone(),
            domain: self.username_domain.clone(),
            ..NamingPolicy::default()
        }
    }
}

fn resolve_id(
    what: &str,
    literal: Option<&str>,
    parameter: Option<&str>,
    store: &dyn ParameterStore,
) -> Result<String> {
    match (literal, parameter) {
        (Some(literal), parameter) => {
            if let Some(parameter) = parameter {
                warn!("Both a literal {} and parameter {} are set; using the literal", what, parameter);
            }
            Ok(literal.to_string())
        }
        (None, Some(parameter)) => store
            .get_secure_parameter(parameter)
            .with_context(|| format!("Failed to resolve {} from {}", what, parameter)),
        (None, None) => bail!(
            "No {} configured; set it or its parameter name in {} or the environment",
            what,
            CONFIG_FILE_NAME
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::parameter_store::StaticParameterStore;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FixtureConfig::load_from_path(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, FixtureConfig::default());
        assert_eq!(config.admin_group, "admingroup");
        assert_eq!(config.username_prefix, "testuser+");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"region": "eu-west-1", "client_id_parameter": "/app/test/CLIENT_ID"}}"#
        )
        .unwrap();

        let config = FixtureConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.client_id_parameter.as_deref(), Some("/app/test/CLIENT_ID"));
        assert_eq!(config.username_domain, "test.com");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = FixtureConfig::load_from_path(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse fixture config"));
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<String, String> = [
            ("COGNITO_FIXTURES_REGION", "us-west-2"),
            ("COGNITO_FIXTURES_ADMIN_GROUP", "admins"),
            ("COGNITO_FIXTURES_USER_POOL_ID", "  "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = FixtureConfig {
            region: Some("us-east-1".to_string()),
            user_pool_id: Some("pool-1".to_string()),
            ..FixtureConfig::default()
        };
        config.apply_env_overrides_from(|key| env.get(key).cloned());

        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.admin_group, "admins");
        assert_eq!(config.user_pool_id.as_deref(), Some("pool-1"));
    }

    #[test]
    fn test_resolve_reads_each_id_from_its_own_parameter() {
        let store = StaticParameterStore::new()
            .with("/app/test/USER_POOL_ID", "pool-1")
            .with("/app/test/CLIENT_ID", "app-1");
        let config = FixtureConfig {
            user_pool_id_parameter: Some("/app/test/USER_POOL_ID".to_string()),
            client_id_parameter: Some("/app/test/CLIENT_ID".to_string()),
            ..FixtureConfig::default()
        };

        let pool = config.resolve(&store).unwrap();
        assert_eq!(pool, PoolConfig::new("pool-1", "app-1").unwrap());
    }

    #[test]
    fn test_resolve_prefers_literal_ids() {
        let store = StaticParameterStore::new().with("/app/test/CLIENT_ID", "app-1");
        let config = FixtureConfig {
            user_pool_id: Some("pool-literal".to_string()),
            user_pool_id_parameter: Some("/app/test/unused".to_string()),
            client_id_parameter: Some("/app/test/CLIENT_ID".to_string()),
            ..FixtureConfig::default()
        };

        let pool = config.resolve(&store).unwrap();
        assert_eq!(pool.user_pool_id, "pool-literal");
        assert_eq!(pool.client_id, "app-1");
    }

    #[test]
    fn test_resolve_without_any_source_fails() {
        let err = FixtureConfig::default()
            .resolve(&StaticParameterStore::new())
            .unwrap_err();
        assert!(err.to_string().contains("No user pool id configured"));
    }

    #[test]
    fn test_naming_policy_from_config() {
        let config = FixtureConfig {
            username_prefix: "ci+".to_string(),
            username_domain: "example.org".to_string(),
            ..FixtureConfig::default()
        };
        let naming = config.naming_policy();
        assert_eq!(naming.prefix, "ci+");
        assert_eq!(naming.domain, "example.org");
        assert_eq!(naming.random_len, 5);
    }
}
