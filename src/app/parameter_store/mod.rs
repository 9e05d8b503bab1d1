//! Secret parameter lookup for fixture configuration.
//!
//! Pool and app-client ids are kept in SSM Parameter Store as `SecureString`s
//! rather than in the test source. [`ParameterStore`] is the lookup seam;
//! [`SsmParameterStore`] reads the real thing and [`StaticParameterStore`]
//! serves fixed values for offline runs.

pub mod ssm;

pub use ssm::SsmParameterStore;

use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Read-only access to decrypted parameters.
pub trait ParameterStore: Send + Sync {
    /// Value of `name`, decrypted if it is a `SecureString`.
    fn get_secure_parameter(&self, name: &str) -> Result<String>;
}

/// Map-backed store.
#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    values: HashMap<String, String>,
}

impl StaticParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ParameterStore for StaticParameterStore {
    fn get_secure_parameter(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Parameter {} not found", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_store_lookup() {
        let store = StaticParameterStore::new().with("/test/COGNITO_USER_POOL_ID", "pool-1");

        assert_eq!(
            store.get_secure_parameter("/test/COGNITO_USER_POOL_ID").unwrap(),
            "pool-1"
        );
        let err = store.get_secure_parameter("/test/missing").unwrap_err();
        assert!(err.to_string().contains("/test/missing"));
    }
}
