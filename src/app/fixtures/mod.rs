//! Fixture helpers for API test suites.
//!
//! A [`FixtureSession`] is built once per test module (from
//! [`FixtureConfig`] or directly from a provider and pool) and hands out
//! [`ScopedIdentity`] values that delete their user when they go out of scope.
//!
//! ```rust,no_run
//! use cognito_fixtures::app::fixtures::FixtureSession;
//!
//! # fn example() -> anyhow::Result<()> {
//! let session = FixtureSession::from_env()?;
//! let mut admin = session.admin_user()?;
//! let headers = session.auth_headers(&mut admin)?;
//! // call the API under test with `headers`
//! # let _ = headers;
//! admin.release()?;
//! # Ok(())
//! # }
//! ```

pub mod headers;
pub mod scoped;

pub use headers::AuthHeaders;
pub use scoped::ScopedIdentity;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::app::aws_runtime::BlockingAws;
use crate::app::clock::Clock;
use crate::app::config::FixtureConfig;
use crate::app::errors::ProvisionError;
use crate::app::identity_provider::{CognitoIdentityProvider, IdentityProviderClient, PoolConfig};
use crate::app::parameter_store::SsmParameterStore;
use crate::app::test_identity::{IdentityProvisioner, NamingPolicy, TestIdentity};

/// Shared provider, pool and settings for a group of tests.
#[derive(Debug, Clone)]
pub struct FixtureSession {
    provisioner: IdentityProvisioner,
    admin_group: String,
}

impl FixtureSession {
    pub fn new(provider: Arc<dyn IdentityProviderClient>, pool: PoolConfig) -> Self {
        Self {
            provisioner: IdentityProvisioner::new(provider, pool),
            admin_group: FixtureConfig::default().admin_group,
        }
    }

    /// Load [`FixtureConfig`] from the working directory and environment and
    /// connect to Cognito.
    pub fn from_env() -> Result<Self> {
        let config = FixtureConfig::load()?;
        Self::from_config(&config)
    }

    /// Connect to Cognito, reading pool and client ids from Parameter Store
    /// unless the config carries them literally.
    pub fn from_config(config: &FixtureConfig) -> Result<Self> {
        let aws = BlockingAws::load(config.region.as_deref())
            .context("Failed to initialise the AWS SDK")?;
        let pool = config.resolve(&SsmParameterStore::new(&aws))?;
        log_info!("Fixture session for pool {} client {}", pool.user_pool_id, pool.client_id);

        Ok(Self::new(Arc::new(CognitoIdentityProvider::new(&aws)), pool)
            .with_naming(config.naming_policy())
            .with_admin_group(&config.admin_group))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.provisioner = self.provisioner.with_clock(clock);
        self
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.provisioner = self.provisioner.with_naming(naming);
        self
    }

    pub fn with_admin_group(mut self, group_name: &str) -> Self {
        self.admin_group = group_name.to_string();
        self
    }

    pub fn provisioner(&self) -> &IdentityProvisioner {
        &self.provisioner
    }

    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Enrolled user with no group membership.
    pub fn plain_user(&self) -> Result<ScopedIdentity, ProvisionError> {
        self.user_in_groups(&[])
    }

    /// Enrolled user in the admin group.
    pub fn admin_user(&self) -> Result<ScopedIdentity, ProvisionError> {
        self.user_in_groups(&[self.admin_group.as_str()])
    }

    /// Enrolled user added to each of `groups`. If a group cannot be joined
    /// the user is deleted before the error is returned.
    pub fn user_in_groups(&self, groups: &[&str]) -> Result<ScopedIdentity, ProvisionError> {
        let scoped = ScopedIdentity::new(self.provisioner.provision()?);
        for group in groups {
            scoped.add_to_group(group)?;
        }
        Ok(scoped)
    }

    /// Wait for a code newer than any the identity has used, then build
    /// headers around a fresh access token.
    pub fn auth_headers(&self, identity: &mut TestIdentity) -> Result<AuthHeaders, ProvisionError> {
        identity.wait_for_fresh_code();
        let token = identity.issue_token()?;
        Ok(AuthHeaders::bearer(&token))
    }
}
