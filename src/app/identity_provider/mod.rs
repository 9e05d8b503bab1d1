//! Identity Provider Integration Module
//!
//! The single seam between test identities and the backend that stores them.
//! [`IdentityProviderClient`] lists the admin operations the provisioning
//! sequence needs; every call is one blocking round trip with no retry.
//!
//! ## Implementations
//!
//! - [`CognitoIdentityProvider`]: AWS Cognito user pools through the Rust SDK
//! - [`InMemoryIdentityProvider`]: an in-process stand-in that enforces the
//!   same challenge ordering, session threading and one-code-per-window rules,
//!   for tests that must not touch AWS
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cognito_fixtures::app::aws_runtime::BlockingAws;
//! use cognito_fixtures::app::identity_provider::{CognitoIdentityProvider, PoolConfig};
//! use cognito_fixtures::app::test_identity::IdentityProvisioner;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let aws = BlockingAws::load(Some("us-east-1"))?;
//! let provider = Arc::new(CognitoIdentityProvider::new(&aws));
//! let pool = PoolConfig::new("us-east-1_AbCdEfGhI", "1example23456789")?;
//!
//! let mut identity = IdentityProvisioner::new(provider, pool).provision()?;
//! let token = identity.issue_token()?;
//! # let _ = token;
//! identity.delete()?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod client;
pub mod in_memory;
pub mod sdk_errors;
pub mod types;

pub use client::CognitoIdentityProvider;
pub use in_memory::InMemoryIdentityProvider;
pub use sdk_errors::ErrorCategory;
pub use types::{
    AuthStep, AuthTokens, ChallengeAnswer, ChallengeKind, CreateUserRequest, PoolConfig,
    SoftwareTokenAssociation,
};

use crate::app::errors::ProvisionError;

/// Admin operations against an identity provider's user pool.
///
/// Implementations map provider failures onto [`ProvisionError`] with
/// [`ProvisionError::from_service_code`] so callers see the same variant
/// whichever backend is in use.
pub trait IdentityProviderClient: Send + Sync {
    /// Create a user with a temporary password (`AdminCreateUser`).
    fn create_user(&self, request: &CreateUserRequest<'_>) -> Result<(), ProvisionError>;

    /// Delete a user (`AdminDeleteUser`).
    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProvisionError>;

    /// Start an `ADMIN_NO_SRP_AUTH` sign-in (`AdminInitiateAuth`).
    fn initiate_auth(
        &self,
        pool: &PoolConfig,
        username: &str,
        password: &str,
    ) -> Result<AuthStep, ProvisionError>;

    /// Answer a challenge within a session (`RespondToAuthChallenge`).
    fn respond_to_challenge(
        &self,
        client_id: &str,
        session: &str,
        answer: &ChallengeAnswer,
    ) -> Result<AuthStep, ProvisionError>;

    /// Request a software token secret for the session's user
    /// (`AssociateSoftwareToken`).
    fn associate_software_token(
        &self,
        session: &str,
    ) -> Result<SoftwareTokenAssociation, ProvisionError>;

    /// Verify the first code from an associated software token
    /// (`VerifySoftwareToken`).
    fn verify_software_token(
        &self,
        session: &str,
        code: &str,
        device_label: &str,
    ) -> Result<(), ProvisionError>;

    /// Add a user to an existing group (`AdminAddUserToGroup`).
    fn add_user_to_group(
        &self,
        user_pool_id: &str,
        username: &str,
        group_name: &str,
    ) -> Result<(), ProvisionError>;

    /// Whether the user exists (`AdminGetUser`).
    fn user_exists(&self, user_pool_id: &str, username: &str) -> Result<bool, ProvisionError>;
}
