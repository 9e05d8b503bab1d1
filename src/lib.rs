//! Cognito Fixtures - Throwaway MFA-enrolled users for API tests
//!
//! Creates short-lived users in an AWS Cognito user pool, takes them through
//! temporary-password rotation and software-token (TOTP) MFA enrollment, and
//! mints bearer tokens so API tests can run as realistic principals with or
//! without elevated group membership. Users are deleted when the test is done
//! with them.
//!
//! # Core Features
//!
//! - **One-call provisioning**: [`app::test_identity::IdentityProvisioner`]
//!   returns an identity that is already enrolled
//! - **Token issuance**: password + TOTP sign-in with local one-code-per-step
//!   replay detection
//! - **Group membership**: add identities to pre-existing groups
//! - **Scoped cleanup**: [`app::fixtures::ScopedIdentity`] deletes on release
//!   or drop
//! - **Offline testing**: [`app::identity_provider::InMemoryIdentityProvider`]
//!   plus [`app::clock::ManualClock`] exercise the full flow without AWS
//!
//! # Architecture Overview
//!
//! - **Provisioning** ([`app::test_identity`]): identity lifecycle and MFA state
//! - **Provider boundary** ([`app::identity_provider`]): the
//!   `IdentityProviderClient` trait with Cognito and in-memory backends
//! - **Fixture layer** ([`app::fixtures`], [`app::config`],
//!   [`app::parameter_store`]): configuration, SSM lookup, scoped identities
//!   and request headers
//!
//! All calls are blocking. The Cognito backend drives the async AWS SDK
//! through [`app::aws_runtime::BlockingAws`].
//!
//! # Getting Started
//!
//! Create `cognito-fixtures.json` (see [`app::config`]) and call
//! [`app::fixtures::FixtureSession::from_env`] from a test.

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;
