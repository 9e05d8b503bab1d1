//! Core modules for test identity provisioning.
//!
//! # Module Organization
//!
//! ## Provisioning
//! - [`test_identity`] - Identity lifecycle: create, rotate, enroll, sign in, delete
//! - [`clock`] - Time source for code derivation and window waits
//! - [`errors`] - Provisioning error taxonomy
//!
//! ## Provider Integration
//! - [`identity_provider`] - Provider trait, Cognito client and in-memory pool
//! - [`aws_runtime`] - Blocking bridge to the async AWS SDK
//! - [`parameter_store`] - Secret parameter lookup for pool and client ids
//!
//! ## Test Harness
//! - [`fixtures`] - Fixture sessions, scoped identities and auth headers
//! - [`config`] - Fixture configuration file and environment overrides
//! - [`logging`] - Subscriber setup for test runs
//!
//! # Architecture
//!
//! - [`fixtures`] resolves configuration and builds a provisioner
//! - [`test_identity`] drives the challenge sequence through [`identity_provider`]
//! - [`identity_provider`] maps provider failures onto [`errors::ProvisionError`]

pub mod aws_runtime;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fixtures;
pub mod identity_provider;
pub mod logging;
pub mod parameter_store;
pub mod test_identity;
