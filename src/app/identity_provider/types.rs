//! Identity Provider Data Types
//!
//! Provider-neutral shapes for the requests and responses of the admin
//! authentication flow.

#![warn(clippy::all, rust_2018_idioms)]

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app::errors::ProvisionError;

/// User pool and app client a test identity lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Cognito user pool id, e.g. `us-east-1_AbCdEfGhI`.
    pub user_pool_id: String,
    /// App client id used for `ADMIN_NO_SRP_AUTH` sign-in.
    pub client_id: String,
}

impl PoolConfig {
    /// Validate and build a pool reference. Both ids must be non-empty.
    pub fn new(
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let user_pool_id = user_pool_id.into().trim().to_string();
        let client_id = client_id.into().trim().to_string();

        if user_pool_id.is_empty() {
            return Err(ProvisionError::InvalidConfiguration(
                "user pool id must not be empty".to_string(),
            ));
        }
        if client_id.is_empty() {
            return Err(ProvisionError::InvalidConfiguration(
                "client id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            user_pool_id,
            client_id,
        })
    }
}

/// Arguments for creating a user with a temporary password.
#[derive(Debug, Clone)]
pub struct CreateUserRequest<'a> {
    /// Target pool id.
    pub user_pool_id: &'a str,
    /// New username.
    pub username: &'a str,
    /// Value for the `email` attribute.
    pub email: &'a str,
    /// Temporary password the user must change on first sign-in.
    pub temporary_password: &'a str,
    /// Suppress the welcome message the provider would otherwise send.
    pub suppress_welcome: bool,
}

/// Challenges the admin sign-in flow can return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    /// First sign-in with a temporary password.
    NewPasswordRequired,
    /// Pool requires a software token to be set up.
    MfaSetup,
    /// Enrolled user must present a TOTP code.
    SoftwareTokenMfa,
    /// Anything else the provider may send (SMS_MFA, CUSTOM_CHALLENGE, ...).
    Other(String),
}

impl ChallengeKind {
    /// Provider wire name.
    pub fn as_str(&self) -> &str {
        match self {
            ChallengeKind::NewPasswordRequired => "NEW_PASSWORD_REQUIRED",
            ChallengeKind::MfaSetup => "MFA_SETUP",
            ChallengeKind::SoftwareTokenMfa => "SOFTWARE_TOKEN_MFA",
            ChallengeKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens returned at the end of a successful sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// Bearer token for API calls.
    pub access_token: String,
    /// OIDC id token.
    pub id_token: Option<String>,
    /// Refresh token.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i32,
    /// Token type, normally `Bearer`.
    pub token_type: Option<String>,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Outcome of one step of the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// Provider wants another round; `session` threads it.
    Challenge {
        /// Which challenge to answer.
        kind: ChallengeKind,
        /// Opaque session token for the next call.
        session: String,
    },
    /// Sign-in complete.
    Authenticated(AuthTokens),
}

impl AuthStep {
    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            AuthStep::Challenge { kind, .. } => kind.to_string(),
            AuthStep::Authenticated(_) => "authentication result".to_string(),
        }
    }
}

/// Answer to a sign-in challenge.
#[derive(Clone, PartialEq, Eq)]
pub enum ChallengeAnswer {
    /// Response to `NEW_PASSWORD_REQUIRED`.
    NewPassword {
        /// Username being signed in.
        username: String,
        /// Replacement password.
        new_password: String,
    },
    /// Response to `SOFTWARE_TOKEN_MFA`.
    SoftwareTokenMfa {
        /// Username being signed in.
        username: String,
        /// Current TOTP code.
        code: String,
    },
}

impl ChallengeAnswer {
    /// Which challenge this answers.
    pub fn kind(&self) -> ChallengeKind {
        match self {
            ChallengeAnswer::NewPassword { .. } => ChallengeKind::NewPasswordRequired,
            ChallengeAnswer::SoftwareTokenMfa { .. } => ChallengeKind::SoftwareTokenMfa,
        }
    }

    /// Username the answer is for.
    pub fn username(&self) -> &str {
        match self {
            ChallengeAnswer::NewPassword { username, .. }
            | ChallengeAnswer::SoftwareTokenMfa { username, .. } => username,
        }
    }
}

impl fmt::Debug for ChallengeAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeAnswer")
            .field("kind", &self.kind())
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

/// Result of associating a software token.
#[derive(Clone, PartialEq, Eq)]
pub struct SoftwareTokenAssociation {
    /// Base32 shared secret.
    pub secret_code: String,
    /// Session to use for verification, when the provider rotates it.
    pub session: Option<String>,
}

impl fmt::Debug for SoftwareTokenAssociation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareTokenAssociation")
            .field("secret_code", &"<redacted>")
            .field("session", &self.session.as_ref().map(|_| "<session>"))
            .finish()
    }
}
