//! Error taxonomy for identity provisioning.
//!
//! Nothing in the provisioning path recovers locally. Every variant here is
//! returned straight to the test that asked for an identity or a token, so the
//! messages carry the username and provider operation needed to clean up by
//! hand when a run aborts half way.

use std::time::Duration;

use crate::app::identity_provider::sdk_errors::{categorize_code, ErrorCategory};

/// Errors raised while provisioning, using or deleting a test identity.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Any identity provider call failure not covered by a more specific variant.
    #[error("{operation} failed ({category}): {code}: {message}")]
    Provider {
        /// Provider operation name, e.g. `AdminCreateUser`.
        operation: &'static str,
        /// Provider error code, e.g. `ResourceNotFoundException`.
        code: String,
        /// Provider error message.
        message: String,
        /// Transient/non-transient classification for diagnostics.
        category: ErrorCategory,
    },

    /// The user does not exist in the pool (never created, or already deleted).
    #[error("User {username} not found during {operation}")]
    NotFound {
        /// Provider operation name.
        operation: &'static str,
        /// The username that was looked up.
        username: String,
    },

    /// A one-time code was requested before MFA enrollment completed.
    #[error("MFA has not been configured for {username}")]
    MfaNotConfigured {
        /// The identity without an MFA device.
        username: String,
    },

    /// MFA enrollment was attempted on an identity that already has a device.
    #[error("MFA is already configured for {username}")]
    MfaAlreadyEnrolled {
        /// The identity that already has an MFA device.
        username: String,
    },

    /// The one-time code for the current time step was already consumed.
    #[error("One-time code for {username} already used in this time step{}", retry_hint(.retry_after))]
    MfaReplay {
        /// The identity whose code was replayed.
        username: String,
        /// Time until the next code becomes valid; zero when unknown.
        retry_after: Duration,
    },

    /// Password or session rejected by the provider.
    #[error("Authentication failed for {username}: {message}")]
    Authentication {
        /// The identity that failed to authenticate.
        username: String,
        /// Provider message.
        message: String,
    },

    /// The provider answered with a challenge the flow does not expect.
    #[error("Expected {expected} challenge during {operation}, got {received}")]
    UnexpectedChallenge {
        /// Provider operation name.
        operation: &'static str,
        /// Challenge the flow was waiting for.
        expected: &'static str,
        /// What the provider actually returned.
        received: String,
    },

    /// A provider response lacked a field the next step depends on.
    #[error("{operation} response is missing {field}")]
    MissingField {
        /// Provider operation name.
        operation: &'static str,
        /// Missing response field.
        field: &'static str,
    },

    /// Rejection sampling failed to produce a policy-compliant password.
    #[error("Unable to generate a policy-compliant password after {attempts} attempts")]
    PasswordGeneration {
        /// Number of candidates rejected.
        attempts: usize,
    },

    /// The MFA shared secret could not be decoded or used for TOTP.
    #[error("Invalid MFA shared secret: {0}")]
    InvalidSecret(String),

    /// Pool/client identifiers or fixture settings are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The blocking Tokio runtime could not be created.
    #[error("Failed to create Tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ProvisionError {
    /// Map a provider error code to the most specific variant.
    ///
    /// Shared by the Cognito client and the in-memory provider so both report
    /// the same variant for the same provider condition.
    pub fn from_service_code(
        operation: &'static str,
        username: &str,
        code: &str,
        message: &str,
    ) -> Self {
        match code {
            "UserNotFoundException" => ProvisionError::NotFound {
                operation,
                username: username.to_string(),
            },
            "NotAuthorizedException" | "PasswordResetRequiredException" => {
                ProvisionError::Authentication {
                    username: username.to_string(),
                    message: message.to_string(),
                }
            }
            "ExpiredCodeException" => ProvisionError::MfaReplay {
                username: username.to_string(),
                retry_after: Duration::ZERO,
            },
            "CodeMismatchException" if message.contains("already been used") => {
                ProvisionError::MfaReplay {
                    username: username.to_string(),
                    retry_after: Duration::ZERO,
                }
            }
            _ => ProvisionError::Provider {
                operation,
                code: code.to_string(),
                message: message.to_string(),
                category: categorize_code(code),
            },
        }
    }

    /// Provider error code, when the failure came from the provider.
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            ProvisionError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }
}

fn retry_hint(retry_after: &Duration) -> String {
    if retry_after.is_zero() {
        String::new()
    } else {
        format!(", retry in {:?}", retry_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_not_found_maps_to_not_found() {
        let err = ProvisionError::from_service_code(
            "AdminDeleteUser",
            "testuser+abcde@test.com",
            "UserNotFoundException",
            "User does not exist.",
        );
        assert!(matches!(
            err,
            ProvisionError::NotFound { operation: "AdminDeleteUser", ref username }
                if username == "testuser+abcde@test.com"
        ));
    }

    #[test]
    fn test_not_authorized_maps_to_authentication() {
        let err = ProvisionError::from_service_code(
            "AdminInitiateAuth",
            "u",
            "NotAuthorizedException",
            "Incorrect username or password.",
        );
        assert!(matches!(err, ProvisionError::Authentication { .. }));
        assert_eq!(
            err.to_string(),
            "Authentication failed for u: Incorrect username or password."
        );
    }

    #[test]
    fn test_reused_code_maps_to_replay() {
        let expired = ProvisionError::from_service_code(
            "RespondToAuthChallenge",
            "u",
            "ExpiredCodeException",
            "Your software token has already been used once.",
        );
        assert!(matches!(expired, ProvisionError::MfaReplay { .. }));

        let mismatch = ProvisionError::from_service_code(
            "RespondToAuthChallenge",
            "u",
            "CodeMismatchException",
            "Your software token has already been used once.",
        );
        assert!(matches!(mismatch, ProvisionError::MfaReplay { .. }));
    }

    #[test]
    fn test_replay_message_omits_unknown_wait() {
        let unknown = ProvisionError::from_service_code(
            "VerifySoftwareToken",
            "u",
            "ExpiredCodeException",
            "Your software token has already been used once.",
        );
        assert_eq!(
            unknown.to_string(),
            "One-time code for u already used in this time step"
        );

        let known = ProvisionError::MfaReplay {
            username: "u".to_string(),
            retry_after: Duration::from_secs(10),
        };
        assert_eq!(
            known.to_string(),
            "One-time code for u already used in this time step, retry in 10s"
        );
    }

    #[test]
    fn test_plain_code_mismatch_is_provider_error() {
        let err = ProvisionError::from_service_code(
            "VerifySoftwareToken",
            "u",
            "CodeMismatchException",
            "Invalid code received for user",
        );
        assert_eq!(err.provider_code(), Some("CodeMismatchException"));
    }

    #[test]
    fn test_missing_group_is_provider_error() {
        let err = ProvisionError::from_service_code(
            "AdminAddUserToGroup",
            "u",
            "ResourceNotFoundException",
            "Group not found.",
        );
        match err {
            ProvisionError::Provider { operation, code, category, .. } => {
                assert_eq!(operation, "AdminAddUserToGroup");
                assert_eq!(code, "ResourceNotFoundException");
                assert!(!category.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
