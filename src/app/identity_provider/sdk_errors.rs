//! AWS SDK error categorization for provider failures.
//!
//! Provisioning never retries: a failed call aborts the fixture. The category
//! attached to a [`ProvisionError::Provider`](crate::app::errors::ProvisionError::Provider)
//! only tells the person reading the test log whether re-running the suite is
//! likely to help (throttling, timeouts, network blips) or not (permissions,
//! validation, missing pool).

use serde::Serialize;
use std::fmt;

/// Categorized provider failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// Request was throttled by the user pool's rate limits
    Throttled { error_code: String },
    /// Request timed out before a response arrived
    Timeout { operation: String },
    /// Network connectivity issues (DNS, connection refused, TLS)
    NetworkError { message: String },
    /// Cognito reported an internal failure
    ServiceUnavailable { message: String },
    /// Non-transient error (permissions, validation, missing resources)
    NonRetryable {
        code: String,
        is_permission_error: bool,
    },
}

impl ErrorCategory {
    /// Returns true if a re-run could plausibly succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, ErrorCategory::NonRetryable { .. })
    }

    /// Short label for log lines
    pub fn short_label(&self) -> &'static str {
        match self {
            ErrorCategory::Throttled { .. } => "throttled",
            ErrorCategory::Timeout { .. } => "timeout",
            ErrorCategory::NetworkError { .. } => "network",
            ErrorCategory::ServiceUnavailable { .. } => "unavailable",
            ErrorCategory::NonRetryable { .. } => "error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_label())
    }
}

/// Categorize a Cognito service error code (e.g. `TooManyRequestsException`)
pub fn categorize_code(code: &str) -> ErrorCategory {
    match code {
        "TooManyRequestsException" | "LimitExceededException" | "ThrottlingException" => {
            ErrorCategory::Throttled {
                error_code: code.to_string(),
            }
        }
        "InternalErrorException" | "InternalServerException" | "ServiceUnavailable" => {
            ErrorCategory::ServiceUnavailable {
                message: code.to_string(),
            }
        }
        _ => ErrorCategory::NonRetryable {
            code: code.to_string(),
            is_permission_error: is_permission_code(code),
        },
    }
}

/// Categorize an error from its rendered message.
///
/// Used for SDK failures that never reached the service (dispatch, timeout,
/// credential resolution), where no error code is available.
pub fn categorize_error_string(error_str: &str, operation: &str) -> ErrorCategory {
    if let Some(code) = extract_error_code(error_str) {
        if code.ends_with("Exception") {
            return categorize_code(&code);
        }
    }

    if error_str.contains("TimeoutError")
        || error_str.contains("timeout")
        || error_str.contains("timed out")
    {
        return ErrorCategory::Timeout {
            operation: operation.to_string(),
        };
    }

    if error_str.contains("DispatchFailure")
        || error_str.contains("dispatch failure")
        || error_str.contains("connection")
        || error_str.contains("Connection")
        || error_str.contains("DNS")
        || error_str.contains("dns error")
    {
        return ErrorCategory::NetworkError {
            message: truncate_message(error_str, 100),
        };
    }

    if error_str.contains("Service Unavailable") || error_str.contains("503") {
        return ErrorCategory::ServiceUnavailable {
            message: truncate_message(error_str, 100),
        };
    }

    let is_permission_error = error_str.contains("AccessDenied")
        || error_str.contains("UnrecognizedClient")
        || error_str.contains("InvalidClientTokenId")
        || error_str.contains("SignatureDoesNotMatch")
        || error_str.contains("no credentials")
        || error_str.contains("failed to load credentials");

    ErrorCategory::NonRetryable {
        code: if is_permission_error {
            "AccessDenied".to_string()
        } else {
            "Error".to_string()
        },
        is_permission_error,
    }
}

fn is_permission_code(code: &str) -> bool {
    matches!(
        code,
        "AccessDeniedException"
            | "UnrecognizedClientException"
            | "InvalidClientTokenId"
            | "ExpiredTokenException"
            | "SignatureDoesNotMatch"
    )
}

/// Extract an error code from `Code: message` style strings
fn extract_error_code(error_str: &str) -> Option<String> {
    let pos = error_str.find(':')?;
    let prefix = error_str[..pos].trim();
    let code = prefix.rsplit("::").next().unwrap_or(prefix);
    let looks_like_code = !code.is_empty()
        && code.len() < 50
        && !code.contains(' ')
        && code.chars().next().is_some_and(|c| c.is_uppercase());
    looks_like_code.then(|| code.to_string())
}

/// Truncate a message to max length, adding ellipsis if truncated
fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.chars().count() <= max_len {
        msg.to_string()
    } else {
        let truncated: String = msg.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
