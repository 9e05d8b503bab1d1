#![warn(clippy::all, rust_2018_idioms)]

/// Logging macros with file, module and line context.
/// Every provisioning step logs through these so a failed fixture run can be
/// traced back to the exact call site in the test log.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
        tracing::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

/// Tracing-only variants, for step-by-step detail that does not need to reach
/// the `log` facade.
#[macro_export]
macro_rules! trace_trace {
    ($($arg:tt)*) => {
        tracing::trace!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

/*
Log level guidelines for provisioning code:

TRACE: individual provider round trips (operation name, username)
DEBUG: state transitions (challenge received, session threaded, MFA enrolled)
INFO:  identity created, token issued, identity deleted
WARN:  orphaned identities after a failed provisioning run, drop-time cleanup failures
ERROR: provider calls that abort a fixture

Never log passwords, MFA secrets, one-time codes or tokens. Usernames and
pool ids are fine.

Example output:
  [src/app/test_identity/mod.rs:cognito_fixtures::app::test_identity:212] Enrolled MFA device for testuser+a1B2c@test.com
*/
