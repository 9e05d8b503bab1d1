//! Test-run logging setup.

use std::sync::Once;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset. AWS SDK internals stay at warn.
pub const DEFAULT_FILTER: &str = "cognito_fixtures=info,aws_config=warn,aws_sigv4=warn,aws_smithy_runtime=warn,aws_smithy_runtime_api=warn,aws_smithy_http=warn,hyper=warn";

static INIT: Once = Once::new();

/// Install a global subscriber that writes through the test harness's
/// captured output, and bridge `log` records into it. Safe to call from every
/// test; only the first call has an effect, and an already installed global
/// subscriber is left alone.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(false),
            );

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return;
        }

        // Must run after the subscriber is set
        let _ = tracing_log::LogTracer::init();

        tracing::debug!("Test logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_logging();
        init_test_logging();
        log_info!("logging works after repeated init");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
