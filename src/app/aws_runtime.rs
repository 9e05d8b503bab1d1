//! Blocking bridge to the async AWS SDK.
//!
//! Test fixtures are synchronous, the SDK is not. [`BlockingAws`] owns one
//! Tokio runtime and the loaded SDK configuration; provider and parameter-store
//! clients built from it run each request to completion with `block_on`.
//!
//! Do not call into these clients from inside an async test body: `block_on`
//! panics when invoked from a runtime worker thread. Use plain `#[test]`
//! functions, which is what the fixture layer is written for.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_types::region::Region;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::app::errors::ProvisionError;

/// Shared runtime plus AWS configuration for blocking SDK calls.
#[derive(Debug, Clone)]
pub struct BlockingAws {
    runtime: Arc<Runtime>,
    config: SdkConfig,
}

impl BlockingAws {
    /// Create the runtime and load AWS configuration from the default
    /// provider chain (environment, profile, IMDS). `region` overrides the
    /// chain's region when given.
    pub fn load(region: Option<&str>) -> Result<Self, ProvisionError> {
        let rt_start = std::time::Instant::now();
        let runtime = Runtime::new()?;
        trace_debug!("Runtime creation took {:?}", rt_start.elapsed());

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = runtime.block_on(loader.load());

        log_debug!(
            "Loaded AWS configuration for region {}",
            config.region().map(|r| r.as_ref()).unwrap_or("<default>")
        );

        Ok(Self {
            runtime: Arc::new(runtime),
            config,
        })
    }

    /// Wrap an already loaded configuration.
    pub fn from_config(config: SdkConfig) -> Result<Self, ProvisionError> {
        Ok(Self {
            runtime: Arc::new(Runtime::new()?),
            config,
        })
    }

    /// Loaded SDK configuration.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Run a future to completion on the owned runtime.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
