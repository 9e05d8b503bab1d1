use anyhow::{Context, Result};
use aws_sdk_ssm as ssm;
use tracing::debug;

use super::ParameterStore;
use crate::app::aws_runtime::BlockingAws;

/// SSM Parameter Store reader (`GetParameter` with decryption).
#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    aws: BlockingAws,
    client: ssm::Client,
}

impl SsmParameterStore {
    pub fn new(aws: &BlockingAws) -> Self {
        Self {
            aws: aws.clone(),
            client: ssm::Client::new(aws.config()),
        }
    }
}

impl ParameterStore for SsmParameterStore {
    fn get_secure_parameter(&self, name: &str) -> Result<String> {
        debug!("Reading parameter {} from Parameter Store", name);

        let output = self
            .aws
            .block_on(
                self.client
                    .get_parameter()
                    .name(name)
                    .with_decryption(true)
                    .send(),
            )
            .map_err(|e| anyhow::anyhow!("{}", ssm::error::DisplayErrorContext(&e)))
            .with_context(|| format!("Failed to read parameter {}", name))?;

        output
            .parameter
            .and_then(|parameter| parameter.value)
            .with_context(|| format!("Parameter {} has no value", name))
    }
}
