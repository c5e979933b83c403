//! HTTP health probe

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::errors::UpdateError;
use crate::health::HealthProbe;

/// Probes readiness with an HTTP GET; any 2xx status counts as healthy
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpdateError::ConfigError(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, endpoint: &Url) -> bool {
        match self.client.get(endpoint.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("probe {} failed: {}", endpoint, e);
                false
            }
        }
    }
}
