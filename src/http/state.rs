use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::UpstreamConfig;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Upstream speech API the forwarder submits audio to.
    pub upstream: Arc<UpstreamConfig>,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(upstream: UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(upstream.timeout_secs))
            .build()
            .context("failed to build upstream HTTP client")?;

        Ok(Self {
            upstream: Arc::new(upstream),
            client,
        })
    }
}
