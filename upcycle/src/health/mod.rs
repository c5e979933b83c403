//! Health probing

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Poll timing for one wait-for-healthy cycle
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Delay between probes
    pub interval: Duration,

    /// Total budget for the component to become healthy
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
        }
    }
}

/// A single readiness probe against one endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// One probe; a failure is an observation, not an error
    async fn probe(&self, endpoint: &Url) -> bool;
}

/// Aggregate outcome of a wait-for-healthy cycle
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub attempts: u32,

    /// The wait was cut short by an operator interrupt
    pub interrupted: bool,
}

/// Poll `endpoint` at a fixed interval until it reports healthy or the
/// budget elapses. Never fails on a single unhealthy probe; only the
/// aggregate outcome is reported.
pub async fn wait_healthy(
    probe: &dyn HealthProbe,
    endpoint: &Url,
    options: &ProbeOptions,
    shutdown: &mut broadcast::Receiver<()>,
) -> HealthReport {
    let deadline = Instant::now() + options.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe.probe(endpoint).await {
            return HealthReport {
                healthy: true,
                attempts,
                interrupted: false,
            };
        }
        debug!("probe {} of {} unhealthy", attempts, endpoint);

        if Instant::now() + options.interval > deadline {
            return HealthReport {
                healthy: false,
                attempts,
                interrupted: false,
            };
        }

        tokio::select! {
            _ = tokio::time::sleep(options.interval) => {}
            _ = interrupt_received(shutdown) => {
                return HealthReport {
                    healthy: false,
                    attempts,
                    interrupted: true,
                };
            }
        }
    }
}

/// Resolves when an interrupt arrives; pends forever on a closed channel
/// so a dropped sender cannot be mistaken for an interrupt.
async fn interrupt_received(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
