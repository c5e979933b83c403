//! Component runtime boundary

pub mod compose;

use async_trait::async_trait;

use crate::errors::UpdateError;
use crate::models::component::Component;

/// Starts and stops deployable components.
///
/// Operations block until the runtime accepts them, not until the component
/// is healthy; readiness is the health probe's concern.
#[async_trait]
pub trait ComponentRuntime: Send + Sync {
    async fn start(&self, component: &Component) -> Result<(), UpdateError>;

    /// Stop a component. Must tolerate the component already being stopped.
    async fn stop(&self, component: &Component) -> Result<(), UpdateError>;

    /// Restart is stop followed by start
    async fn restart(&self, component: &Component) -> Result<(), UpdateError> {
        self.stop(component).await?;
        self.start(component).await
    }

    /// Whether the runtime responds at all (preflight check)
    async fn available(&self) -> bool;
}
