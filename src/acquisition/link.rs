//! Hardware link selection.

use async_trait::async_trait;
use freshtrack_core::{AppResult, FreshError, LineSource, LinkOpener};
use std::sync::Arc;

/// Opener used when the crate is built without serial support.
///
/// Every open fails, which drives the acquisition task into its retry cycle and
/// eventually into persistent simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLinkOpener;

#[async_trait]
impl LinkOpener for UnavailableLinkOpener {
    async fn open(&self, _path: &str, _baud_rate: u32) -> AppResult<Box<dyn LineSource>> {
        Err(FreshError::SerialFeatureDisabled)
    }
}

/// Opener for the real board: serial when the `serial` feature is enabled.
pub fn default_opener() -> Arc<dyn LinkOpener> {
    #[cfg(feature = "serial")]
    {
        Arc::new(freshtrack_core::serial::SerialLinkOpener)
    }
    #[cfg(not(feature = "serial"))]
    {
        Arc::new(UnavailableLinkOpener)
    }
}
