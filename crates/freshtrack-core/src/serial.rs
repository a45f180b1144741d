//! Serial Port Link for the Sensor Board
//!
//! This module opens the sensor board's serial port and exposes it as a
//! [`LineSource`](crate::link::LineSource).
//!
//! # Feature Flag
//!
//! This module requires the `serial` feature to be enabled:
//!
//! ```toml
//! [dependencies]
//! freshtrack-core = { path = "../freshtrack-core", features = ["serial"] }
//! ```

use crate::error::{AppResult, FreshError};
use crate::link::{LineSource, LinkOpener, ReaderLineSource};
use async_trait::async_trait;
use tokio::io::BufReader;

/// Open a serial port asynchronously using spawn_blocking.
///
/// Wraps the port opening in `spawn_blocking` to avoid blocking the async runtime
/// during port initialization. Standard settings are applied: 8N1, no flow control.
///
/// # Errors
///
/// Returns [`FreshError::ChannelOpen`] if the port cannot be opened or the blocking
/// task fails.
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
) -> AppResult<tokio_serial::SerialStream> {
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();

    spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| FreshError::ChannelOpen {
                path: port_path_owned.clone(),
                message: e.to_string(),
            })
    })
    .await
    .map_err(|e| FreshError::ChannelOpen {
        path: port_path.to_string(),
        message: format!("spawn_blocking for serial port opening failed: {}", e),
    })?
}

/// [`LinkOpener`] backed by a real serial port.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialLinkOpener;

#[async_trait]
impl LinkOpener for SerialLinkOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> AppResult<Box<dyn LineSource>> {
        let port = open_serial_async(path, baud_rate).await?;
        tracing::info!(port = path, baud_rate, "Serial port opened");
        Ok(Box::new(ReaderLineSource::new(BufReader::new(port))))
    }
}
