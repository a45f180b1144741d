//! Line-oriented hardware link abstraction.
//!
//! The sensor board speaks newline-delimited text. A [`LinkOpener`] opens the
//! channel (`open(path, baud_rate)`), the returned [`LineSource`] yields lines until
//! the device goes away, and dropping the source closes the channel.
//!
//! Any `AsyncBufRead` can be used as a line source through [`ReaderLineSource`]:
//! - `BufReader<tokio_serial::SerialStream>` (real hardware, `serial` feature)
//! - `BufReader<tokio::io::DuplexStream>` (testing)

use crate::error::{AppResult, FreshError};
use crate::limits::MAX_LINE_LENGTH;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Stream of text lines from an open channel.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator.
    ///
    /// Returns `Ok(None)` when the channel was closed by the other side and
    /// `Err(FreshError::ChannelFault { .. })` on a channel-level error.
    async fn next_line(&mut self) -> AppResult<Option<String>>;
}

/// Opens the hardware channel.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Open `path` at `baud_rate`.
    ///
    /// # Errors
    ///
    /// [`FreshError::ChannelOpen`] when the device cannot be opened.
    async fn open(&self, path: &str, baud_rate: u32) -> AppResult<Box<dyn LineSource>>;
}

/// Adapts any buffered async reader into a [`LineSource`].
///
/// Lines longer than [`MAX_LINE_LENGTH`] are skipped up to the next newline and
/// reported as [`FreshError::Parse`], so a board streaming without terminators
/// cannot grow the buffer without bound.
pub struct ReaderLineSource<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R> ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(128),
        }
    }

    async fn skip_rest_of_line(&mut self) -> AppResult<()> {
        loop {
            let available = self
                .reader
                .fill_buf()
                .await
                .map_err(|e| FreshError::from_read_error(&e))?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.reader.consume(end + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }
}

#[async_trait]
impl<R> LineSource for ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        self.buffer.clear();
        let read = (&mut self.reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut self.buffer)
            .await
            .map_err(|e| FreshError::from_read_error(&e))?;
        if read == 0 {
            return Ok(None);
        }
        if read == MAX_LINE_LENGTH && self.buffer.last() != Some(&b'\n') {
            self.skip_rest_of_line().await?;
            let preview = String::from_utf8_lossy(&self.buffer[..32]).into_owned();
            return Err(FreshError::Parse {
                line: preview,
                reason: format!("line exceeds {} bytes", MAX_LINE_LENGTH),
            });
        }
        // Lossy decode: a corrupted byte should cost one line, not the channel.
        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
