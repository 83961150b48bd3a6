//! A connection's outbound frame buffer.
//!
//! Under tokio's fully-async `AsyncWrite`, `write_all` already suspends
//! the task until the kernel accepts every byte, so there is no
//! partial-send state to carry between polls. `Connection` writes frames
//! straight through its writer; `flush` exists for the write loop's first
//! step (drain anything left over before building the next batch) and is
//! currently always a no-op, since nothing in this crate enqueues a frame
//! here instead of writing it directly.

use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Default)]
pub struct SendQueue {
    buf: Vec<u8>,
}

impl SendQueue {
    pub fn new() -> Self {
        SendQueue::default()
    }

    /// Writes everything queued, in order, and clears the queue.
    pub async fn flush<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> std::io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.buf).await?;
        self.buf.clear();
        Ok(())
    }
}
