use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::io::AsyncWrite;

/// Sink for the diagnostic stream of a child process.
///
/// It keeps the first `limit` bytes and silently swallows the rest, so the child never blocks on a
/// full pipe however much it writes.
#[derive(Debug, Clone, Default)]
pub struct BoundedCapture {
    buf: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl BoundedCapture {
    const TRUNCATION_MARK: &str = "...";

    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(8 * 1024)),
            limit,
            truncated: false,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn push(&mut self, data: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&data[..data.len().min(room)]);
    }

    /// Captured text with surrounding whitespace trimmed, marked with `...` if something was dropped.
    pub fn into_text(self) -> String {
        let mut s = String::from_utf8_lossy(&self.buf).trim().to_owned();
        if self.truncated {
            s.push_str(Self::TRUNCATION_MARK);
        }
        s
    }
}

impl AsyncWrite for BoundedCapture {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().push(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
