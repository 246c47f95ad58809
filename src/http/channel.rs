//! http::channel
//!
//! [`PushResponse`] that hands a blocking gateway's output to an async
//! response body.
//!
//! The head travels over a oneshot channel; body chunks travel over a bounded
//! channel so a slow client applies back-pressure to git. When the client
//! goes away the receiver is dropped and further writes fail with
//! `BrokenPipe`.

use std::io::{self, Write};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::gateway::{PushResponse, ResponseHead};

/// Body chunks as seen by the HTTP layer.
pub type BodyReceiver = mpsc::Receiver<io::Result<Bytes>>;

/// Blocking writer half of the body channel.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Channel-backed [`PushResponse`]. Must be used off the async runtime.
#[derive(Debug)]
pub struct ChannelResponse {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: ChannelWriter,
}

impl ChannelResponse {
    /// Create the response and the receivers for its head and body.
    pub fn new(capacity: usize) -> (Self, oneshot::Receiver<ResponseHead>, BodyReceiver) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity);
        let response = Self {
            head: Some(head_tx),
            body: ChannelWriter { tx: body_tx },
        };
        (response, head_rx, body_rx)
    }

    /// Whether the head has been sent.
    pub fn head_sent(&self) -> bool {
        self.head.is_none()
    }

    /// Abort a response whose head was already sent, so the client sees a
    /// truncated body instead of a clean end.
    pub fn fail(&mut self, message: &str) {
        if self.head_sent() {
            let _ = self.body.tx.blocking_send(Err(io::Error::other(message.to_string())));
        }
    }
}

impl PushResponse for ChannelResponse {
    fn send_head(&mut self, head: ResponseHead) -> io::Result<()> {
        let tx = self
            .head
            .take()
            .ok_or_else(|| io::Error::other("response head already sent"))?;
        tx.send(head)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }

    fn body(&mut self) -> &mut (dyn Write + Send) {
        &mut self.body
    }
}
