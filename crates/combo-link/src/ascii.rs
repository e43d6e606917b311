//! Shared exchange machinery for the `;`-terminated ASCII links
//!
//! The tuner and amplifier adapters are thin wrappers over this: write a
//! command, then (for queries) read messages until one echoes the command
//! prefix. Replies to other in-flight traffic are skipped, not errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use combo_protocol::LineCodec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::trace;

use crate::{Exchange, LinkError, LinkIo};

const READ_TICK: Duration = Duration::from_millis(100);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct AsciiLink {
    inner: Mutex<Inner>,
    closed: AtomicBool,
    device: &'static str,
    reply_timeout: Duration,
}

struct Inner {
    io: Box<dyn LinkIo>,
    codec: LineCodec,
    scratch: Vec<u8>,
}

enum ReadMessage {
    Message(String),
    Closed,
    TimedOut,
}

impl AsciiLink {
    pub(crate) fn open(device: &'static str, port: &str, baud: u32) -> Result<Self, LinkError> {
        let stream = tokio_serial::new(port, baud)
            .timeout(READ_TICK)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                port: port.to_string(),
                source,
            })?;

        Ok(Self::with_io(device, stream))
    }

    pub(crate) fn with_io<T: LinkIo + 'static>(device: &'static str, io: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                io: Box::new(io),
                codec: LineCodec::new(),
                scratch: vec![0u8; 256],
            }),
            closed: AtomicBool::new(false),
            device,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub(crate) fn set_reply_timeout(&mut self, reply_timeout: Duration) {
        self.reply_timeout = reply_timeout;
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Write a command that gets no reply
    pub(crate) async fn send(&self, msg: &str) -> Result<Exchange<()>, LinkError> {
        let mut inner = self.inner.lock().await;

        if self.is_closed() {
            return Ok(Exchange::Closed);
        }

        trace!(device = self.device, msg, "send");
        self.write_bytes(&mut inner, msg.as_bytes()).await
    }

    /// Write a query and wait for the reply echoing `prefix`
    ///
    /// `Reply(None)` means the device stayed silent past the reply deadline;
    /// the per-device wrappers map that to their sentinel values. The
    /// returned payload has the echoed prefix stripped.
    pub(crate) async fn query(
        &self,
        cmd: &str,
        prefix: &str,
    ) -> Result<Exchange<Option<String>>, LinkError> {
        self.query_with_timeout(cmd, prefix, self.reply_timeout).await
    }

    pub(crate) async fn query_with_timeout(
        &self,
        cmd: &str,
        prefix: &str,
        reply_timeout: Duration,
    ) -> Result<Exchange<Option<String>>, LinkError> {
        let mut inner = self.inner.lock().await;

        if self.is_closed() {
            return Ok(Exchange::Closed);
        }

        if self
            .write_bytes(&mut inner, cmd.as_bytes())
            .await?
            .is_closed()
        {
            return Ok(Exchange::Closed);
        }

        let deadline = Instant::now() + reply_timeout;
        loop {
            match self.read_message(&mut inner, deadline).await? {
                ReadMessage::Closed => return Ok(Exchange::Closed),
                ReadMessage::TimedOut => return Ok(Exchange::Reply(None)),
                ReadMessage::Message(msg) => {
                    trace!(device = self.device, msg, "recv");
                    if let Some(payload) = msg.strip_prefix(prefix) {
                        return Ok(Exchange::Reply(Some(payload.to_string())));
                    }
                    // Reply to something else on the wire; keep reading
                }
            }
        }
    }

    async fn read_message(
        &self,
        inner: &mut Inner,
        deadline: Instant,
    ) -> Result<ReadMessage, LinkError> {
        loop {
            if let Some(msg) = inner.codec.next_message() {
                return Ok(ReadMessage::Message(msg));
            }
            if self.is_closed() {
                return Ok(ReadMessage::Closed);
            }
            if Instant::now() >= deadline {
                return Ok(ReadMessage::TimedOut);
            }

            let Inner { io, codec, scratch } = inner;
            match timeout(READ_TICK, io.read(scratch.as_mut_slice())).await {
                // Tick elapsed; loop to re-check the closed flag
                Err(_) => continue,
                // EOF only happens on in-memory streams; pace the retry
                Ok(Ok(0)) => tokio::time::sleep(READ_TICK).await,
                Ok(Ok(n)) => codec.push_bytes(&scratch[..n]),
                Ok(Err(e)) => {
                    if self.is_closed() {
                        return Ok(ReadMessage::Closed);
                    }
                    return Err(e.into());
                }
            }
        }
    }

    async fn write_bytes(
        &self,
        inner: &mut Inner,
        bytes: &[u8],
    ) -> Result<Exchange<()>, LinkError> {
        let result = timeout(WRITE_TIMEOUT, async {
            inner.io.write_all(bytes).await?;
            inner.io.flush().await
        })
        .await;

        if self.is_closed() {
            return Ok(Exchange::Closed);
        }
        match result {
            Err(_) => Err(LinkError::Timeout(WRITE_TIMEOUT)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(())) => Ok(Exchange::Reply(())),
        }
    }
}
