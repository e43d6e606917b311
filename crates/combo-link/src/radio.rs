//! Icom CI-V radio link adapter
//!
//! The radio is connected twice (monitor port and command port); both sides
//! use this adapter. The monitor side reads the frequency-broadcast stream,
//! the command side issues directed RF-power commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use combo_protocol::civ::{self, CivCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use crate::{Exchange, LinkError, LinkIo};

/// Read tick while waiting for data, so the closed flag is re-checked often
const READ_TICK: Duration = Duration::from_millis(100);
/// Writes are a handful of bytes; anything slower means the port is wedged
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default deadline for the directed acknowledgment of a power command
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one frequency poll on the monitor link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyPoll {
    /// The radio reported its operating frequency
    Frequency(u64),
    /// The frame on the bus was unrelated traffic
    NoUpdate,
    /// The link was closed while waiting
    Closed,
}

/// One serial connection to the radio
pub struct RadioLink {
    inner: Mutex<Inner>,
    closed: AtomicBool,
    address: u8,
    ack_timeout: Duration,
}

struct Inner {
    io: Box<dyn LinkIo>,
    codec: CivCodec,
    scratch: Vec<u8>,
    /// One-time frequency poll already sent
    queried: bool,
}

enum ReadFrame {
    Frame(Vec<u8>),
    Closed,
    TimedOut,
}

impl RadioLink {
    /// Open a serial connection to the radio
    pub fn open(port: &str, baud: u32, address: u8) -> Result<Self, LinkError> {
        let stream = tokio_serial::new(port, baud)
            .timeout(READ_TICK)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                port: port.to_string(),
                source,
            })?;

        Ok(Self::with_io(stream, address))
    }

    /// Create a radio link over any I/O stream (used with simulated radios)
    pub fn with_io<T: LinkIo + 'static>(io: T, address: u8) -> Self {
        Self {
            inner: Mutex::new(Inner {
                io: Box::new(io),
                codec: CivCodec::new(),
                scratch: vec![0u8; 256],
                queried: false,
            }),
            closed: AtomicBool::new(false),
            address,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// The radio's CI-V address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Override the acknowledgment deadline (mostly for tests)
    pub fn set_ack_timeout(&mut self, ack_timeout: Duration) {
        self.ack_timeout = ack_timeout;
    }

    /// Mark the link closed, unblocking any exchange in flight
    ///
    /// The port itself is released when the link is dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for the next operating-frequency report
    ///
    /// Sends the one-shot frequency query on first use; afterwards the radio
    /// pushes broadcast frames on every dial change. Frames that are not
    /// frequency broadcasts yield [`FrequencyPoll::NoUpdate`]: the bus also
    /// carries unrelated traffic, so that is not an error.
    pub async fn poll_frequency(&self) -> Result<FrequencyPoll, LinkError> {
        let mut inner = self.inner.lock().await;

        if self.is_closed() {
            return Ok(FrequencyPoll::Closed);
        }

        if !inner.queried {
            let query = civ::query_frequency(self.address);
            if self.write_bytes(&mut inner, &query).await?.is_closed() {
                return Ok(FrequencyPoll::Closed);
            }
            inner.queried = true;
        }

        match self.read_frame(&mut inner, None).await? {
            ReadFrame::Closed | ReadFrame::TimedOut => Ok(FrequencyPoll::Closed),
            ReadFrame::Frame(frame) => Ok(match civ::parse_frequency_broadcast(&frame) {
                Some(hz) => FrequencyPoll::Frequency(hz),
                None => FrequencyPoll::NoUpdate,
            }),
        }
    }

    /// Set the radio's RF power as a percentage (0-100) of full drive
    ///
    /// Blocks for the directed acknowledgment; a reject status from the
    /// radio is [`LinkError::Rejected`].
    pub async fn set_rf_power(&self, percent: u8) -> Result<Exchange<()>, LinkError> {
        let mut inner = self.inner.lock().await;

        if self.is_closed() {
            return Ok(Exchange::Closed);
        }

        let level = civ::percent_to_level(percent);
        debug!(percent, level, "setting radio RF power");

        let command = civ::set_rf_power(self.address, level);
        if self.write_bytes(&mut inner, &command).await?.is_closed() {
            return Ok(Exchange::Closed);
        }

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            match self.read_frame(&mut inner, Some(deadline)).await? {
                ReadFrame::Closed => return Ok(Exchange::Closed),
                ReadFrame::TimedOut => return Err(LinkError::Timeout(self.ack_timeout)),
                ReadFrame::Frame(frame) => match civ::parse_directed_ack(&frame) {
                    Some(true) => return Ok(Exchange::Reply(())),
                    Some(false) => return Err(LinkError::Rejected),
                    // Unrelated broadcast traffic; keep waiting for our ack
                    None => continue,
                },
            }
        }
    }

    async fn read_frame(
        &self,
        inner: &mut Inner,
        deadline: Option<Instant>,
    ) -> Result<ReadFrame, LinkError> {
        loop {
            if let Some(frame) = inner.codec.next_frame() {
                return Ok(ReadFrame::Frame(frame));
            }
            if self.is_closed() {
                return Ok(ReadFrame::Closed);
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Ok(ReadFrame::TimedOut);
                }
            }

            let Inner {
                io, codec, scratch, ..
            } = inner;
            match timeout(READ_TICK, io.read(scratch.as_mut_slice())).await {
                // Tick elapsed; loop to re-check the closed flag
                Err(_) => continue,
                // EOF only happens on in-memory streams; pace the retry
                Ok(Ok(0)) => tokio::time::sleep(READ_TICK).await,
                Ok(Ok(n)) => codec.push_bytes(&scratch[..n]),
                Ok(Err(e)) => {
                    if self.is_closed() {
                        return Ok(ReadFrame::Closed);
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn first_poll_sends_one_query() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = RadioLink::with_io(io, 0x94);

        // Queue two broadcasts so both polls complete without blocking
        peer.write_all(&civ::frequency_broadcast(0x94, 14_250_000))
            .await
            .unwrap();
        peer.write_all(&civ::frequency_broadcast(0x94, 7_074_000))
            .await
            .unwrap();

        assert_eq!(
            link.poll_frequency().await.unwrap(),
            FrequencyPoll::Frequency(14_250_000)
        );
        assert_eq!(
            link.poll_frequency().await.unwrap(),
            FrequencyPoll::Frequency(7_074_000)
        );

        // Exactly one query frame went out, on the first poll only
        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], civ::query_frequency(0x94).as_slice());
    }

    #[tokio::test]
    async fn unrelated_frame_is_no_update() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = RadioLink::with_io(io, 0x94);

        peer.write_all(&civ::directed_ack(0x94, true)).await.unwrap();
        assert_eq!(link.poll_frequency().await.unwrap(), FrequencyPoll::NoUpdate);
    }

    #[tokio::test]
    async fn close_unblocks_pending_poll() {
        let (io, peer) = tokio::io::duplex(64);
        let link = Arc::new(RadioLink::with_io(io, 0x94));

        let poller = {
            let link = link.clone();
            tokio::spawn(async move { link.poll_frequency().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        link.close();

        let polled = tokio::time::timeout(Duration::from_millis(500), poller)
            .await
            .expect("poll did not unblock")
            .unwrap()
            .unwrap();
        assert_eq!(polled, FrequencyPoll::Closed);
        drop(peer);
    }

    #[tokio::test]
    async fn set_rf_power_waits_for_ack() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = RadioLink::with_io(io, 0x94);

        peer.write_all(&civ::directed_ack(0x94, true)).await.unwrap();
        assert_eq!(link.set_rf_power(30).await.unwrap(), Exchange::Reply(()));

        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], civ::set_rf_power(0x94, 77).as_slice());
    }

    #[tokio::test]
    async fn set_rf_power_reject_is_error() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = RadioLink::with_io(io, 0x94);

        peer.write_all(&civ::directed_ack(0x94, false)).await.unwrap();
        assert!(matches!(
            link.set_rf_power(30).await,
            Err(LinkError::Rejected)
        ));
    }

    #[tokio::test]
    async fn set_rf_power_times_out_without_ack() {
        let (io, _peer) = tokio::io::duplex(256);
        let mut link = RadioLink::with_io(io, 0x94);
        link.set_ack_timeout(Duration::from_millis(150));

        assert!(matches!(
            link.set_rf_power(30).await,
            Err(LinkError::Timeout(_))
        ));
    }
}
