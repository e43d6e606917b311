//! KAT500 antenna tuner link adapter

use std::time::Duration;

use combo_protocol::kat500;

use crate::ascii::AsciiLink;
use crate::{Exchange, LinkError, LinkIo, FAULT_NO_RESPONSE};

/// A full tune can take the tuner many relay steps
const TUNE_TIMEOUT: Duration = Duration::from_secs(30);

/// One serial connection to the antenna tuner
pub struct TunerLink {
    link: AsciiLink,
}

impl TunerLink {
    /// Open a serial connection to the tuner
    pub fn open(port: &str, baud: u32) -> Result<Self, LinkError> {
        Ok(Self {
            link: AsciiLink::open("tuner", port, baud)?,
        })
    }

    /// Create a tuner link over any I/O stream (used with simulated tuners)
    pub fn with_io<T: LinkIo + 'static>(io: T) -> Self {
        Self {
            link: AsciiLink::with_io("tuner", io),
        }
    }

    /// Override the query reply deadline (mostly for tests)
    pub fn set_reply_timeout(&mut self, reply_timeout: Duration) {
        self.link.set_reply_timeout(reply_timeout);
    }

    /// Mark the link closed, unblocking any exchange in flight
    pub fn close(&self) {
        self.link.close();
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Tell the tuner the operating frequency (it wants kHz)
    pub async fn set_frequency(&self, hz: u64) -> Result<Exchange<()>, LinkError> {
        self.link.send(&kat500::set_frequency(hz)).await
    }

    /// Query the active fault identifier; zero means no fault
    ///
    /// A silent or disconnected tuner yields [`FAULT_NO_RESPONSE`], not an
    /// error, so polling continues.
    pub async fn fault(&self) -> Result<Exchange<u8>, LinkError> {
        match self
            .link
            .query(kat500::FAULT_QUERY, kat500::FAULT_PREFIX)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Ok(Exchange::Reply(FAULT_NO_RESPONSE)),
            Exchange::Reply(Some(payload)) if payload.is_empty() => {
                Ok(Exchange::Reply(FAULT_NO_RESPONSE))
            }
            Exchange::Reply(Some(payload)) => Ok(Exchange::Reply(kat500::parse_fault(&payload)?)),
        }
    }

    /// Query the last measured VSWR; a silent tuner yields 0.0
    pub async fn vswr(&self) -> Result<Exchange<f64>, LinkError> {
        match self
            .link
            .query(kat500::VSWR_QUERY, kat500::VSWR_PREFIX)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Ok(Exchange::Reply(0.0)),
            Exchange::Reply(Some(payload)) if payload.trim().is_empty() => {
                Ok(Exchange::Reply(0.0))
            }
            Exchange::Reply(Some(payload)) => Ok(Exchange::Reply(kat500::parse_vswr(&payload)?)),
        }
    }

    /// Start a full tune cycle and wait for the tuner's acknowledgment
    pub async fn full_tune(&self) -> Result<Exchange<()>, LinkError> {
        match self
            .link
            .query_with_timeout(kat500::FULL_TUNE, kat500::FULL_TUNE_PREFIX, TUNE_TIMEOUT)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Err(LinkError::Timeout(TUNE_TIMEOUT)),
            Exchange::Reply(Some(_)) => Ok(Exchange::Reply(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn fault_reply_parses_code() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        peer.write_all(b"FLT5;").await.unwrap();
        assert_eq!(link.fault().await.unwrap(), Exchange::Reply(5));
    }

    #[tokio::test]
    async fn empty_fault_reply_is_no_response_sentinel() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        peer.write_all(b"FLT;").await.unwrap();
        assert_eq!(
            link.fault().await.unwrap(),
            Exchange::Reply(FAULT_NO_RESPONSE)
        );
    }

    #[tokio::test]
    async fn silent_tuner_is_no_response_sentinel() {
        let (io, _peer) = tokio::io::duplex(256);
        let mut link = TunerLink::with_io(io);
        link.set_reply_timeout(Duration::from_millis(150));

        assert_eq!(
            link.fault().await.unwrap(),
            Exchange::Reply(FAULT_NO_RESPONSE)
        );
    }

    #[tokio::test]
    async fn vswr_reply_with_space() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        peer.write_all(b"VSWR 1.32;").await.unwrap();
        assert_eq!(link.vswr().await.unwrap(), Exchange::Reply(1.32));
    }

    #[tokio::test]
    async fn unrelated_replies_are_skipped() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        // A stale VSWR reply sits in the buffer ahead of ours
        peer.write_all(b"VSWR 2.10;FLT0;").await.unwrap();
        assert_eq!(link.fault().await.unwrap(), Exchange::Reply(0));
    }

    #[tokio::test]
    async fn set_frequency_sends_khz() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        link.set_frequency(14_250_000).await.unwrap();

        let mut buf = [0u8; 32];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"F 14250;");
    }

    #[tokio::test]
    async fn malformed_fault_is_error() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = TunerLink::with_io(io);

        peer.write_all(b"FLTxyz;").await.unwrap();
        assert!(matches!(link.fault().await, Err(LinkError::Malformed(_))));
    }
}
