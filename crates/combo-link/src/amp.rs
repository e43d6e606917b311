//! KPA500 power amplifier link adapter

use std::time::Duration;

use combo_protocol::{kpa500, AmpMode, Band};

use crate::ascii::AsciiLink;
use crate::{Exchange, LinkError, LinkIo, FAULT_NO_RESPONSE};

/// One serial connection to the power amplifier
pub struct AmpLink {
    link: AsciiLink,
}

impl AmpLink {
    /// Open a serial connection to the amplifier
    pub fn open(port: &str, baud: u32) -> Result<Self, LinkError> {
        Ok(Self {
            link: AsciiLink::open("amplifier", port, baud)?,
        })
    }

    /// Create an amplifier link over any I/O stream (used with simulated
    /// amplifiers)
    pub fn with_io<T: LinkIo + 'static>(io: T) -> Self {
        Self {
            link: AsciiLink::with_io("amplifier", io),
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

    /// Put the amplifier in standby or operate
    pub async fn set_mode(&self, mode: AmpMode) -> Result<Exchange<()>, LinkError> {
        self.link.send(&kpa500::set_mode(mode)).await
    }

    /// Select the amplifier's band
    pub async fn set_band(&self, band: Band) -> Result<Exchange<()>, LinkError> {
        self.link.send(&kpa500::set_band(band)).await
    }

    /// Query the current output power in watts; a silent amplifier yields 0
    pub async fn power(&self) -> Result<Exchange<u32>, LinkError> {
        match self
            .link
            .query(kpa500::POWER_QUERY, kpa500::POWER_PREFIX)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Ok(Exchange::Reply(0)),
            Exchange::Reply(Some(payload)) if payload.trim().is_empty() => {
                Ok(Exchange::Reply(0))
            }
            Exchange::Reply(Some(payload)) => Ok(Exchange::Reply(kpa500::parse_power(&payload)?)),
        }
    }

    /// Query the active fault identifier; zero means no fault
    ///
    /// A silent or disconnected amplifier yields
    /// [`FAULT_NO_RESPONSE`](crate::FAULT_NO_RESPONSE).
    pub async fn fault(&self) -> Result<Exchange<u8>, LinkError> {
        match self
            .link
            .query(kpa500::FAULT_QUERY, kpa500::FAULT_PREFIX)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Ok(Exchange::Reply(FAULT_NO_RESPONSE)),
            Exchange::Reply(Some(payload)) if payload.is_empty() => {
                Ok(Exchange::Reply(FAULT_NO_RESPONSE))
            }
            Exchange::Reply(Some(payload)) => Ok(Exchange::Reply(kpa500::parse_fault(&payload)?)),
        }
    }

    /// Query the PA supply, returning (volts, amps); a silent amplifier
    /// yields zeros
    pub async fn pa_supply(&self) -> Result<Exchange<(f64, f64)>, LinkError> {
        match self
            .link
            .query(kpa500::PA_SUPPLY_QUERY, kpa500::PA_SUPPLY_PREFIX)
            .await?
        {
            Exchange::Closed => Ok(Exchange::Closed),
            Exchange::Reply(None) => Ok(Exchange::Reply((0.0, 0.0))),
            Exchange::Reply(Some(payload)) if payload.trim().is_empty() => {
                Ok(Exchange::Reply((0.0, 0.0)))
            }
            Exchange::Reply(Some(payload)) => {
                Ok(Exchange::Reply(kpa500::parse_pa_supply(&payload)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn power_reply_takes_leading_watts() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = AmpLink::with_io(io);

        peer.write_all(b"^WS100 123;").await.unwrap();
        assert_eq!(link.power().await.unwrap(), Exchange::Reply(100));
    }

    #[tokio::test]
    async fn silent_amp_power_is_zero() {
        let (io, _peer) = tokio::io::duplex(256);
        let mut link = AmpLink::with_io(io);
        link.set_reply_timeout(Duration::from_millis(150));

        assert_eq!(link.power().await.unwrap(), Exchange::Reply(0));
    }

    #[tokio::test]
    async fn empty_fault_reply_is_no_response_sentinel() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = AmpLink::with_io(io);

        peer.write_all(b"^FL;").await.unwrap();
        assert_eq!(
            link.fault().await.unwrap(),
            Exchange::Reply(FAULT_NO_RESPONSE)
        );
    }

    #[tokio::test]
    async fn pa_supply_in_tenths() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = AmpLink::with_io(io);

        peer.write_all(b"^VI543 087;").await.unwrap();
        assert_eq!(link.pa_supply().await.unwrap(), Exchange::Reply((54.3, 8.7)));
    }

    #[tokio::test]
    async fn mode_and_band_commands_on_the_wire() {
        let (io, mut peer) = tokio::io::duplex(256);
        let link = AmpLink::with_io(io);

        link.set_mode(AmpMode::Operate).await.unwrap();
        link.set_band(Band::M20).await.unwrap();

        let mut buf = [0u8; 32];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"^OS1;^BN05;");
    }
}
