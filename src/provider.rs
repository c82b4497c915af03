//! Provider trait for datagram sources

use crate::Result;
use crate::types::RawDatagram;

/// Trait for telemetry datagram sources
///
/// The live implementation is [`UdpClient`](crate::protocol::UdpClient); tests
/// and replays supply scripted sources. Each source handles its own timing.
#[async_trait::async_trait]
pub trait DatagramProvider: Send + 'static {
    /// Receive the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - Datagram received (not yet validated)
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Receive failed; the caller backs off and retries
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>>;

    /// Identify response names, if the source performed a handshake.
    fn handshake(&self) -> Option<&crate::protocol::HandshakeResponse> {
        None
    }
}
