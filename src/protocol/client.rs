//! UDP session with the simulation

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use super::codec::{HandshakeResponse, Operation, encode_handshake};
use crate::config::CaptureConfig;
use crate::provider::DatagramProvider;
use crate::types::RawDatagram;
use crate::{Result, TelemetryError};

/// Largest datagram the simulation sends is well under this.
const RECEIVE_BUFFER_LEN: usize = 2048;

/// Connected, subscribed remote telemetry session.
///
/// Dropping the client sends a best-effort dismiss packet; the socket itself
/// is closed by its own `Drop`.
pub struct UdpClient {
    socket: UdpSocket,
    remote: SocketAddr,
    handshake: HandshakeResponse,
    buf: Box<[u8; RECEIVE_BUFFER_LEN]>,
}

impl std::fmt::Debug for UdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpClient")
            .field("remote", &self.remote)
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

impl UdpClient {
    /// Bind, connect, identify and subscribe.
    ///
    /// Fails with [`TelemetryError::Timeout`] if no identify response arrives
    /// within the configured timeout, or [`TelemetryError::Connection`] on a
    /// socket error.
    pub async fn connect(config: &CaptureConfig) -> Result<Self> {
        let remote = config.sim_address;
        trace!(%remote, bind = %config.bind_address, "Opening telemetry socket");

        let socket = UdpSocket::bind(config.bind_address).await.map_err(|e| {
            TelemetryError::connection_failed_with_source(
                format!("bind {}", config.bind_address),
                Box::new(e),
            )
        })?;
        socket.connect(remote).await.map_err(|e| {
            TelemetryError::connection_failed_with_source(format!("connect {}", remote), Box::new(e))
        })?;

        let mut client = Self {
            socket,
            remote,
            handshake: HandshakeResponse::default(),
            buf: Box::new([0u8; RECEIVE_BUFFER_LEN]),
        };

        client.handshake = client.identify(config).await?;
        client.send_operation(Operation::SubscribeUpdate).await?;

        info!(
            %remote,
            car = client.handshake.car_name.as_deref().unwrap_or("-"),
            track = client.handshake.track_name.as_deref().unwrap_or("-"),
            "Subscribed to remote telemetry"
        );
        Ok(client)
    }

    async fn identify(&mut self, config: &CaptureConfig) -> Result<HandshakeResponse> {
        self.send_operation(Operation::Handshake).await?;

        let timeout = config.handshake_timeout();
        let len = match tokio::time::timeout(timeout, self.socket.recv(&mut self.buf[..])).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                return Err(TelemetryError::connection_failed_with_source(
                    "identify response",
                    Box::new(e),
                ));
            }
            Err(_) => return Err(TelemetryError::Timeout { duration: timeout }),
        };

        match HandshakeResponse::parse(&self.buf[..len]) {
            Ok(response) => {
                debug!(?response, "Identify response decoded");
                Ok(response)
            }
            Err(e) => {
                warn!(len, error = %e, "Identify response carries no usable names");
                Ok(HandshakeResponse::default())
            }
        }
    }

    async fn send_operation(&self, operation: Operation) -> Result<()> {
        trace!(?operation, "Sending handshake packet");
        self.socket.send(&encode_handshake(operation)).await.map_err(|e| {
            TelemetryError::connection_failed_with_source(
                format!("send {:?}", operation),
                Box::new(e),
            )
        })?;
        Ok(())
    }

    /// Remote endpoint of this session.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| TelemetryError::io_error("local_addr", e))
    }
}

#[async_trait::async_trait]
impl DatagramProvider for UdpClient {
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>> {
        let len = self
            .socket
            .recv(&mut self.buf[..])
            .await
            .map_err(|e| TelemetryError::io_error("telemetry receive", e))?;
        Ok(Some(RawDatagram::from(&self.buf[..len])))
    }

    fn handshake(&self) -> Option<&HandshakeResponse> {
        Some(&self.handshake)
    }
}

impl Drop for UdpClient {
    fn drop(&mut self) {
        match self.socket.try_send(&encode_handshake(Operation::Dismiss)) {
            Ok(_) => debug!(remote = %self.remote, "Dismissed telemetry session"),
            Err(e) => debug!(error = %e, "Dismiss packet not sent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::write_wide_string;
    use crate::protocol::{FULL_IDENTIFY_RESPONSE_LEN, HANDSHAKE_LEN, UdpFrame};
    use std::time::Duration;

    async fn fake_simulation() -> (UdpSocket, CaptureConfig) {
        let sim = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = CaptureConfig {
            sim_address: sim.local_addr().unwrap(),
            bind_address: "127.0.0.1:0".parse().unwrap(),
            handshake_timeout_ms: 500,
            ..Default::default()
        };
        (sim, config)
    }

    async fn expect_operation(sim: &UdpSocket) -> (i32, SocketAddr) {
        let mut buf = [0u8; 64];
        let (len, peer) =
            tokio::time::timeout(Duration::from_secs(2), sim.recv_from(&mut buf)).await.unwrap().unwrap();
        assert_eq!(len, HANDSHAKE_LEN);
        assert_eq!(&buf[0..8], &[1, 0, 0, 0, 1, 0, 0, 0]);
        (i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]), peer)
    }

    #[tokio::test]
    async fn handshake_subscribe_receive_dismiss() {
        let _ = tracing_subscriber::fmt::try_init();
        let (sim, config) = fake_simulation().await;

        let sim_task = tokio::spawn(async move {
            let (op, peer) = expect_operation(&sim).await;
            assert_eq!(op, 0);

            let mut response = vec![0u8; FULL_IDENTIFY_RESPONSE_LEN];
            write_wide_string(&mut response, 0, 50, "ks_bmw_m3_e30");
            write_wide_string(&mut response, 100, 50, "Test Driver");
            write_wide_string(&mut response, 208, 50, "magione");
            sim.send_to(&response, peer).await.unwrap();

            let (op, _) = expect_operation(&sim).await;
            assert_eq!(op, 1);

            let frame = UdpFrame { speed_kmh: 120.0, lap_count: 2, ..Default::default() };
            sim.send_to(&frame.encode(), peer).await.unwrap();

            let (op, _) = expect_operation(&sim).await;
            assert_eq!(op, 3, "drop sends dismiss");
        });

        let mut client = UdpClient::connect(&config).await.unwrap();
        let handshake = client.handshake().cloned().unwrap();
        assert_eq!(handshake.car_name.as_deref(), Some("Ks Bmw M3 E30"));
        assert_eq!(handshake.driver_name.as_deref(), Some("Test Driver"));
        assert_eq!(handshake.track_name.as_deref(), Some("Magione"));

        let datagram = client.next_datagram().await.unwrap().unwrap();
        assert!(datagram.is_telemetry());
        assert_eq!(UdpFrame::decode(&datagram).unwrap().speed_kmh, 120.0);

        drop(client);
        sim_task.await.unwrap();
    }

    #[tokio::test]
    async fn silent_simulation_times_out() {
        let (_sim, config) = fake_simulation().await;
        let config = CaptureConfig { handshake_timeout_ms: 50, ..config };

        let err = UdpClient::connect(&config).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Timeout { .. }), "got {:?}", err);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn short_identify_response_is_not_fatal() {
        let (sim, config) = fake_simulation().await;

        tokio::spawn(async move {
            let (_, peer) = expect_operation(&sim).await;
            sim.send_to(&[0u8; 16], peer).await.unwrap();
            let _ = expect_operation(&sim).await;
        });

        let client = UdpClient::connect(&config).await.unwrap();
        assert_eq!(client.handshake(), Some(&HandshakeResponse::default()));
    }
}
