//! Assetto Corsa remote telemetry protocol
//!
//! The simulation listens on a loopback UDP port. A client identifies itself
//! with a handshake, receives a one-off identify response carrying the car,
//! driver and track names, then subscribes to a stream of car telemetry
//! frames sent once per physics step.
//!
//! # Usage
//!
//! ```rust,no_run
//! use trailbreak::protocol::UdpClient;
//! use trailbreak::provider::DatagramProvider;
//! use trailbreak::config::CaptureConfig;
//!
//! # async fn run() -> trailbreak::Result<()> {
//! let mut client = UdpClient::connect(&CaptureConfig::default()).await?;
//! while let Some(datagram) = client.next_datagram().await? {
//!     println!("{} bytes", datagram.len());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod codec;

pub use client::UdpClient;
pub use codec::{
    DEFAULT_TELEMETRY_PORT, FULL_IDENTIFY_RESPONSE_LEN, HANDSHAKE_LEN, HandshakeResponse,
    MIN_IDENTIFY_RESPONSE_LEN, Operation, PROTOCOL_IDENTIFIER, PROTOCOL_VERSION, UdpFrame,
    encode_handshake,
};
