//! ECHONET Lite UDP Transport
//!
//! This module owns the UDP endpoint used to talk to ECHONET Lite devices.
//! The protocol runs over UDP on the well-known port 3610 with broadcast
//! capability; delivery is best-effort and the transport is a single-attempt
//! primitive. Retry policy belongs to callers.
//!
//! # Overview
//!
//! The transport handles:
//! - Binding one UDP socket on port 3610 (broadcast and reuse-address
//!   options applied before bind)
//! - Fire-and-forget datagram send
//! - Blocking receive with a timeout surfaced as a distinguishable
//!   [`TransportError::Timeout`] — a silent device is an expected,
//!   recoverable condition, not a fault
//!
//! # Example
//!
//! ```no_run
//! use echonet_lite_rs::transport::{EchonetTransport, TransportConfig};
//!
//! let mut transport = EchonetTransport::new(TransportConfig::default())?;
//! let (data, source) = transport.receive()?;
//! # Ok::<(), echonet_lite_rs::transport::TransportError>(())
//! ```

use std::{
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;

use crate::frame::{Frame, FrameError};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// ECHONET Lite specific constants
pub mod constants {
    use std::time::Duration;

    /// ECHONET Lite well-known UDP port
    pub const ECHONET_LITE_PORT: u16 = 3610;

    /// Default socket receive timeout
    pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);

    /// Default receive buffer size, comfortably above any conforming frame
    pub const DEFAULT_BUFFER_SIZE: usize = 2048;
}

/// Errors that can occur in transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// No datagram arrived within the receive timeout
    #[error("no datagram received within {0:?}")]
    Timeout(Duration),
    /// Frame codec failure while sending or receiving a [`Frame`]
    #[error("frame codec error: {0}")]
    Frame(#[from] FrameError),
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Local bind address
    pub bind_address: IpAddr,
    /// Local bind port
    pub port: u16,
    /// Enable broadcast send
    pub broadcast: bool,
    /// Allow sharing the port with other processes on this host
    pub reuse_address: bool,
    /// Default receive timeout
    pub recv_timeout: Duration,
    /// Receive buffer size
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: constants::ECHONET_LITE_PORT,
            broadcast: true,
            reuse_address: false,
            recv_timeout: constants::DEFAULT_RECV_TIMEOUT,
            buffer_size: constants::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Bind a UDP socket with the options applied before bind
///
/// Reuse-address must be set on the raw socket prior to binding, which
/// `std::net::UdpSocket` cannot express on its own.
pub(crate) fn bind_socket(
    bind_address: IpAddr,
    port: u16,
    broadcast: bool,
    reuse_address: bool,
) -> std::io::Result<UdpSocket> {
    let domain = match bind_address {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if reuse_address {
        socket.set_reuse_address(true)?;
    }
    if broadcast {
        socket.set_broadcast(true)?;
    }
    socket.bind(&SocketAddr::new(bind_address, port).into())?;
    Ok(socket.into())
}

/// Synchronous UDP transport bound to the ECHONET Lite port
pub struct EchonetTransport {
    /// UDP socket
    socket: UdpSocket,
    /// Receive buffer
    buffer: Vec<u8>,
    /// Configuration
    config: TransportConfig,
}

impl EchonetTransport {
    /// Create a new transport from a configuration
    pub fn new(config: TransportConfig) -> Result<Self> {
        let socket = bind_socket(
            config.bind_address,
            config.port,
            config.broadcast,
            config.reuse_address,
        )?;
        socket.set_read_timeout(Some(config.recv_timeout))?;
        let buffer = vec![0u8; config.buffer_size];
        Ok(Self {
            socket,
            buffer,
            config,
        })
    }

    /// Create with the default configuration (0.0.0.0:3610, broadcast on)
    pub fn new_default() -> Result<Self> {
        Self::new(TransportConfig::default())
    }

    /// Send raw frame bytes to a destination, fire-and-forget
    pub fn send(&self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket.send_to(data, dest)?;
        log::debug!("sent {} bytes to {}", data.len(), dest);
        Ok(())
    }

    /// Encode and send a frame
    pub fn send_frame(&self, frame: &Frame, dest: SocketAddr) -> Result<()> {
        self.send(&frame.encode()?, dest)
    }

    /// Receive one datagram, blocking up to the configured timeout
    pub fn receive(&mut self) -> Result<(Vec<u8>, SocketAddr)> {
        let timeout = self.config.recv_timeout;
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, source)) => {
                log::debug!("received {} bytes from {}", len, source);
                Ok((self.buffer[..len].to_vec(), source))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Err(TransportError::Timeout(timeout))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Receive one datagram with a custom timeout
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
        // Temporarily set socket timeout
        let original_timeout = self.socket.read_timeout()?;
        self.socket.set_read_timeout(Some(timeout))?;

        let result = match self.socket.recv_from(&mut self.buffer) {
            Ok((len, source)) => Ok((self.buffer[..len].to_vec(), source)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Err(TransportError::Timeout(timeout))
            }
            Err(e) => Err(e.into()),
        };

        // Restore original timeout
        self.socket.set_read_timeout(original_timeout)?;

        result
    }

    /// Receive and decode one frame, blocking up to the configured timeout
    pub fn receive_frame(&mut self) -> Result<(Frame, SocketAddr)> {
        let (data, source) = self.receive()?;
        Ok((Frame::decode(&data)?, source))
    }

    /// Get the configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Get the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
