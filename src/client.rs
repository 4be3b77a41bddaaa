//! ECHONET Lite Client Utilities
//!
//! This module provides a high-level query session for talking to one
//! ECHONET Lite device: property reads, confirmed and unconfirmed writes,
//! property-map reads and report-row generation.
//!
//! The session owns the transaction-id counter. Ids are allocated
//! sequentially, wrap at 65536 and never take the reserved "no transaction"
//! value. Responses are matched to requests by transaction id; frames with a
//! foreign id are skipped until the response timeout elapses.
//!
//! The three failure families stay distinguishable for callers:
//! [`ClientError::Transport`] with a timeout inside means no data arrived,
//! [`ClientError::Frame`] means undecodable bytes arrived, and
//! [`ClientError::Rejected`] carries the full error-response frame when the
//! device refused the operation.

use std::{
    collections::BTreeSet,
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    frame::{EchonetObject, Esv, Frame, FrameError, Property, TID_NONE},
    property::ReportRow,
    property_map::{decode_property_map, PropertyMapError, PropertyMapVariant},
    transport::{constants::ECHONET_LITE_PORT, EchonetTransport, TransportConfig, TransportError},
};

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur in client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure, including receive timeouts
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A received datagram could not be decoded
    #[error("frame codec error: {0}")]
    Frame(#[from] FrameError),
    /// A property map payload could not be decoded
    #[error("property map error: {0}")]
    PropertyMap(#[from] PropertyMapError),
    /// The device answered with an error-class ESV; the full response frame
    /// is carried so header and object codes stay inspectable
    #[error("device {} rejected the request ({})", .0.seoj, .0.esv)]
    Rejected(Frame),
    /// The response did not carry the requested property
    #[error("EPC 0x{epc:02X} missing from response")]
    PropertyMissing {
        /// The property code that was requested
        epc: u8,
    },
    /// The EPC is not one of the property-map properties
    #[error("EPC 0x{0:02X} is not a property map")]
    NotAPropertyMap(u8),
    /// The target address string could not be parsed
    #[error("invalid device address: {0}")]
    InvalidAddress(String),
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target device port
    pub port: u16,
    /// Source object code used in requests
    pub seoj: EchonetObject,
    /// Destination object code used in requests
    pub deoj: EchonetObject,
    /// How long to wait for a matching response
    pub response_timeout: Duration,
    /// Local transport configuration
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: ECHONET_LITE_PORT,
            seoj: EchonetObject::CONTROLLER,
            deoj: EchonetObject::SOLAR_POWER,
            response_timeout: Duration::from_secs(2),
            transport: TransportConfig::default(),
        }
    }
}

/// High-level session for querying one ECHONET Lite device
pub struct EchonetClient {
    transport: EchonetTransport,
    target: SocketAddr,
    seoj: EchonetObject,
    deoj: EchonetObject,
    response_timeout: Duration,
    next_tid: u16,
}

impl EchonetClient {
    /// Connect to a device address with the default configuration
    ///
    /// `address` is the device IP as a string, as supplied by configuration.
    pub fn connect(address: &str) -> Result<Self> {
        Self::with_config(address, ClientConfig::default())
    }

    /// Connect to a device address with a custom configuration
    pub fn with_config(address: &str, config: ClientConfig) -> Result<Self> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| ClientError::InvalidAddress(address.into()))?;
        let transport = EchonetTransport::new(config.transport)?;
        Ok(Self {
            transport,
            target: SocketAddr::new(ip, config.port),
            seoj: config.seoj,
            deoj: config.deoj,
            response_timeout: config.response_timeout,
            next_tid: 1,
        })
    }

    /// The device address this session talks to
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Allocate the next transaction id, skipping the reserved placeholder
    fn allocate_tid(&mut self) -> u16 {
        let tid = self.next_tid;
        self.next_tid = self.next_tid.wrapping_add(1);
        if self.next_tid == TID_NONE {
            self.next_tid = 1;
        }
        tid
    }

    /// Send one request and wait for the response with the same id
    fn transact(&mut self, esv: Esv, epc: u8, edt: Vec<u8>) -> Result<Frame> {
        let tid = self.allocate_tid();
        let request = Frame::request(tid, self.seoj, self.deoj, esv, epc, edt);
        self.transport.send(&request.encode()?, self.target)?;
        log::debug!("request TID={} ESV={} EPC=0x{:02X}", tid, esv, epc);

        let deadline = Instant::now() + self.response_timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout(self.response_timeout).into());
            }
            let (data, source) = self.transport.receive_timeout(deadline - now)?;
            let frame = Frame::decode(&data)?;
            if frame.tid != tid || frame.esv.is_request() {
                // Traffic for someone else, or our own broadcast echoing back.
                log::debug!("skipping frame TID={} ESV={} from {}", frame.tid, frame.esv, source);
                continue;
            }
            if frame.rejection().is_some() {
                return Err(ClientError::Rejected(frame));
            }
            return Ok(frame);
        }
    }

    /// Read one property (Get, 0x62)
    pub fn read_property(&mut self, epc: u8) -> Result<Property> {
        let response = self.transact(Esv::Get, epc, Vec::new())?;
        response
            .property(epc)
            .cloned()
            .ok_or(ClientError::PropertyMissing { epc })
    }

    /// Write one property and wait for the confirmation (SetC, 0x61)
    pub fn write_property(&mut self, epc: u8, edt: Vec<u8>) -> Result<Property> {
        let response = self.transact(Esv::SetC, epc, edt)?;
        response
            .property(epc)
            .cloned()
            .ok_or(ClientError::PropertyMissing { epc })
    }

    /// Write one property without waiting for a response (SetI, 0x60)
    pub fn write_property_no_confirm(&mut self, epc: u8, edt: Vec<u8>) -> Result<()> {
        let tid = self.allocate_tid();
        let request = Frame::request(tid, self.seoj, self.deoj, Esv::SetI, epc, edt);
        self.transport.send(&request.encode()?, self.target)?;
        Ok(())
    }

    /// Read and decode a property map (EPC 0x9D, 0x9E or 0x9F)
    ///
    /// The bitmap variant is selected by the queried EPC; the payload alone
    /// cannot distinguish the two mappings.
    pub fn read_property_map(&mut self, map_epc: u8) -> Result<BTreeSet<u8>> {
        let variant =
            PropertyMapVariant::from_epc(map_epc).ok_or(ClientError::NotAPropertyMap(map_epc))?;
        let property = self.read_property(map_epc)?;
        Ok(decode_property_map(&property.edt, variant)?)
    }

    /// Query a list of EPCs and build report rows
    ///
    /// A property that times out or fails to decode becomes a "No response"
    /// row; the report is always complete.
    pub fn property_report(&mut self, epcs: &[u8]) -> Vec<ReportRow> {
        epcs.iter()
            .map(|&epc| match self.read_property(epc) {
                Ok(property) => ReportRow::new(epc, Some(&property.edt)),
                Err(e) => {
                    log::debug!("no data for EPC 0x{:02X}: {}", epc, e);
                    ReportRow::new(epc, None)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread;

    fn loopback_transport() -> TransportConfig {
        TransportConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            broadcast: false,
            ..Default::default()
        }
    }

    fn test_client(device_port: u16, timeout_ms: u64) -> EchonetClient {
        EchonetClient::with_config(
            "127.0.0.1",
            ClientConfig {
                port: device_port,
                response_timeout: Duration::from_millis(timeout_ms),
                transport: loopback_transport(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    /// Run a one-shot fake device answering the first decodable request.
    fn spawn_device<F>(respond: F) -> u16
    where
        F: FnOnce(Frame) -> Frame + Send + 'static,
    {
        let mut device = EchonetTransport::new(loopback_transport()).unwrap();
        let port = device.local_addr().unwrap().port();
        thread::spawn(move || {
            let (data, source) = device.receive_timeout(Duration::from_secs(2)).unwrap();
            let request = Frame::decode(&data).unwrap();
            let response = respond(request);
            device.send(&response.encode().unwrap(), source).unwrap();
        });
        port
    }

    #[test]
    fn test_tid_allocation_skips_reserved() {
        let mut client = test_client(9, 10);
        client.next_tid = 0xFFFF;
        assert_eq!(client.allocate_tid(), 0xFFFF);
        // The counter wraps past the reserved id straight to 1.
        assert_eq!(client.allocate_tid(), 1);
        for _ in 0..200 {
            assert_ne!(client.allocate_tid(), TID_NONE);
        }
    }

    #[test]
    fn test_read_property_matches_by_tid() {
        let port = spawn_device(|request| Frame {
            tid: request.tid,
            seoj: request.deoj,
            deoj: request.seoj,
            esv: Esv::GetRes,
            properties: vec![Property::new(0x80, vec![0x30])],
            ..request
        });
        let mut client = test_client(port, 1000);
        let property = client.read_property(0x80).unwrap();
        assert_eq!(property.edt, vec![0x30]);
    }

    #[test]
    fn test_rejection_carries_frame() {
        let port = spawn_device(|request| Frame {
            tid: request.tid,
            seoj: request.deoj,
            deoj: request.seoj,
            esv: Esv::GetSna,
            properties: vec![Property::new(0xE7, Vec::new())],
            ..request
        });
        let mut client = test_client(port, 1000);
        match client.read_property(0xE7) {
            Err(ClientError::Rejected(frame)) => {
                assert_eq!(frame.seoj, EchonetObject::SOLAR_POWER);
                assert!(frame.rejection().is_some());
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        // Nothing is listening on the target port.
        let silent = EchonetTransport::new(loopback_transport()).unwrap();
        let port = silent.local_addr().unwrap().port();
        let mut client = test_client(port, 100);
        match client.read_property(0x80) {
            Err(ClientError::Transport(TransportError::Timeout(_))) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_property_in_response() {
        let port = spawn_device(|request| Frame {
            tid: request.tid,
            seoj: request.deoj,
            deoj: request.seoj,
            esv: Esv::GetRes,
            properties: Vec::new(),
            ..request
        });
        let mut client = test_client(port, 1000);
        assert!(matches!(
            client.read_property(0x80),
            Err(ClientError::PropertyMissing { epc: 0x80 })
        ));
    }

    #[test]
    fn test_property_map_epc_validation() {
        let mut client = test_client(9, 10);
        assert!(matches!(
            client.read_property_map(0x80),
            Err(ClientError::NotAPropertyMap(0x80))
        ));
    }
}
