//! ECHONET Lite Frame Encoding/Decoding
//!
//! This module implements the ECHONET Lite frame format as defined in the
//! ECHONET Lite specification Part 2 (frame format 1). Frames travel as UDP
//! datagrams on port 3610.
//!
//! # Overview
//!
//! A frame consists of:
//! - EHD1/EHD2 header identification bytes (0x10, 0x81)
//! - A 16-bit transaction id (big-endian)
//! - SEOJ/DEOJ source and destination object codes (3 bytes each)
//! - An ESV service code selecting the operation
//! - An OPC property counter followed by OPC property blocks,
//!   each EPC (property code) + PDC (payload length) + EDT (payload)
//!
//! Decoding is strict: every declared length must be satisfied exactly, and
//! any shortfall or excess is a typed failure rather than a partial frame.
//! Error-class ESVs (0x50-0x52) decode into a normal [`Frame`] whose
//! [`Frame::rejection`] is inspectable as data, so callers can still read the
//! header and object codes of a rejected request.
//!
//! # Example
//!
//! ```no_run
//! use echonet_lite_rs::frame::{EchonetObject, Esv, Frame};
//!
//! let request = Frame::request(
//!     1,
//!     EchonetObject::CONTROLLER,
//!     EchonetObject::SOLAR_POWER,
//!     Esv::Get,
//!     0x80,
//!     Vec::new(),
//! );
//! let bytes = request.encode().unwrap();
//! let decoded = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded.tid, 1);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Result type for frame codec operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, FrameError>;

/// First header identification byte (ECHONET Lite protocol)
pub const EHD1_ECHONET_LITE: u8 = 0x10;

/// Second header identification byte (frame format 1)
pub const EHD2_FORMAT1: u8 = 0x81;

/// Reserved "no transaction" id, never allocated for requests
pub const TID_NONE: u16 = 0x0000;

/// Bytes in the fixed prefix: EHD1, EHD2, TID, SEOJ, DEOJ, ESV, OPC
pub const FIXED_HEADER_LEN: usize = 12;

/// Largest EDT payload a single property block can carry (PDC is one byte)
pub const MAX_EDT_LEN: usize = 255;

/// Errors that can occur while encoding or decoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameError {
    /// Buffer ended before the declared structure was complete
    Truncated,
    /// Header identification bytes are not ECHONET Lite frame format 1
    InvalidHeader,
    /// Property payload or property count does not fit its one-byte field
    InvalidPayload,
    /// Bytes left over after the declared property blocks
    TrailingData,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated => write!(f, "Frame truncated before declared end"),
            FrameError::InvalidHeader => write!(f, "Not an ECHONET Lite format 1 frame"),
            FrameError::InvalidPayload => {
                write!(f, "Property payload or count exceeds one-byte field")
            }
            FrameError::TrailingData => write!(f, "Trailing bytes after last property block"),
        }
    }
}

#[cfg(feature = "std")]
impl Error for FrameError {}

/// ECHONET object code (class group, class, instance)
///
/// Identifies a device object such as the controller (0x05FF01) or a
/// household solar power generation unit (0x027901).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EchonetObject {
    /// Class group code (X1)
    pub class_group: u8,
    /// Class code (X2)
    pub class: u8,
    /// Instance code (X3)
    pub instance: u8,
}

impl EchonetObject {
    /// Controller object, instance 1
    pub const CONTROLLER: EchonetObject = EchonetObject::new(0x05, 0xFF, 0x01);

    /// Household solar power generation object, instance 1
    pub const SOLAR_POWER: EchonetObject = EchonetObject::new(0x02, 0x79, 0x01);

    /// Node profile object, instance 1
    pub const NODE_PROFILE: EchonetObject = EchonetObject::new(0x0E, 0xF0, 0x01);

    /// Create a new object code
    pub const fn new(class_group: u8, class: u8, instance: u8) -> Self {
        Self {
            class_group,
            class,
            instance,
        }
    }

    /// Encode to the 3-byte wire representation
    pub fn encode(&self) -> [u8; 3] {
        [self.class_group, self.class, self.instance]
    }

    /// Decode from the first 3 bytes of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(FrameError::Truncated);
        }
        Ok(Self::new(data[0], data[1], data[2]))
    }
}

impl fmt::Display for EchonetObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:02X}",
            self.class_group, self.class, self.instance
        )
    }
}

/// ECHONET Lite service codes (ESV)
///
/// Covers the write/read request set, the corresponding response set and the
/// error-response set. Codes outside this subset decode as [`Esv::Unknown`]
/// so that observing unrelated traffic never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Esv {
    /// Property write, no response required (SetI, 0x60)
    SetI,
    /// Property write with response (SetC, 0x61)
    SetC,
    /// Property read (Get, 0x62)
    Get,
    /// Write response (Set_Res, 0x71)
    SetRes,
    /// Read response (Get_Res, 0x72)
    GetRes,
    /// Property value notification (INF, 0x73)
    Inf,
    /// Write request not possible (SetI_SNA, 0x50)
    SetISna,
    /// Write request not possible, response variant (SetC_SNA, 0x51)
    SetCSna,
    /// Read request not possible (Get_SNA, 0x52)
    GetSna,
    /// Any service code outside the recognized subset
    Unknown(u8),
}

impl Esv {
    /// Decode a service code byte
    pub fn from_code(code: u8) -> Self {
        match code {
            0x60 => Esv::SetI,
            0x61 => Esv::SetC,
            0x62 => Esv::Get,
            0x71 => Esv::SetRes,
            0x72 => Esv::GetRes,
            0x73 => Esv::Inf,
            0x50 => Esv::SetISna,
            0x51 => Esv::SetCSna,
            0x52 => Esv::GetSna,
            other => Esv::Unknown(other),
        }
    }

    /// The wire byte for this service code
    pub fn code(&self) -> u8 {
        match self {
            Esv::SetI => 0x60,
            Esv::SetC => 0x61,
            Esv::Get => 0x62,
            Esv::SetRes => 0x71,
            Esv::GetRes => 0x72,
            Esv::Inf => 0x73,
            Esv::SetISna => 0x50,
            Esv::SetCSna => 0x51,
            Esv::GetSna => 0x52,
            Esv::Unknown(code) => *code,
        }
    }

    /// True for the request-class codes (0x60-0x62)
    pub fn is_request(&self) -> bool {
        matches!(self, Esv::SetI | Esv::SetC | Esv::Get)
    }

    /// True for the response-class codes (0x71-0x73)
    pub fn is_response(&self) -> bool {
        matches!(self, Esv::SetRes | Esv::GetRes | Esv::Inf)
    }

    /// True for the error-response codes (0x50-0x52)
    pub fn is_error_response(&self) -> bool {
        matches!(self, Esv::SetISna | Esv::SetCSna | Esv::GetSna)
    }

    /// The response code a conforming device answers this request with
    ///
    /// SetI is acknowledged with 0x71; SetC and Get both answer with 0x72.
    /// Returns `None` for non-request codes.
    pub fn response_pair(&self) -> Option<Esv> {
        match self {
            Esv::SetI => Some(Esv::SetRes),
            Esv::SetC => Some(Esv::GetRes),
            Esv::Get => Some(Esv::GetRes),
            _ => None,
        }
    }
}

impl fmt::Display for Esv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Esv::SetI => "SetI",
            Esv::SetC => "SetC",
            Esv::Get => "Get",
            Esv::SetRes => "Set_Res",
            Esv::GetRes => "Get_Res",
            Esv::Inf => "INF",
            Esv::SetISna => "SetI_SNA",
            Esv::SetCSna => "SetC_SNA",
            Esv::GetSna => "Get_SNA",
            Esv::Unknown(code) => return write!(f, "ESV(0x{:02X})", code),
        };
        write!(f, "{}", name)
    }
}

/// Device-side rejection signalled by an error-class ESV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rejection {
    /// Property not settable (SetI refused)
    WriteNoResponse,
    /// Property not settable (SetC refused)
    Write,
    /// Property not gettable (Get refused)
    Read,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::WriteNoResponse => write!(f, "property not settable (SetI refused)"),
            Rejection::Write => write!(f, "property not settable (SetC refused)"),
            Rejection::Read => write!(f, "property not gettable (Get refused)"),
        }
    }
}

/// One property block: EPC, PDC and EDT payload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Property {
    /// Property code
    pub epc: u8,
    /// Payload bytes (may be empty, e.g. in a Get request)
    pub edt: Vec<u8>,
}

impl Property {
    /// Create a new property block
    pub fn new(epc: u8, edt: Vec<u8>) -> Self {
        Self { epc, edt }
    }

    /// Payload length as it appears in the PDC field
    pub fn pdc(&self) -> usize {
        self.edt.len()
    }
}

/// A decoded or to-be-encoded ECHONET Lite frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// First header identification byte
    pub ehd1: u8,
    /// Second header identification byte
    pub ehd2: u8,
    /// Transaction id correlating request and response
    pub tid: u16,
    /// Source object code
    pub seoj: EchonetObject,
    /// Destination object code
    pub deoj: EchonetObject,
    /// Service code
    pub esv: Esv,
    /// Property blocks, in wire order
    pub properties: Vec<Property>,
}

impl Frame {
    /// Create a single-property request frame (OPC = 1)
    ///
    /// `edt` is empty for Get requests and carries the value for writes.
    pub fn request(
        tid: u16,
        seoj: EchonetObject,
        deoj: EchonetObject,
        esv: Esv,
        epc: u8,
        edt: Vec<u8>,
    ) -> Self {
        Self {
            ehd1: EHD1_ECHONET_LITE,
            ehd2: EHD2_FORMAT1,
            tid,
            seoj,
            deoj,
            esv,
            properties: vec![Property::new(epc, edt)],
        }
    }

    /// Encode the frame to its wire representation
    ///
    /// Fails with [`FrameError::InvalidPayload`] if any EDT exceeds 255 bytes
    /// or the frame carries more than 255 property blocks; payloads are never
    /// silently truncated.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.properties.len() > 255 {
            return Err(FrameError::InvalidPayload);
        }
        for property in &self.properties {
            if property.edt.len() > MAX_EDT_LEN {
                return Err(FrameError::InvalidPayload);
            }
        }

        let payload_len: usize = self.properties.iter().map(|p| 2 + p.edt.len()).sum();
        let mut buffer = Vec::with_capacity(FIXED_HEADER_LEN + payload_len);
        buffer.push(self.ehd1);
        buffer.push(self.ehd2);
        buffer.extend_from_slice(&self.tid.to_be_bytes());
        buffer.extend_from_slice(&self.seoj.encode());
        buffer.extend_from_slice(&self.deoj.encode());
        buffer.push(self.esv.code());
        buffer.push(self.properties.len() as u8);
        for property in &self.properties {
            buffer.push(property.epc);
            buffer.push(property.edt.len() as u8);
            buffer.extend_from_slice(&property.edt);
        }
        Ok(buffer)
    }

    /// Decode a frame from raw datagram bytes
    ///
    /// Requires the 12-byte fixed prefix, then exactly OPC property blocks.
    /// Every declared length must be satisfied: a short buffer fails with
    /// [`FrameError::Truncated`], leftover bytes with
    /// [`FrameError::TrailingData`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(FrameError::Truncated);
        }
        if data[0] != EHD1_ECHONET_LITE || data[1] != EHD2_FORMAT1 {
            return Err(FrameError::InvalidHeader);
        }

        let tid = u16::from_be_bytes([data[2], data[3]]);
        let seoj = EchonetObject::decode(&data[4..7])?;
        let deoj = EchonetObject::decode(&data[7..10])?;
        let esv = Esv::from_code(data[10]);
        let opc = data[11] as usize;

        let mut properties = Vec::with_capacity(opc);
        let mut idx = FIXED_HEADER_LEN;
        for _ in 0..opc {
            if idx + 2 > data.len() {
                return Err(FrameError::Truncated);
            }
            let epc = data[idx];
            let pdc = data[idx + 1] as usize;
            idx += 2;
            if idx + pdc > data.len() {
                return Err(FrameError::Truncated);
            }
            properties.push(Property::new(epc, data[idx..idx + pdc].to_vec()));
            idx += pdc;
        }
        if idx != data.len() {
            return Err(FrameError::TrailingData);
        }

        Ok(Self {
            ehd1: data[0],
            ehd2: data[1],
            tid,
            seoj,
            deoj,
            esv,
            properties,
        })
    }

    /// Device-side rejection carried by this frame, if any
    ///
    /// Error-class ESVs decode as normal frames; this surfaces the rejection
    /// as data while keeping the header and object codes accessible.
    pub fn rejection(&self) -> Option<Rejection> {
        match self.esv {
            Esv::SetISna => Some(Rejection::WriteNoResponse),
            Esv::SetCSna => Some(Rejection::Write),
            Esv::GetSna => Some(Rejection::Read),
            _ => None,
        }
    }

    /// The property block with the given EPC, if present
    pub fn property(&self, epc: u8) -> Option<&Property> {
        self.properties.iter().find(|p| p.epc == epc)
    }

    /// The first property block, if any
    pub fn first_property(&self) -> Option<&Property> {
        self.properties.first()
    }
}
