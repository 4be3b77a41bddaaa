//! ECHONET Property Catalog and Value Decoders
//!
//! This module provides the static EPC catalog (human-readable descriptions
//! and decode formats) and utilities for decoding EDT payloads into typed
//! Rust values. Report generation consumes the flat [`ReportRow`] this
//! module produces and never sees protocol internals.
//!
//! Descriptions cover the device object super class plus the household solar
//! power generation class; unknown codes fall back to `"Unknown/Reserved"`.

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, string::ToString, vec::Vec};

/// Human-readable description for a property code
///
/// Unlisted codes are `"Unknown/Reserved"`.
pub fn epc_description(epc: u8) -> &'static str {
    match epc {
        0x80 => "Operation status",
        0x81 => "Installation location",
        0x82 => "Standard version information",
        0x83 => "Identification number",
        0x88 => "Fault status",
        0x89 => "Fault description",
        0x8A => "Manufacturer code",
        0x8B => "Product code",
        0x8C => "Production number",
        0x8D => "Production date",
        0x8F => "Power-saving operation setting",
        0x90 => "ON timer reservation setting",
        0x91 => "ON timer time setting",
        0x92 => "ON timer relative time setting",
        0x93 => "Remote control setting",
        0x94 => "OFF timer reservation setting",
        0x95 => "OFF timer time setting",
        0x96 => "OFF timer relative time setting",
        0x97 => "Current time setting",
        0x98 => "Current date setting",
        0x99 => "Power limit setting",
        0x9A => "Cumulative operating time",
        0x9B => "SetM property map",
        0x9C => "GetM property map",
        0x9D => "Status change announcement property map",
        0x9E => "Set property map",
        0x9F => "Get property map",
        0xA0 => "Output power control setting 1",
        0xA1 => "Output power control setting 2",
        0xA2 => "Function to control purchase of excess electricity setting",
        0xB0 => "Output power controlling schedule",
        0xB1 => "Next access date and time",
        0xB2 => "Type for function to control purchase of excess electricity",
        0xB3 => "Output power change time setting value",
        0xB4 => "Upper limit clip setting value",
        0xBD => "Fault description",
        0xC0 => "Operation power factor setting value",
        0xC1 => "FIT contract type",
        0xC2 => "Self-consumption type",
        0xC3 => "Capacity approved by equipment",
        0xC4 => "Conversion coefficient",
        0xD0 => "System interconnection status",
        0xD1 => "Output power restraint status",
        0xE0 => "System interconnection status",
        0xE1 => "Measured instantaneous amount of electricity generated",
        0xE2 => "Measured cumulative amount of electric energy generated",
        0xE3 => "Maximum amount of electricity that can be sold",
        0xE4 => "Maximum amount of electricity that can be bought",
        0xE5 => "Measurement time of instantaneous power generation",
        0xE6 => "Power generation output limit setting 2",
        0xE7 => "Limit setting for the amount of electricity sold",
        0xE8 => "Rated power generation output",
        0xE9 => "Power generation operation setting",
        _ => "Unknown/Reserved",
    }
}

/// Semantic decode format of an EDT payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyFormat {
    /// Opaque bytes, rendered as hex
    Raw,
    /// 0x30 = ON, 0x31 = OFF
    OnOff,
    /// Big-endian unsigned, 1 byte
    Unsigned8,
    /// Big-endian unsigned, 2 bytes
    Unsigned16,
    /// Big-endian unsigned, 4 bytes
    Unsigned32,
    /// Big-endian signed, 4 bytes
    Signed32,
}

/// Decode format for a property code
///
/// Codes without a known numeric interpretation decode as [`PropertyFormat::Raw`].
pub fn property_format(epc: u8) -> PropertyFormat {
    match epc {
        0x80 => PropertyFormat::OnOff,
        0xA0 => PropertyFormat::Unsigned8,
        0xA1 | 0xE2 => PropertyFormat::Unsigned16,
        0xE0 | 0xE4 => PropertyFormat::Unsigned32,
        0xE7 => PropertyFormat::Signed32,
        _ => PropertyFormat::Raw,
    }
}

/// A decoded property value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyValue {
    /// Operation status style boolean
    OnOff(bool),
    /// Unsigned numeric value
    Unsigned(u32),
    /// Signed numeric value
    Signed(i32),
    /// Undecoded payload bytes
    Raw(Vec<u8>),
}

impl PropertyValue {
    /// Get the value as a display string
    pub fn as_display_string(&self) -> String {
        match self {
            PropertyValue::OnOff(true) => "ON".to_string(),
            PropertyValue::OnOff(false) => "OFF".to_string(),
            PropertyValue::Unsigned(value) => value.to_string(),
            PropertyValue::Signed(value) => value.to_string(),
            PropertyValue::Raw(bytes) => hex::encode_upper(bytes),
        }
    }

    /// Get numeric value as f64 if possible
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            PropertyValue::Unsigned(value) => Some(*value as f64),
            PropertyValue::Signed(value) => Some(*value as f64),
            _ => None,
        }
    }
}

/// Decode an EDT payload according to the catalog format for `epc`
///
/// A payload whose length does not fit the catalog format decodes as
/// [`PropertyValue::Raw`] so callers can still render it.
pub fn decode_value(epc: u8, edt: &[u8]) -> PropertyValue {
    match (property_format(epc), edt) {
        (PropertyFormat::OnOff, [0x30]) => PropertyValue::OnOff(true),
        (PropertyFormat::OnOff, [0x31]) => PropertyValue::OnOff(false),
        (PropertyFormat::Unsigned8, [b0]) => PropertyValue::Unsigned(*b0 as u32),
        (PropertyFormat::Unsigned16, [b0, b1]) => {
            PropertyValue::Unsigned(u16::from_be_bytes([*b0, *b1]) as u32)
        }
        (PropertyFormat::Unsigned32, [b0, b1, b2, b3]) => {
            PropertyValue::Unsigned(u32::from_be_bytes([*b0, *b1, *b2, *b3]))
        }
        (PropertyFormat::Signed32, [b0, b1, b2, b3]) => {
            PropertyValue::Signed(i32::from_be_bytes([*b0, *b1, *b2, *b3]))
        }
        _ => PropertyValue::Raw(edt.to_vec()),
    }
}

/// One row of a property report: code, description, rendered value
///
/// This is the flat structure handed to report renderers (CSV, tables);
/// the value is already a display string.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportRow {
    /// Property code
    pub epc: u8,
    /// Catalog description
    pub description: &'static str,
    /// Rendered value, or `"No response"` when the device did not answer
    pub value: String,
}

impl ReportRow {
    /// Build a row from a queried EPC and the payload it returned, if any
    pub fn new(epc: u8, edt: Option<&[u8]>) -> Self {
        let value = match edt {
            Some(edt) => decode_value(epc, edt).as_display_string(),
            None => "No response".to_string(),
        };
        Self {
            epc,
            description: epc_description(epc),
            value,
        }
    }

    /// The EPC rendered the way reports print it
    pub fn epc_label(&self) -> String {
        format!("0x{:02X}", self.epc)
    }
}
