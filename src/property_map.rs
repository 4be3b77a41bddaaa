//! ECHONET Lite Property Map Decoding
//!
//! Devices enumerate their supported properties through three property-map
//! properties: the status change announcement map (0x9D), the Set property
//! map (0x9E) and the Get property map (0x9F). This module decodes the two
//! wire encodings of those maps into a set of EPC codes.
//!
//! # Overview
//!
//! - *List form*: `[count, epc_1 .. epc_count]`, valid when the payload is
//!   exactly `count + 1` bytes and `count < 16`.
//! - *Bitmap form*: exactly 17 bytes, `[count, byte_0 .. byte_15]`, where
//!   each of the 16 bytes encodes up to 8 EPCs.
//!
//! The two bitmap sub-variants assign EPCs to bit positions differently:
//! the Set map uses the uniform mapping `0x80 + byte*8 + bit`, while the Get
//! map uses `0x80 | bit << 4 | byte` with one irregular entry in the upstream
//! EPC assignment table. The 17-byte payload alone does not say which
//! mapping applies; the caller must pass the variant derived from the EPC
//! that was queried.
//!
//! # Example
//!
//! ```
//! use echonet_lite_rs::property_map::{decode_property_map, PropertyMapVariant};
//!
//! // List form: two EPCs, 0x80 and 0xE7.
//! let epcs = decode_property_map(&[2, 0x80, 0xE7], PropertyMapVariant::Settable).unwrap();
//! assert!(epcs.contains(&0x80) && epcs.contains(&0xE7));
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::{collections::BTreeSet, fmt};

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeSet;

/// Result type for property map operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, PropertyMapError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, PropertyMapError>;

/// Status change announcement property map EPC
pub const EPC_ANNOUNCEMENT_PROPERTY_MAP: u8 = 0x9D;

/// Set property map EPC
pub const EPC_SET_PROPERTY_MAP: u8 = 0x9E;

/// Get property map EPC
pub const EPC_GET_PROPERTY_MAP: u8 = 0x9F;

/// Bitmap form payload length: count byte + 16 bitmap bytes
const BITMAP_PAYLOAD_LEN: usize = 17;

/// Largest count the list form can carry
const LIST_FORM_MAX: u8 = 16;

/// Errors that can occur while decoding a property map payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMapError {
    /// Payload longer than the 17-byte bitmap form
    InvalidLength,
    /// Payload is neither a valid list form nor a 17-byte bitmap
    InvalidFormat,
}

impl fmt::Display for PropertyMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyMapError::InvalidLength => {
                write!(f, "Property map payload longer than 17 bytes")
            }
            PropertyMapError::InvalidFormat => {
                write!(f, "Property map payload is neither list nor bitmap form")
            }
        }
    }
}

#[cfg(feature = "std")]
impl Error for PropertyMapError {}

/// Which property map a payload was read from
///
/// Selects the bitmap bit-to-EPC mapping. The wire bytes are ambiguous
/// between the two, so this must come from the queried EPC, not the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyMapVariant {
    /// Set property map (0x9E): uniform `0x80 + byte*8 + bit` mapping
    Settable,
    /// Get property map (0x9F): non-uniform table mapping
    Gettable,
}

impl PropertyMapVariant {
    /// The variant for a property-map EPC, if `epc` is one
    ///
    /// The announcement map (0x9D) shares the Set map's uniform mapping.
    pub fn from_epc(epc: u8) -> Option<Self> {
        match epc {
            EPC_SET_PROPERTY_MAP | EPC_ANNOUNCEMENT_PROPERTY_MAP => {
                Some(PropertyMapVariant::Settable)
            }
            EPC_GET_PROPERTY_MAP => Some(PropertyMapVariant::Gettable),
            _ => None,
        }
    }
}

/// Bit-to-EPC table for the Get property map bitmap, indexed `[byte][bit]`
///
/// Built once at compile time so the irregular entry stays next to the
/// formula it overrides.
const GETTABLE_EPC_TABLE: [[u8; 8]; 16] = build_gettable_epc_table();

const fn build_gettable_epc_table() -> [[u8; 8]; 16] {
    let mut table = [[0u8; 8]; 16];
    let mut row = 0;
    while row < 16 {
        let mut bit = 0;
        while bit < 8 {
            table[row][bit] = 0x80 | ((bit as u8) << 4) | row as u8;
            bit += 1;
        }
        row += 1;
    }
    // The upstream EPC assignment table deviates from the formula at
    // byte 13, bit 6; this entry is fixed, not derived.
    table[13][6] = 0xED;
    table
}

/// Decode a property map payload into the set of supported EPCs
///
/// An empty payload is a valid empty map. Payloads over 17 bytes fail with
/// [`PropertyMapError::InvalidLength`]; anything that matches neither the
/// list form nor the 17-byte bitmap fails with
/// [`PropertyMapError::InvalidFormat`].
pub fn decode_property_map(edt: &[u8], variant: PropertyMapVariant) -> Result<BTreeSet<u8>> {
    if edt.is_empty() {
        return Ok(BTreeSet::new());
    }
    if edt.len() > BITMAP_PAYLOAD_LEN {
        return Err(PropertyMapError::InvalidLength);
    }

    let count = edt[0];
    if edt.len() == count as usize + 1 && count < LIST_FORM_MAX {
        return Ok(edt[1..].iter().copied().collect());
    }
    if edt.len() == BITMAP_PAYLOAD_LEN {
        return Ok(decode_bitmap(&edt[1..], variant));
    }
    Err(PropertyMapError::InvalidFormat)
}

fn decode_bitmap(bitmap: &[u8], variant: PropertyMapVariant) -> BTreeSet<u8> {
    let mut epcs = BTreeSet::new();
    for (byte_index, byte) in bitmap.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) == 0 {
                continue;
            }
            let epc = match variant {
                PropertyMapVariant::Settable => 0x80 + (byte_index as u8) * 8 + bit,
                PropertyMapVariant::Gettable => GETTABLE_EPC_TABLE[byte_index][bit as usize],
            };
            epcs.insert(epc);
        }
    }
    epcs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};

    #[test]
    fn test_empty_payload_is_empty_map() {
        let epcs = decode_property_map(&[], PropertyMapVariant::Settable).unwrap();
        assert!(epcs.is_empty());
    }

    #[test]
    fn test_list_form() {
        let epcs = decode_property_map(&[3, 0x80, 0x9E, 0xE7], PropertyMapVariant::Settable).unwrap();
        let expected: Vec<u8> = epcs.iter().copied().collect();
        assert_eq!(expected, [0x80, 0x9E, 0xE7]);
    }

    #[test]
    fn test_list_form_collapses_duplicates() {
        let epcs = decode_property_map(&[3, 0x80, 0x80, 0xE7], PropertyMapVariant::Gettable).unwrap();
        assert_eq!(epcs.len(), 2);
    }

    #[test]
    fn test_list_form_length_mismatch() {
        // Count byte says 3, payload carries 2 codes.
        assert_eq!(
            decode_property_map(&[3, 0x80, 0x81], PropertyMapVariant::Settable),
            Err(PropertyMapError::InvalidFormat)
        );
    }

    #[test]
    fn test_payload_too_long() {
        let edt = [0u8; 18];
        assert_eq!(
            decode_property_map(&edt, PropertyMapVariant::Settable),
            Err(PropertyMapError::InvalidLength)
        );
    }

    #[test]
    fn test_sixteen_codes_use_bitmap_not_list() {
        // Count 16 never selects the list form; a 17-byte payload with
        // count 16 is a bitmap.
        let mut edt = [0u8; 17];
        edt[0] = 16;
        edt[1] = 0x01; // byte 0, bit 0
        let epcs = decode_property_map(&edt, PropertyMapVariant::Settable).unwrap();
        assert_eq!(epcs.iter().copied().collect::<Vec<u8>>(), [0x80]);
    }

    #[test]
    fn test_standard_bitmap_single_bits() {
        for byte_index in 0..16usize {
            for bit in 0..8u8 {
                let mut edt = [0u8; 17];
                edt[0] = 1;
                edt[1 + byte_index] = 1 << bit;
                let epcs = decode_property_map(&edt, PropertyMapVariant::Settable).unwrap();
                let expected = 0x80 + (byte_index as u8) * 8 + bit;
                assert_eq!(epcs.iter().copied().collect::<Vec<u8>>(), [expected]);
            }
        }
    }

    #[test]
    fn test_gettable_bitmap_formula() {
        // Byte 0, bit 7 maps to 0x80 | 7 << 4 | 0 = 0xF0.
        let mut edt = [0u8; 17];
        edt[0] = 1;
        edt[1] = 0x80;
        let epcs = decode_property_map(&edt, PropertyMapVariant::Gettable).unwrap();
        assert_eq!(epcs.iter().copied().collect::<Vec<u8>>(), [0xF0]);
    }

    #[test]
    fn test_gettable_bitmap_irregular_entry() {
        // Byte 13, bit 6 is the table's fixed entry: 0xED.
        let mut edt = [0u8; 17];
        edt[0] = 1;
        edt[14] = 1 << 6;
        let epcs = decode_property_map(&edt, PropertyMapVariant::Gettable).unwrap();
        assert_eq!(epcs.iter().copied().collect::<Vec<u8>>(), [0xED]);
    }

    #[test]
    fn test_gettable_bitmap_full_byte() {
        // All bits of byte 0 set: column 0 of every row of the table.
        let mut edt = [0u8; 17];
        edt[0] = 8;
        edt[1] = 0xFF;
        let epcs = decode_property_map(&edt, PropertyMapVariant::Gettable).unwrap();
        let expected: Vec<u8> = (0..8u8).map(|bit| 0x80 | bit << 4).collect();
        assert_eq!(epcs.iter().copied().collect::<Vec<u8>>(), expected);
    }

    #[test]
    fn test_invalid_intermediate_lengths() {
        // Neither a consistent list nor 17 bytes.
        for len in 2..17usize {
            let mut edt = vec![0u8; len];
            edt[0] = 0x20; // count outside the list range
            assert_eq!(
                decode_property_map(&edt, PropertyMapVariant::Gettable),
                Err(PropertyMapError::InvalidFormat),
                "length {}",
                len
            );
        }
    }

    #[test]
    fn test_variant_from_epc() {
        assert_eq!(
            PropertyMapVariant::from_epc(EPC_SET_PROPERTY_MAP),
            Some(PropertyMapVariant::Settable)
        );
        assert_eq!(
            PropertyMapVariant::from_epc(EPC_GET_PROPERTY_MAP),
            Some(PropertyMapVariant::Gettable)
        );
        assert_eq!(
            PropertyMapVariant::from_epc(EPC_ANNOUNCEMENT_PROPERTY_MAP),
            Some(PropertyMapVariant::Settable)
        );
        assert_eq!(PropertyMapVariant::from_epc(0x80), None);
    }

    #[cfg(feature = "std")]
    mod list_laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_list_form_returns_listed_codes(
                codes in prop::collection::vec(any::<u8>(), 0..16)
            ) {
                let mut edt = vec![codes.len() as u8];
                edt.extend_from_slice(&codes);
                let decoded =
                    decode_property_map(&edt, PropertyMapVariant::Settable).unwrap();
                let expected: BTreeSet<u8> = codes.iter().copied().collect();
                prop_assert_eq!(decoded, expected);
            }
        }
    }
}
