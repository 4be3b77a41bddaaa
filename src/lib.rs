#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod frame;
pub mod property;
pub mod property_map;

#[cfg(feature = "std")]
pub mod client;
#[cfg(feature = "std")]
pub mod monitor;
#[cfg(feature = "std")]
pub mod transport;

// Re-export main types without glob imports to avoid conflicts
pub use frame::{EchonetObject, Esv, Frame, FrameError, Property};
pub use property::{PropertyValue, ReportRow};
pub use property_map::{decode_property_map, PropertyMapError, PropertyMapVariant};

#[cfg(feature = "std")]
pub use client::{ClientError, EchonetClient};
#[cfg(feature = "std")]
pub use monitor::{Anomaly, MonitorEvent, MonitorSink, TrafficMonitor};
#[cfg(feature = "std")]
pub use transport::{EchonetTransport, TransportError};

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(test)]
mod tests {
    use crate::frame::{EchonetObject, Esv, Frame};
    use crate::property_map::{decode_property_map, PropertyMapVariant};

    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    #[test]
    fn test_no_std_types() {
        // Test that our types work in both std and no-std environments
        let esv = Esv::Get;
        assert_eq!(esv.code(), 0x62);

        let object = EchonetObject::new(0x05, 0xFF, 0x01);
        assert_eq!(object, EchonetObject::CONTROLLER);
    }

    #[test]
    fn test_frame_round_trip_from_root() {
        let frame = Frame::request(
            1,
            EchonetObject::CONTROLLER,
            EchonetObject::SOLAR_POWER,
            Esv::Get,
            0x9F,
            Vec::new(),
        );
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_property_map_from_root() {
        let epcs =
            decode_property_map(&[2, 0x80, 0x9F], PropertyMapVariant::Gettable).unwrap();
        assert_eq!(epcs.len(), 2);
    }
}
