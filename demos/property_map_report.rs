//! Query both property maps from a device and print the decoded tables
//!
//! Reads the Set property map (0x9E) and the Get property map (0x9F),
//! decodes each with its own bitmap variant and cross-references the EPCs
//! with the catalog descriptions.

use std::env;

use echonet_lite_rs::client::EchonetClient;
use echonet_lite_rs::property::epc_description;
use echonet_lite_rs::property_map::{EPC_GET_PROPERTY_MAP, EPC_SET_PROPERTY_MAP};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = env::args()
        .nth(1)
        .ok_or("usage: property_map_report <device-ip>")?;
    let mut client = EchonetClient::connect(&address)?;

    for (map_epc, label) in [
        (EPC_SET_PROPERTY_MAP, "Set Property Map (0x9E)"),
        (EPC_GET_PROPERTY_MAP, "Get Property Map (0x9F)"),
    ] {
        println!("\n{}", label);
        println!("{:-<70}", "");
        match client.read_property_map(map_epc) {
            Ok(epcs) => {
                for epc in epcs {
                    println!("  0x{:02X}  {}", epc, epc_description(epc));
                }
            }
            Err(e) => println!("  query failed: {}", e),
        }
    }
    Ok(())
}
