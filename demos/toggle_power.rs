//! Read, toggle and restore a device's operation status (EPC 0x80)
//!
//! Demonstrates the read / write / read-back cycle used in physical
//! property testing: the initial value is stored, the opposite value is
//! written, the updated value is read back and the initial value restored.

use std::{env, thread, time::Duration};

use echonet_lite_rs::client::EchonetClient;
use echonet_lite_rs::property::{decode_value, PropertyValue};

const EPC_OPERATION_STATUS: u8 = 0x80;
const STATUS_ON: u8 = 0x30;
const STATUS_OFF: u8 = 0x31;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = env::args().nth(1).ok_or("usage: toggle_power <device-ip>")?;
    let mut client = EchonetClient::connect(&address)?;

    let initial = client.read_property(EPC_OPERATION_STATUS)?;
    println!(
        "Operation status: {}",
        decode_value(EPC_OPERATION_STATUS, &initial.edt).as_display_string()
    );

    let toggled = match decode_value(EPC_OPERATION_STATUS, &initial.edt) {
        PropertyValue::OnOff(true) => STATUS_OFF,
        _ => STATUS_ON,
    };
    println!("Setting operation status to 0x{:02X}", toggled);
    client.write_property_no_confirm(EPC_OPERATION_STATUS, vec![toggled])?;
    thread::sleep(Duration::from_secs(1));

    let updated = client.read_property(EPC_OPERATION_STATUS)?;
    println!(
        "Updated status: {}",
        decode_value(EPC_OPERATION_STATUS, &updated.edt).as_display_string()
    );

    // Restore the initial value.
    client.write_property_no_confirm(EPC_OPERATION_STATUS, initial.edt.clone())?;
    println!("Restored initial value");
    Ok(())
}
