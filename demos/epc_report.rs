//! Query a list of EPCs from a device and produce a CSV report
//!
//! The device address comes from a credentials file (`IP=<addr>` lines,
//! optional `PORT=<port>`); the report is printed as a table and written to
//! `epc_report_<timestamp>.csv` with EPC, description and value columns.
//! Properties the device does not answer render as "No response" rows.

use std::{env, fs, io::Write};

use echonet_lite_rs::client::EchonetClient;
use echonet_lite_rs::property::ReportRow;

/// EPCs to query: device super class plus the solar power generation class
const EPCS: [u8; 35] = [
    0x80, 0x81, 0x82, 0x83, 0x88, 0x89, 0x8A, 0x8C, 0x97, 0x98, 0x9D, 0x9E, 0xA0, 0xA1, 0xA2,
    0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xD0, 0xD1, 0xE0, 0xE1, 0xE3,
    0xE5, 0xE6, 0xE7, 0xE8, 0xE9,
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let credentials_path = env::args().nth(1).unwrap_or_else(|| "credentials.txt".into());
    let address = read_device_address(&credentials_path)?;
    println!("Querying device at {}", address);

    let mut client = EchonetClient::connect(&address)?;
    let report = client.property_report(&EPCS);

    print_table(&report);

    let filename = format!(
        "epc_report_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    save_report_as_csv(&report, &filename)?;
    println!("CSV report saved as {}", filename);
    Ok(())
}

/// Read the device IP from a credentials file (`IP=<addr>` line)
fn read_device_address(path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(path)?;
    for line in contents.lines() {
        if let Some(address) = line.strip_prefix("IP=") {
            return Ok(address.trim().to_string());
        }
    }
    Err(format!("no IP= line in {}", path).into())
}

fn print_table(report: &[ReportRow]) {
    println!("{:<6} {:<60} {}", "EPC", "Description", "Value");
    println!("{:-<6} {:-<60} {:-<20}", "", "", "");
    for row in report {
        println!("{:<6} {:<60} {}", row.epc_label(), row.description, row.value);
    }
}

fn save_report_as_csv(report: &[ReportRow], filename: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(filename)?;
    writeln!(file, "EPC,Description,Value")?;
    for row in report {
        writeln!(file, "{},{},{}", row.epc_label(), row.description, row.value)?;
    }
    Ok(())
}
