//! Monitor all ECHONET Lite UDP traffic on port 3610
//!
//! Logs every observed frame and every detected protocol violation to an
//! append-only log file until Ctrl-C. Run alongside any ECHONET Lite
//! client or device on the local network.

use std::{
    env,
    fs::OpenOptions,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use echonet_lite_rs::monitor::{MonitorConfig, MonitorEvent, MonitorSink, TrafficMonitor};

/// Append-only file sink, one line per event
struct FileSink {
    file: std::fs::File,
}

impl MonitorSink for FileSink {
    fn append(&mut self, event: &MonitorEvent) {
        if let Err(e) = writeln!(self.file, "{}", event) {
            log::error!("log write failed: {}", e);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let log_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "enl_udp_monitor.log".into());
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let mut monitor = TrafficMonitor::new(MonitorConfig::default(), Box::new(FileSink { file }));
    monitor.start()?;
    println!(
        "Monitoring ECHONET Lite traffic on port 3610, logging to {} (Ctrl-C to stop)",
        log_path
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    println!("Stopping ({} requests still pending)", monitor.pending_count());
    monitor.stop();
    Ok(())
}
