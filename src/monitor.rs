//! Passive ECHONET Lite Traffic Monitor
//!
//! This module observes all ECHONET Lite UDP traffic on port 3610, not
//! just frames this host sent, and reconstructs request/response pairings
//! by transaction id, flagging protocol violations along the way.
//!
//! # Overview
//!
//! Each transaction id moves through a small state machine:
//!
//! ```text
//! NoRequest -> RequestPending -> { Matched, TimedOut, Mismatched }
//! ```
//!
//! All three outcomes are terminal for that id; a later request with the
//! same id (after wraparound) starts a fresh instance. The monitor flags:
//!
//! - `TidReused`: a request reissued an id that is still pending
//! - `UnmatchedResponse`: a response with no outstanding request
//! - `MismatchedSource`: response SEOJ differs from the request DEOJ
//! - `MismatchedServiceCode`: response ESV is not the pairing for the
//!   request ESV
//! - `DuplicateResponse`: more than one response recorded for one request
//! - `RequestTimedOut`: no response within the configured window
//!
//! Every observation and anomaly is appended to a [`MonitorSink`]; the
//! monitor holds only the live pending-request table and never re-reads its
//! own log. Malformed datagrams are logged and discarded, never fatal.
//!
//! Two activities run concurrently: a receive loop blocking on the socket
//! and a periodic timeout sweep. They share the pending table behind one
//! mutex. The receive loop uses a short socket read timeout so that
//! [`TrafficMonitor::stop`] never waits for the next packet.

use std::{
    collections::HashMap,
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::{
    frame::{EchonetObject, Esv, Frame, FrameError},
    transport::{bind_socket, constants::ECHONET_LITE_PORT},
};

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur when starting or stopping the monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The monitor threads are already running
    #[error("monitor is already running")]
    AlreadyRunning,
}

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Local bind address
    pub bind_address: IpAddr,
    /// Port to observe
    pub port: u16,
    /// How long a request may stay unanswered before it times out
    pub request_timeout: Duration,
    /// How often the timeout sweep runs
    pub sweep_interval: Duration,
    /// Socket read timeout; bounds how long `stop()` can take
    pub poll_timeout: Duration,
    /// Receive buffer size
    pub buffer_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: ECHONET_LITE_PORT,
            request_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_millis(100),
            buffer_size: 2048,
        }
    }
}

/// Protocol violations flagged by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Anomaly {
    /// A request reissued a transaction id that is still pending
    TidReused {
        /// The reused transaction id
        tid: u16,
    },
    /// A response arrived with no outstanding request for its id
    UnmatchedResponse {
        /// The orphaned transaction id
        tid: u16,
    },
    /// The response source object differs from the request destination
    MismatchedSource {
        /// Transaction id of the pairing
        tid: u16,
        /// The request's destination object
        expected: EchonetObject,
        /// The response's source object
        actual: EchonetObject,
    },
    /// The response service code is not the pairing for the request's
    MismatchedServiceCode {
        /// Transaction id of the pairing
        tid: u16,
        /// The original request service code
        request_esv: Esv,
        /// The service code the response carried
        response_esv: Esv,
    },
    /// More than one response was recorded for the same request
    DuplicateResponse {
        /// The transaction id answered twice
        tid: u16,
    },
    /// No response arrived within the timeout window
    RequestTimedOut {
        /// The evicted transaction id
        tid: u16,
        /// How long the request had been pending
        waited: Duration,
    },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::TidReused { tid } => {
                write!(f, "TID {} reused before a response arrived", tid)
            }
            Anomaly::UnmatchedResponse { tid } => {
                write!(f, "response with TID {} has no matching request", tid)
            }
            Anomaly::MismatchedSource {
                tid,
                expected,
                actual,
            } => write!(
                f,
                "response SEOJ {} does not match request DEOJ {} (TID {})",
                actual, expected, tid
            ),
            Anomaly::MismatchedServiceCode {
                tid,
                request_esv,
                response_esv,
            } => write!(
                f,
                "response ESV {} does not pair with request ESV {} (TID {})",
                response_esv, request_esv, tid
            ),
            Anomaly::DuplicateResponse { tid } => {
                write!(f, "duplicate response for TID {}", tid)
            }
            Anomaly::RequestTimedOut { tid, waited } => {
                write!(f, "no response for TID {} after {:?}", tid, waited)
            }
        }
    }
}

/// How an observed frame related to the pending-request table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchStatus {
    /// A request-class frame, now pending
    Request,
    /// A response correctly paired with its request
    Matched,
    /// A response with no outstanding request
    UnmatchedResponse,
    /// A response from the wrong source object
    MismatchedSource,
    /// A response with the wrong service code
    MismatchedServiceCode,
    /// A repeat response for an already-answered request
    DuplicateResponse,
    /// Neither request-class nor response-class service code
    Other,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MatchStatus::Request => "REQUEST",
            MatchStatus::Matched => "MATCHED RESPONSE",
            MatchStatus::UnmatchedResponse => "UNMATCHED RESPONSE",
            MatchStatus::MismatchedSource => "MISMATCHED SOURCE",
            MatchStatus::MismatchedServiceCode => "MISMATCHED ESV",
            MatchStatus::DuplicateResponse => "DUPLICATE RESPONSE",
            MatchStatus::Other => "OTHER",
        };
        write!(f, "{}", label)
    }
}

/// One successfully decoded datagram and its classification
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservedFrame {
    /// Wall-clock time of observation
    pub timestamp: DateTime<Local>,
    /// Datagram source address
    pub source: SocketAddr,
    /// The decoded frame
    pub frame: Frame,
    /// Raw datagram bytes
    pub raw: Vec<u8>,
    /// Outcome of the matching state machine
    pub status: MatchStatus,
}

impl std::fmt::Display for ObservedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} TID={} ESV={} {} SEOJ={} DEOJ={} OPC={} RAW={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.source,
            self.frame.tid,
            self.frame.esv,
            self.status,
            self.frame.seoj,
            self.frame.deoj,
            self.frame.properties.len(),
            hex::encode(&self.raw)
        )
    }
}

/// One entry appended to the monitor's log sink
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MonitorEvent {
    /// A decoded datagram was observed
    Frame(ObservedFrame),
    /// A protocol violation was detected
    Anomaly(Anomaly),
    /// A datagram failed to decode and was discarded
    DecodeFailure {
        /// Wall-clock time of observation
        timestamp: DateTime<Local>,
        /// Datagram source address
        source: SocketAddr,
        /// Why decoding failed
        error: FrameError,
        /// Raw datagram bytes
        raw: Vec<u8>,
    },
}

impl std::fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorEvent::Frame(observed) => write!(f, "{}", observed),
            MonitorEvent::Anomaly(anomaly) => write!(f, "ALERT: {}", anomaly),
            MonitorEvent::DecodeFailure {
                timestamp,
                source,
                error,
                raw,
            } => write!(
                f,
                "[{}] {} DISCARDED ({}) RAW={}",
                timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
                source,
                error,
                hex::encode(raw)
            ),
        }
    }
}

/// Append-only sink receiving one entry per observation and per anomaly
///
/// The monitor only ever appends; rotation and retention are the sink's
/// concern.
pub trait MonitorSink: Send {
    /// Append one event
    fn append(&mut self, event: &MonitorEvent);
}

/// Sink writing every event through the `log` facade
///
/// Observations log at info level, anomalies and decode failures at warn.
#[derive(Debug, Default)]
pub struct LogSink;

impl MonitorSink for LogSink {
    fn append(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Frame(_) => log::info!("{}", event),
            MonitorEvent::Anomaly(_) | MonitorEvent::DecodeFailure { .. } => {
                log::warn!("{}", event)
            }
        }
    }
}

impl MonitorSink for Vec<MonitorEvent> {
    fn append(&mut self, event: &MonitorEvent) {
        self.push(event.clone());
    }
}

/// One outstanding request awaiting its response
struct PendingRequest {
    /// The originating request frame
    frame: Frame,
    /// Monotonic arrival time, used for timeout eviction
    received_at: Instant,
    /// A correctly paired response has arrived
    matched: bool,
    /// Any response (matched or not) has been recorded
    responded: bool,
}

/// Pending-request table plus sink; shared between the receive loop and the
/// sweep under one lock
struct MonitorState {
    pending: HashMap<u16, PendingRequest>,
    sink: Box<dyn MonitorSink>,
}

impl MonitorState {
    fn new(sink: Box<dyn MonitorSink>) -> Self {
        Self {
            pending: HashMap::new(),
            sink,
        }
    }

    /// Decode and classify one datagram; malformed input is logged and
    /// discarded
    fn handle_datagram(&mut self, data: &[u8], source: SocketAddr, now: Instant) {
        match Frame::decode(data) {
            Ok(frame) => self.handle_frame(frame, data, source, now),
            Err(error) => {
                log::warn!("undecodable datagram from {}: {}", source, error);
                self.sink.append(&MonitorEvent::DecodeFailure {
                    timestamp: Local::now(),
                    source,
                    error,
                    raw: data.to_vec(),
                });
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, raw: &[u8], source: SocketAddr, now: Instant) {
        let (status, anomalies) = if frame.esv.is_request() {
            self.track_request(&frame, now)
        } else if frame.esv.is_response() {
            self.match_response(&frame)
        } else {
            (MatchStatus::Other, Vec::new())
        };

        self.sink.append(&MonitorEvent::Frame(ObservedFrame {
            timestamp: Local::now(),
            source,
            frame,
            raw: raw.to_vec(),
            status,
        }));
        for anomaly in anomalies {
            log::warn!("{}", anomaly);
            self.sink.append(&MonitorEvent::Anomaly(anomaly));
        }
    }

    fn track_request(&mut self, frame: &Frame, now: Instant) -> (MatchStatus, Vec<Anomaly>) {
        let mut anomalies = Vec::new();
        if let Some(previous) = self.pending.get(&frame.tid) {
            // Reissuing a live id is a violation; reuse after the previous
            // transaction reached a terminal state is a fresh instance.
            if !previous.matched {
                anomalies.push(Anomaly::TidReused { tid: frame.tid });
            }
        }
        self.pending.insert(
            frame.tid,
            PendingRequest {
                frame: frame.clone(),
                received_at: now,
                matched: false,
                responded: false,
            },
        );
        (MatchStatus::Request, anomalies)
    }

    fn match_response(&mut self, frame: &Frame) -> (MatchStatus, Vec<Anomaly>) {
        let mut anomalies = Vec::new();
        let Some(request) = self.pending.get_mut(&frame.tid) else {
            anomalies.push(Anomaly::UnmatchedResponse { tid: frame.tid });
            return (MatchStatus::UnmatchedResponse, anomalies);
        };

        let mut status = if frame.seoj != request.frame.deoj {
            anomalies.push(Anomaly::MismatchedSource {
                tid: frame.tid,
                expected: request.frame.deoj,
                actual: frame.seoj,
            });
            MatchStatus::MismatchedSource
        } else if request.frame.esv.response_pair() != Some(frame.esv) {
            anomalies.push(Anomaly::MismatchedServiceCode {
                tid: frame.tid,
                request_esv: request.frame.esv,
                response_esv: frame.esv,
            });
            MatchStatus::MismatchedServiceCode
        } else {
            request.matched = true;
            MatchStatus::Matched
        };

        if request.responded {
            anomalies.push(Anomaly::DuplicateResponse { tid: frame.tid });
            status = MatchStatus::DuplicateResponse;
        }
        request.responded = true;
        (status, anomalies)
    }

    /// Evict entries older than `timeout`; unanswered ones are anomalies,
    /// matched ones leave silently
    fn sweep(&mut self, now: Instant, timeout: Duration) {
        let MonitorState { pending, sink } = self;
        pending.retain(|&tid, request| {
            let waited = now.duration_since(request.received_at);
            if waited <= timeout {
                return true;
            }
            if !request.matched {
                let anomaly = Anomaly::RequestTimedOut { tid, waited };
                log::warn!("{}", anomaly);
                sink.append(&MonitorEvent::Anomaly(anomaly));
            }
            false
        });
    }
}

/// Passive monitor of all ECHONET Lite traffic on one port
pub struct TrafficMonitor {
    config: MonitorConfig,
    state: Arc<Mutex<MonitorState>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl TrafficMonitor {
    /// Create a monitor; no socket is bound until [`TrafficMonitor::start`]
    pub fn new(config: MonitorConfig, sink: Box<dyn MonitorSink>) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MonitorState::new(sink))),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            local_addr: None,
        }
    }

    /// Bind the socket and spawn the receive loop and the timeout sweep
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }

        // Reuse-address so a client on this host can share port 3610.
        let socket = bind_socket(self.config.bind_address, self.config.port, true, true)?;
        socket.set_read_timeout(Some(self.config.poll_timeout))?;
        self.local_addr = Some(socket.local_addr()?);
        self.running.store(true, Ordering::SeqCst);
        log::info!("traffic monitor listening on {:?}", self.local_addr);

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let buffer_size = self.config.buffer_size;
        let receive_loop = thread::spawn(move || {
            let mut buffer = vec![0u8; buffer_size];
            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buffer) {
                    Ok((len, source)) => {
                        let Ok(mut state) = state.lock() else { break };
                        state.handle_datagram(&buffer[..len], source, Instant::now());
                    }
                    Err(e)
                        if e.kind() == ErrorKind::WouldBlock
                            || e.kind() == ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => log::error!("receive error: {}", e),
                }
            }
        });

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let interval = self.config.sweep_interval;
        let timeout = self.config.request_timeout;
        let sweep_loop = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(interval);
                let Ok(mut state) = state.lock() else { break };
                state.sweep(Instant::now(), timeout);
            }
        });

        self.threads = vec![receive_loop, sweep_loop];
        Ok(())
    }

    /// Stop both threads and wait for them to finish
    ///
    /// Returns within roughly one poll timeout plus one sweep interval.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Whether the monitor threads are running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound socket address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.state.lock().map(|state| state.pending.len()).unwrap_or(0)
    }
}

impl Drop for TrafficMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn request_frame(tid: u16, esv: Esv) -> Frame {
        Frame::request(
            tid,
            EchonetObject::CONTROLLER,
            EchonetObject::SOLAR_POWER,
            esv,
            0x80,
            Vec::new(),
        )
    }

    fn response_frame(tid: u16, esv: Esv, seoj: EchonetObject) -> Frame {
        Frame::request(
            tid,
            seoj,
            EchonetObject::CONTROLLER,
            esv,
            0x80,
            vec![0x30],
        )
    }

    /// State with a Vec sink we can inspect through the returned handle.
    fn test_state() -> (MonitorState, Arc<Mutex<Vec<MonitorEvent>>>) {
        struct SharedSink(Arc<Mutex<Vec<MonitorEvent>>>);
        impl MonitorSink for SharedSink {
            fn append(&mut self, event: &MonitorEvent) {
                self.0.lock().unwrap().push(event.clone());
            }
        }
        let events = Arc::new(Mutex::new(Vec::new()));
        let state = MonitorState::new(Box::new(SharedSink(Arc::clone(&events))));
        (state, events)
    }

    fn observe(state: &mut MonitorState, frame: &Frame, now: Instant) {
        let raw = frame.encode().unwrap();
        state.handle_datagram(&raw, addr(3610), now);
    }

    fn anomalies(events: &Arc<Mutex<Vec<MonitorEvent>>>) -> Vec<Anomaly> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                MonitorEvent::Anomaly(anomaly) => Some(anomaly.clone()),
                _ => None,
            })
            .collect()
    }

    fn statuses(events: &Arc<Mutex<Vec<MonitorEvent>>>) -> Vec<MatchStatus> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                MonitorEvent::Frame(observed) => Some(observed.status),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_matched_pair_records_no_anomalies() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(5, Esv::Get), now);
        observe(
            &mut state,
            &response_frame(5, Esv::GetRes, EchonetObject::SOLAR_POWER),
            now,
        );

        assert_eq!(
            statuses(&events),
            vec![MatchStatus::Request, MatchStatus::Matched]
        );
        assert!(anomalies(&events).is_empty());
        assert!(state.pending.get(&5).unwrap().matched);
    }

    #[test]
    fn test_unmatched_response() {
        let (mut state, events) = test_state();
        observe(
            &mut state,
            &response_frame(7, Esv::GetRes, EchonetObject::SOLAR_POWER),
            Instant::now(),
        );

        assert_eq!(anomalies(&events), vec![Anomaly::UnmatchedResponse { tid: 7 }]);
        // No entry is created for an orphaned response.
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_request_times_out() {
        let (mut state, events) = test_state();
        let start = Instant::now();
        observe(&mut state, &request_frame(9, Esv::Get), start);

        // First sweep inside the window keeps the entry.
        state.sweep(start + Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(state.pending.len(), 1);

        state.sweep(start + Duration::from_secs(6), Duration::from_secs(5));
        let found = anomalies(&events);
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0], Anomaly::RequestTimedOut { tid: 9, .. }));
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_tid_reuse_over_live_request() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(3, Esv::Get), now);
        observe(&mut state, &request_frame(3, Esv::Get), now);

        assert_eq!(anomalies(&events), vec![Anomaly::TidReused { tid: 3 }]);
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn test_tid_reuse_after_terminal_state_is_clean() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(3, Esv::Get), now);
        observe(
            &mut state,
            &response_frame(3, Esv::GetRes, EchonetObject::SOLAR_POWER),
            now,
        );
        // Wraparound reissues the id after the previous instance matched.
        observe(&mut state, &request_frame(3, Esv::Get), now);

        assert!(anomalies(&events).is_empty());
        assert!(!state.pending.get(&3).unwrap().matched);
    }

    #[test]
    fn test_mismatched_source() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(4, Esv::Get), now);
        observe(
            &mut state,
            &response_frame(4, Esv::GetRes, EchonetObject::NODE_PROFILE),
            now,
        );

        assert_eq!(
            anomalies(&events),
            vec![Anomaly::MismatchedSource {
                tid: 4,
                expected: EchonetObject::SOLAR_POWER,
                actual: EchonetObject::NODE_PROFILE,
            }]
        );
        // The entry stays unmatched and will eventually time out.
        assert!(!state.pending.get(&4).unwrap().matched);
    }

    #[test]
    fn test_mismatched_service_code() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(6, Esv::Get), now);
        // Get pairs with 0x72; a 0x71 reply is a violation.
        observe(
            &mut state,
            &response_frame(6, Esv::SetRes, EchonetObject::SOLAR_POWER),
            now,
        );

        assert_eq!(
            anomalies(&events),
            vec![Anomaly::MismatchedServiceCode {
                tid: 6,
                request_esv: Esv::Get,
                response_esv: Esv::SetRes,
            }]
        );
    }

    #[test]
    fn test_set_no_response_pairs_with_0x71() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(8, Esv::SetI), now);
        observe(
            &mut state,
            &response_frame(8, Esv::SetRes, EchonetObject::SOLAR_POWER),
            now,
        );
        assert!(anomalies(&events).is_empty());
        assert!(state.pending.get(&8).unwrap().matched);
    }

    #[test]
    fn test_duplicate_response() {
        let (mut state, events) = test_state();
        let now = Instant::now();
        observe(&mut state, &request_frame(2, Esv::Get), now);
        let response = response_frame(2, Esv::GetRes, EchonetObject::SOLAR_POWER);
        observe(&mut state, &response, now);
        observe(&mut state, &response, now);

        assert_eq!(anomalies(&events), vec![Anomaly::DuplicateResponse { tid: 2 }]);
        assert_eq!(
            statuses(&events),
            vec![
                MatchStatus::Request,
                MatchStatus::Matched,
                MatchStatus::DuplicateResponse,
            ]
        );
    }

    #[test]
    fn test_malformed_datagram_is_discarded() {
        let (mut state, events) = test_state();
        state.handle_datagram(&[0xDE, 0xAD, 0xBE], addr(3610), Instant::now());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            MonitorEvent::DecodeFailure {
                error: FrameError::Truncated,
                ..
            }
        ));
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_non_request_non_response_is_other() {
        let (mut state, events) = test_state();
        observe(
            &mut state,
            &request_frame(11, Esv::Unknown(0x74)),
            Instant::now(),
        );
        assert_eq!(statuses(&events), vec![MatchStatus::Other]);
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_live_monitor_observes_loopback_traffic() {
        struct ChannelSink(mpsc::Sender<MonitorEvent>);
        impl MonitorSink for ChannelSink {
            fn append(&mut self, event: &MonitorEvent) {
                let _ = self.0.send(event.clone());
            }
        }

        let (tx, rx) = mpsc::channel();
        let config = MonitorConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // ephemeral so tests never collide
            sweep_interval: Duration::from_millis(50),
            poll_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let mut monitor = TrafficMonitor::new(config, Box::new(ChannelSink(tx)));
        monitor.start().unwrap();
        let dest = monitor.local_addr().unwrap();

        let sender = UdpSocket::bind(addr(0)).unwrap();
        let request = request_frame(21, Esv::Get).encode().unwrap();
        sender.send_to(&request, dest).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            MonitorEvent::Frame(observed) => {
                assert_eq!(observed.frame.tid, 21);
                assert_eq!(observed.status, MatchStatus::Request);
            }
            other => panic!("expected frame event, got {:?}", other),
        }
        assert_eq!(monitor.pending_count(), 1);

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
