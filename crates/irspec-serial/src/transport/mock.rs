//! Mock link backed by simulated multiplexer firmware
//!
//! `MockMuxDevice` answers the line protocol the way the controller firmware
//! does and records every line that crosses the wire. Fault switches make it
//! misbehave for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LinkOpener, SerialLink, TransportError};
use crate::config::SerialSettings;
use crate::protocol::{self, MuxCommand};

/// Mock link configuration
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Delay applied to every write and read
    pub latency_ms: u64,
}

/// Ways the simulated firmware can misbehave
#[derive(Debug, Clone, Default)]
pub struct MockFaults {
    /// Answer the liveness probe with something other than `PONG`
    pub wrong_pong: bool,
    /// Acknowledge `MUX <n>` with a malformed echo
    pub malformed_echo: bool,
    /// Answer `GET_MUX` with an unparseable report
    pub garbage_position: bool,
    /// Never answer anything
    pub silent: bool,
    /// Answer the next command only after the host stopped waiting; cleared
    /// once used
    pub late_reply: bool,
    /// Refuse to open the port
    pub fail_open: bool,
}

/// One line crossing the simulated wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// Host → device, tagged with the link that wrote it
    Sent { link: usize, line: String },
    /// Device → host, tagged with the link that read it
    Received { link: usize, line: String },
    /// Device → host, dropped unread when the input buffer was cleared
    Discarded { link: usize, line: String },
}

/// Simulated controller firmware shared by every link opened on it
pub struct MockMuxDevice {
    position: Mutex<i64>,
    faults: Mutex<MockFaults>,
    wire_log: Mutex<Vec<WireEvent>>,
    opened: AtomicUsize,
    live: AtomicUsize,
}

impl Default for MockMuxDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMuxDevice {
    pub fn new() -> Self {
        Self {
            position: Mutex::new(1),
            faults: Mutex::new(MockFaults::default()),
            wire_log: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    pub fn with_faults(faults: MockFaults) -> Self {
        let device = Self::new();
        device.set_faults(faults);
        device
    }

    pub fn set_faults(&self, faults: MockFaults) {
        *self.faults.lock() = faults;
    }

    /// Position the firmware currently holds
    pub fn position(&self) -> i64 {
        *self.position.lock()
    }

    /// Number of handles opened so far
    pub fn opened_handles(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of handles currently open
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Snapshot of everything that crossed the wire
    pub fn wire_log(&self) -> Vec<WireEvent> {
        self.wire_log.lock().clone()
    }

    fn record(&self, event: WireEvent) {
        self.wire_log.lock().push(event);
    }

    /// Consume the one-shot late reply fault
    fn take_late_reply(&self) -> bool {
        std::mem::take(&mut self.faults.lock().late_reply)
    }

    /// Firmware reply to one command line, `None` when it stays silent
    fn respond(&self, line: &str) -> Option<String> {
        let faults = self.faults.lock().clone();
        if faults.silent {
            return None;
        }

        let reply = match MuxCommand::parse(line) {
            MuxCommand::Ping if faults.wrong_pong => "READY".to_string(),
            MuxCommand::Ping => protocol::PROBE_REPLY.to_string(),
            MuxCommand::SetPosition(n) => {
                *self.position.lock() = n;
                if faults.malformed_echo {
                    format!("MUX_SET{}", n)
                } else {
                    protocol::set_ack(n)
                }
            }
            MuxCommand::QueryPosition if faults.garbage_position => "MUX_POS ?".to_string(),
            MuxCommand::QueryPosition => protocol::position_report(self.position()),
            MuxCommand::Unknown(_) => "ERR".to_string(),
        };
        Some(reply)
    }
}

/// Opens links onto a shared `MockMuxDevice`
pub struct MockLinkOpener {
    device: Arc<MockMuxDevice>,
    config: MockConfig,
}

impl MockLinkOpener {
    pub fn new(device: Arc<MockMuxDevice>, config: &MockConfig) -> Self {
        Self {
            device,
            config: config.clone(),
        }
    }

    pub fn device(&self) -> &Arc<MockMuxDevice> {
        &self.device
    }
}

#[async_trait]
impl LinkOpener for MockLinkOpener {
    async fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>, TransportError> {
        if self.device.faults.lock().fail_open {
            return Err(TransportError::ConnectionFailed(format!(
                "{}: no such device",
                settings.port
            )));
        }

        let id = self.device.opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.device.live.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(port = %settings.port, link = id, "Mock link opened");

        Ok(Box::new(MockLink {
            device: self.device.clone(),
            id,
            name: settings.port.clone(),
            latency: Duration::from_millis(self.config.latency_ms),
            pending: VecDeque::new(),
            late: None,
            open: true,
        }))
    }
}

/// One open handle onto the simulated firmware
pub struct MockLink {
    device: Arc<MockMuxDevice>,
    id: usize,
    name: String,
    latency: Duration,
    pending: VecDeque<String>,
    /// Reply held back until the current read times out
    late: Option<String>,
    open: bool,
}

impl MockLink {
    async fn simulate_latency(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.device.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SerialLink for MockLink {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }
        self.device.record(WireEvent::Sent {
            link: self.id,
            line: line.to_string(),
        });
        if let Some(reply) = self.device.respond(line) {
            if self.device.take_late_reply() {
                self.late = Some(reply);
            } else {
                self.pending.push_back(reply);
            }
        }
        self.simulate_latency().await;
        Ok(())
    }

    async fn read_line(&mut self, _timeout: Duration) -> Result<String, TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }
        self.simulate_latency().await;
        match self.pending.pop_front() {
            Some(line) => {
                self.device.record(WireEvent::Received {
                    link: self.id,
                    line: line.clone(),
                });
                Ok(line)
            }
            None => {
                // A held-back reply lands just after the host gave up
                if let Some(late) = self.late.take() {
                    self.pending.push_back(late);
                }
                Err(TransportError::Timeout(format!("no reply from {}", self.name)))
            }
        }
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }
        for line in self.pending.drain(..) {
            self.device.record(WireEvent::Discarded {
                link: self.id,
                line,
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.release();
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.name
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.release();
    }
}
