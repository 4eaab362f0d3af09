/// NDJSON report protocol for the serial/companion transport.
///
/// One JSON object per line. Uses `heapless` types for no_std/no-alloc
/// operation. Oversized messages are dropped rather than truncated so the
/// reader never sees a torn record.
use heapless::{Deque, Vec};
use serde::Serialize;

use crate::reporter::{CountObserver, CounterMode};

/// Crate version string, reported in status messages.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 192;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Messages emitted by the counting device.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ReportMessage {
    /// One completed counting window.
    #[serde(rename = "count")]
    Count {
        /// Unique devices counted in the window.
        pax: u32,
        /// Window length in seconds.
        window_secs: u16,
        /// Counting mode: "interval", "cumulative", "count_limited"
        mode: &'static str,
        /// Completed-window ordinal within the session.
        seq: u32,
    },
    /// On-demand device status.
    #[serde(rename = "status")]
    Status {
        running: bool,
        /// Largest window count observed this run.
        high_water: u32,
        version: &'static str,
    },
}

/// Serialize a message to JSON bytes and append the NDJSON newline.
/// Returns the number of bytes written, or None if the message did not fit.
pub fn serialize_message(msg: &ReportMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) if len < buf.len() => {
            buf[len] = b'\n';
            Some(len + 1)
        }
        _ => None,
    }
}

/// Report sink that renders each completed window as an NDJSON `count`
/// message into a bounded queue the transport drains at its own pace.
/// When the queue is full the newest message is dropped so a stalled
/// transport cannot stall the tick context.
pub struct NdjsonReporter {
    window_secs: u16,
    mode: &'static str,
    seq: u32,
    queue: Deque<MsgBuffer, 4>,
}

impl NdjsonReporter {
    pub fn new(window_secs: u16, mode: CounterMode) -> Self {
        Self {
            window_secs,
            mode: mode.as_str(),
            seq: 0,
            queue: Deque::new(),
        }
    }

    /// Drain the oldest rendered message, if any.
    pub fn pop(&mut self) -> Option<MsgBuffer> {
        self.queue.pop_front()
    }
}

impl CountObserver for NdjsonReporter {
    fn on_report(&mut self, count: u32) {
        self.seq += 1;
        let msg = ReportMessage::Count {
            pax: count,
            window_secs: self.window_secs,
            mode: self.mode,
            seq: self.seq,
        };

        let mut buf = MsgBuffer::new();
        buf.resize_default(MAX_MSG_LEN).ok();
        if let Some(len) = serialize_message(&msg, &mut buf) {
            buf.truncate(len);
            if self.queue.push_back(buf).is_err() {
                log::warn!("report queue full, dropping window {}", self.seq);
            }
        }
    }
}
