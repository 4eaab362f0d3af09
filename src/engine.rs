/// Device ingestion and unique counting.
///
/// Derives a 16-bit identifier from the last two bytes of a 6-byte hardware
/// address and records it at most once per window. The full address is
/// never stored; two addresses sharing their last two bytes collide and
/// count as one device, the deliberate memory/time tradeoff that keeps the
/// whole seen-set at a fixed 8 KiB.
///
/// [`SharedEngine`] wraps the state in a critical-section mutex so the scan
/// driver's ingest callback and the report tick can run from independent
/// execution contexts. The set and the running count are guarded as one
/// unit; `take_window` makes the tick's read-then-clear atomic, so an
/// identifier recorded during a window swap lands in exactly one window.
use core::cell::RefCell;

use critical_section::Mutex;

use crate::idset::IdSet;

/// Derive the 16-bit identifier from a hardware address.
/// Only the last two bytes participate, little-endian.
#[inline]
pub fn device_id(addr: &[u8; 6]) -> u16 {
    u16::from_le_bytes([addr[4], addr[5]])
}

/// Counting state for one run: the seen-identifier set, the incrementally
/// maintained unique count, and the run's high-water mark.
pub struct CountEngine {
    seen: IdSet,
    unique: u32,
    high_water: u32,
}

impl CountEngine {
    pub const fn new() -> Self {
        Self {
            seen: IdSet::new(),
            unique: 0,
            high_water: 0,
        }
    }

    /// Record one observed address. Returns `true` iff the device was
    /// newly counted in the current window. Sole mutator of the set and
    /// count outside of reset.
    pub fn record(&mut self, addr: &[u8; 6]) -> bool {
        let id = device_id(addr);
        let new = self.seen.insert(id);
        if new {
            self.unique += 1;
            log::trace!(
                "MAC={:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} -> ID={:04x}",
                addr[0],
                addr[1],
                addr[2],
                addr[3],
                addr[4],
                addr[5],
                id
            );
        }
        new
    }

    /// Whether an identifier has been seen in the current window.
    pub fn contains(&self, id: u16) -> bool {
        self.seen.contains(id)
    }

    /// Unique devices counted in the current window.
    pub fn count(&self) -> u32 {
        self.unique
    }

    /// Maximum unique count observed across all windows this run,
    /// including the window in progress. Not persisted across restarts.
    pub fn high_water(&self) -> u32 {
        self.high_water.max(self.unique)
    }

    /// Capture the high-water mark, then zero the set and count.
    pub fn reset(&mut self) {
        if self.unique > self.high_water {
            self.high_water = self.unique;
        }
        self.seen.clear();
        self.unique = 0;
    }

    /// Reset for the next window, returning the pre-reset count.
    pub fn take_window(&mut self) -> u32 {
        let count = self.unique;
        self.reset();
        count
    }

    /// Zero everything for a new run, including the high-water mark.
    pub fn restart(&mut self) {
        self.seen.clear();
        self.unique = 0;
        self.high_water = 0;
    }
}

impl Default for CountEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The counting engine behind a critical-section mutex, shared between the
/// scan driver's ingest callback and the report tick.
pub struct SharedEngine {
    inner: Mutex<RefCell<CountEngine>>,
}

impl SharedEngine {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(CountEngine::new())),
        }
    }

    /// Ingest one observed address. Returns whether the device was newly
    /// counted. Safe from interrupt-adjacent scan driver context.
    pub fn record(&self, addr: &[u8; 6]) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().record(addr))
    }

    /// Whether an identifier has been seen in the current window.
    pub fn contains(&self, id: u16) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().contains(id))
    }

    /// Unique devices counted in the current window.
    pub fn count(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().count())
    }

    /// Maximum unique count observed across all windows this run.
    pub fn high_water(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().high_water())
    }

    /// Zero the set and count, capturing the high-water mark first.
    pub fn reset(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().reset());
    }

    /// Atomically read the current count and reset for the next window.
    pub fn take_window(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().take_window())
    }

    /// Zero everything for a new run, including the high-water mark.
    pub fn restart(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().restart());
    }
}

impl Default for SharedEngine {
    fn default() -> Self {
        Self::new()
    }
}
