/// Report window state machine.
///
/// An external timer service fires `tick` once per report period; the
/// reporter reads the shared engine, hands the count to the observer, and
/// resets according to the counting mode. The reporter never owns the
/// timer: `start`/`stop` only track whether ticks are honored, so a tick
/// that races a stop is dropped instead of reporting from a dead session.
use crate::engine::SharedEngine;
use crate::error::CounterError;

/// How the running count behaves across report windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    /// Reset after every report: each window counts only its own devices.
    Interval,
    /// Never auto-reset: the count grows until an explicit external reset.
    Cumulative,
    /// Reset every window and go idle after a fixed number of windows.
    CountLimited,
}

impl CounterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterMode::Interval => "interval",
            CounterMode::Cumulative => "cumulative",
            CounterMode::CountLimited => "count_limited",
        }
    }
}

/// Reporter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    /// No live timer; ticks are ignored.
    Idle,
    /// Periodic ticks are being honored.
    Active,
}

/// Receives per-window counts and the end-of-session notification.
///
/// Both calls are synchronous from the tick context and must be bounded:
/// queue the data and return. The engine lock is never held during either
/// call, so `on_report` may query the counter it is embedded in.
pub trait CountObserver {
    /// One completed window with its unique-device count.
    fn on_report(&mut self, count: u32);

    /// Fired exactly once when a count-limited session reaches its window
    /// limit.
    fn on_session_complete(&mut self) {}
}

/// What a tick did, so the controller can react.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The reporter was idle; a stale timer fire was dropped.
    Ignored,
    /// A window was reported; the session continues.
    Reported,
    /// The final window of a count-limited session was reported; the scan
    /// driver should be stopped.
    Finished,
}

pub struct Reporter {
    state: ReporterState,
    mode: CounterMode,
    period_secs: u16,
    window_limit: u16,
    completed_windows: u32,
}

impl Reporter {
    pub const fn new() -> Self {
        Self {
            state: ReporterState::Idle,
            mode: CounterMode::Interval,
            period_secs: 0,
            window_limit: 0,
            completed_windows: 0,
        }
    }

    /// Arm the reporter for a new session: counting mode and, for
    /// count-limited sessions, the number of windows before self-stop
    /// (0 = unbounded). Does not activate ticking.
    pub fn arm(&mut self, mode: CounterMode, window_limit: u16) {
        self.mode = mode;
        self.window_limit = window_limit;
        self.completed_windows = 0;
    }

    /// Idle → Active. Rejected while Active: two live timers must never
    /// exist for one reporter.
    pub fn start(&mut self, period_secs: u16) -> Result<(), CounterError> {
        if self.state == ReporterState::Active {
            log::warn!("reporter already active, ignoring start");
            return Err(CounterError::AlreadyRunning);
        }
        self.period_secs = period_secs;
        self.state = ReporterState::Active;
        Ok(())
    }

    /// Active → Idle, or Idle → Idle. Always safe.
    pub fn stop(&mut self) {
        self.state = ReporterState::Idle;
    }

    /// Handle one timer fire.
    ///
    /// Interval mode reports and resets the window; cumulative mode reports
    /// the running total and keeps it; count-limited mode reports, resets,
    /// and after the configured number of windows goes idle and notifies
    /// the observer once. The high-water mark is captured inside every
    /// reset, in all modes.
    pub fn tick(&mut self, engine: &SharedEngine, observer: &mut dyn CountObserver) -> Tick {
        if self.state != ReporterState::Active {
            // A timer fire can race a stop; drop it.
            return Tick::Ignored;
        }

        match self.mode {
            CounterMode::Interval => {
                let count = engine.take_window();
                self.completed_windows += 1;
                observer.on_report(count);
                Tick::Reported
            }
            CounterMode::Cumulative => {
                self.completed_windows += 1;
                observer.on_report(engine.count());
                Tick::Reported
            }
            CounterMode::CountLimited => {
                let count = engine.take_window();
                self.completed_windows += 1;
                observer.on_report(count);
                let limit = u32::from(self.window_limit);
                if limit > 0 && self.completed_windows >= limit {
                    self.state = ReporterState::Idle;
                    observer.on_session_complete();
                    Tick::Finished
                } else {
                    Tick::Reported
                }
            }
        }
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ReporterState::Active
    }

    pub fn mode(&self) -> CounterMode {
        self.mode
    }

    /// Report period for the external timer service to arm.
    pub fn period_secs(&self) -> u16 {
        self.period_secs
    }

    /// Windows completed since the reporter was armed.
    pub fn completed_windows(&self) -> u32 {
        self.completed_windows
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
