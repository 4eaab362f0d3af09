/// Session lifecycle orchestration.
///
/// Owns the configuration, the shared counting engine, and the report
/// window state machine, and wires them to the two external collaborators:
/// the radio scan driver (via [`ScanDriver`]) and whatever consumes the
/// per-window reports (via [`CountObserver`]). Enforces the call ordering
/// (configure, init, start) and keeps every failure a rejected operation
/// that leaves prior state untouched.
///
/// Ingestion (`on_device_observed`) takes `&self` and is safe concurrently
/// with a tick: the engine lock covers that race. Control operations take
/// `&mut self`; they run on the single control/timer context and ownership
/// enforces their mutual exclusion.
use crate::config::Config;
use crate::engine::SharedEngine;
use crate::error::CounterError;
use crate::reporter::{CountObserver, CounterMode, Reporter, Tick};

/// The external radio scan driver. Implemented by the embedding firmware;
/// the core only tells it when to run and hands it a read-only snapshot of
/// the scan parameters (window, interval, RSSI threshold, duration; all
/// opaque to the counting core).
pub trait ScanDriver {
    /// Apply the scan parameters and start discovering devices.
    /// Discovered addresses flow back through
    /// [`Counter::on_device_observed`].
    fn start(&mut self, config: &Config);

    /// Stop discovering. Must be idempotent.
    fn stop(&mut self);
}

/// Where a counting session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No configuration applied yet.
    Uninitialized,
    /// Configuration applied; ready for init/start.
    Configured,
    /// Counting and reporting.
    Running,
    /// Stopped; counters readable but stale. Reconfigure to start again.
    Stopped,
}

/// The counting session controller.
pub struct Counter<D: ScanDriver, O: CountObserver> {
    engine: SharedEngine,
    reporter: Reporter,
    driver: D,
    observer: O,
    config: Config,
    period_secs: u16,
    state: SessionState,
}

impl<D: ScanDriver, O: CountObserver> Counter<D, O> {
    /// Build a controller around the embedding firmware's scan driver and
    /// report sink. No radio or timer activity until `start`.
    pub fn new(driver: D, observer: O) -> Self {
        Self {
            engine: SharedEngine::new(),
            reporter: Reporter::new(),
            driver,
            observer,
            config: Config::default_config(),
            period_secs: 0,
            state: SessionState::Uninitialized,
        }
    }

    /// Validate and store a configuration.
    ///
    /// Rejected while a session is running: the applied configuration is
    /// immutable until `stop`. A configuration that enables a capability
    /// missing from this build, or whose scan timing is outside the radio
    /// limits, is rejected without touching the stored one.
    pub fn set_config(&mut self, config: Config) -> Result<(), CounterError> {
        if self.state == SessionState::Running {
            return Err(CounterError::AlreadyRunning);
        }
        if config.ble_enabled && !cfg!(feature = "ble") {
            log::warn!("config enables BLE counting but this build has no BLE support");
            return Err(CounterError::FeatureUnavailable);
        }
        if !config.scan_timing_valid() {
            return Err(CounterError::InvalidConfig);
        }
        self.config = config;
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Zero all counting state and arm the reporter for a new session.
    ///
    /// The embedding firmware arms its timer service with the same period
    /// and wires it to [`Counter::tick`]. Callable once configured or after
    /// a stop, never while the reporter is active.
    pub fn init(&mut self, period_secs: u16, mode: CounterMode) -> Result<(), CounterError> {
        if self.reporter.is_active() {
            log::warn!("already active, ignoring init");
            return Err(CounterError::AlreadyRunning);
        }
        if !matches!(self.state, SessionState::Configured | SessionState::Stopped) {
            return Err(CounterError::NotConfigured);
        }
        if period_secs == 0 {
            return Err(CounterError::InvalidPeriod);
        }
        self.engine.restart();
        self.reporter.arm(mode, self.config.scan_count_limit);
        self.period_secs = period_secs;
        Ok(())
    }

    /// Start counting: apply the configuration to the scan driver and
    /// activate the reporter.
    pub fn start(&mut self) -> Result<(), CounterError> {
        if self.state == SessionState::Running {
            return Err(CounterError::AlreadyRunning);
        }
        if self.state != SessionState::Configured {
            return Err(CounterError::NotConfigured);
        }
        if self.period_secs == 0 {
            // init was never called for this session
            return Err(CounterError::InvalidPeriod);
        }
        self.reporter.start(self.period_secs)?;
        self.driver.start(&self.config);
        self.state = SessionState::Running;
        log::info!(
            "counting started: mode {}, period {} s",
            self.reporter.mode().as_str(),
            self.period_secs
        );
        Ok(())
    }

    /// Stop the session. Always safe, idempotent: the reporter goes idle
    /// (late timer fires are dropped), the scan driver is told to stop,
    /// and counters stay readable.
    pub fn stop(&mut self) {
        self.reporter.stop();
        self.driver.stop();
        if self.state != SessionState::Uninitialized {
            self.state = SessionState::Stopped;
        }
        log::info!("counting stopped");
    }

    /// Periodic entry point for the external timer service. When a
    /// count-limited session reaches its window limit, the scan driver is
    /// stopped here as well.
    pub fn tick(&mut self) -> Tick {
        let outcome = self.reporter.tick(&self.engine, &mut self.observer);
        if outcome == Tick::Finished {
            log::info!("window limit reached, stopping scan");
            self.driver.stop();
            self.state = SessionState::Stopped;
        }
        outcome
    }

    /// Ingestion entry point for the scan driver. Returns whether the
    /// address was newly counted in the current window. Safe from
    /// interrupt-adjacent context, concurrently with `tick`.
    pub fn on_device_observed(&self, addr: &[u8; 6]) -> bool {
        self.engine.record(addr)
    }

    /// Current unique count. Readable in any state; stale once stopped.
    pub fn query_count(&self) -> u32 {
        self.engine.count()
    }

    /// Maximum unique count observed across windows this run.
    pub fn high_water_mark(&self) -> u32 {
        self.engine.high_water()
    }

    /// Explicitly zero the window state (capturing the high-water mark).
    /// How cumulative sessions close a counting period.
    pub fn reset_count(&self) {
        self.engine.reset();
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    /// The applied configuration (defaults until `set_config` succeeds).
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The embedding firmware's scan driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The report sink, e.g. to drain queued messages after a tick.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::device_id;

    #[derive(Default)]
    struct StubDriver {
        starts: u32,
        stops: u32,
        last_window_ms: u16,
    }

    impl ScanDriver for StubDriver {
        fn start(&mut self, config: &Config) {
            self.starts += 1;
            self.last_window_ms = config.scan_window_ms;
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    #[derive(Default)]
    struct Recorder {
        reports: Vec<u32>,
        completions: u32,
    }

    impl CountObserver for Recorder {
        fn on_report(&mut self, count: u32) {
            self.reports.push(count);
        }

        fn on_session_complete(&mut self) {
            self.completions += 1;
        }
    }

    fn ble_config() -> Config {
        Config {
            ble_enabled: cfg!(feature = "ble"),
            rssi_threshold: -80,
            ..Config::default_config()
        }
    }

    fn counter() -> Counter<StubDriver, Recorder> {
        Counter::new(StubDriver::default(), Recorder::default())
    }

    // ── Precondition ordering ───────────────────────────────────────

    #[test]
    fn start_before_config_rejected() {
        let mut c = counter();
        assert_eq!(c.start(), Err(CounterError::NotConfigured));
        assert_eq!(c.session_state(), SessionState::Uninitialized);
        assert_eq!(c.driver_mut().starts, 0);
    }

    #[test]
    fn init_before_config_rejected() {
        let mut c = counter();
        assert_eq!(
            c.init(10, CounterMode::Interval),
            Err(CounterError::NotConfigured)
        );
    }

    #[test]
    fn start_without_init_rejected() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        assert_eq!(c.start(), Err(CounterError::InvalidPeriod));
    }

    #[test]
    fn configure_init_start_succeeds() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        assert_eq!(c.session_state(), SessionState::Running);
        assert_eq!(c.driver_mut().starts, 1);
        assert_eq!(c.driver_mut().last_window_ms, 80);
    }

    #[test]
    fn double_start_rejected() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        assert_eq!(c.start(), Err(CounterError::AlreadyRunning));
        assert_eq!(c.driver_mut().starts, 1);
    }

    #[test]
    fn init_while_running_rejected() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        assert_eq!(
            c.init(5, CounterMode::Cumulative),
            Err(CounterError::AlreadyRunning)
        );
    }

    #[test]
    fn init_rejects_zero_period() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        assert_eq!(
            c.init(0, CounterMode::Interval),
            Err(CounterError::InvalidPeriod)
        );
    }

    // ── Configuration validation ────────────────────────────────────

    #[test]
    fn set_config_rejects_bad_scan_timing() {
        let mut c = counter();
        let cfg = Config {
            scan_window_ms: 200,
            scan_interval_ms: 100,
            ..ble_config()
        };
        assert_eq!(c.set_config(cfg), Err(CounterError::InvalidConfig));
        assert_eq!(c.session_state(), SessionState::Uninitialized);
    }

    #[test]
    fn set_config_rejected_while_running() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        assert_eq!(
            c.set_config(Config::default_config()),
            Err(CounterError::AlreadyRunning)
        );
        // Prior config untouched
        assert_eq!(c.config().rssi_threshold, -80);
    }

    #[cfg(not(feature = "ble"))]
    #[test]
    fn ble_config_rejected_without_ble_feature() {
        let mut c = counter();
        let cfg = Config {
            ble_enabled: true,
            ..Config::default_config()
        };
        assert_eq!(c.set_config(cfg), Err(CounterError::FeatureUnavailable));
        assert_eq!(c.session_state(), SessionState::Uninitialized);
    }

    // ── Stop and restart ────────────────────────────────────────────

    #[test]
    fn stop_is_always_safe() {
        let mut c = counter();
        c.stop();
        c.stop();
        assert_eq!(c.session_state(), SessionState::Uninitialized);

        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        c.stop();
        c.stop();
        assert_eq!(c.session_state(), SessionState::Stopped);
        assert!(c.driver_mut().stops >= 1);
    }

    #[test]
    fn restart_requires_reconfiguration() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        c.stop();

        assert_eq!(c.start(), Err(CounterError::NotConfigured));

        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        assert_eq!(c.session_state(), SessionState::Running);
    }

    #[test]
    fn stale_tick_after_stop_ignored() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        c.stop();
        assert_eq!(c.tick(), Tick::Ignored);
        assert!(c.observer_mut().reports.is_empty());
    }

    // ── Counting behavior ───────────────────────────────────────────

    #[test]
    fn interval_window_scenario() {
        // Three unique devices plus one duplicate sighting: the first tick
        // reports 3 and the window is empty afterwards.
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();

        let a = [0x02, 0x11, 0x22, 0x33, 0x01, 0xaa];
        let b = [0x02, 0x11, 0x22, 0x33, 0x02, 0xaa];
        let d = [0x02, 0x11, 0x22, 0x33, 0x03, 0xaa];
        assert!(c.on_device_observed(&a));
        assert!(c.on_device_observed(&b));
        assert!(c.on_device_observed(&d));
        assert!(!c.on_device_observed(&a));
        assert_eq!(c.query_count(), 3);

        assert_eq!(c.tick(), Tick::Reported);
        assert_eq!(c.observer_mut().reports, vec![3]);
        assert_eq!(c.query_count(), 0);
        // All three identifiers gone from the window
        for addr in [&a, &b, &d] {
            assert!(c.on_device_observed(addr), "{:04x} still seen", device_id(addr));
        }
    }

    #[test]
    fn count_limited_session_stops_driver() {
        let mut c = counter();
        let cfg = Config {
            scan_count_limit: 2,
            ..ble_config()
        };
        c.set_config(cfg).unwrap();
        c.init(1, CounterMode::CountLimited).unwrap();
        c.start().unwrap();

        c.on_device_observed(&[0, 0, 0, 0, 1, 1]);
        assert_eq!(c.tick(), Tick::Reported);
        c.on_device_observed(&[0, 0, 0, 0, 2, 1]);
        assert_eq!(c.tick(), Tick::Finished);

        assert_eq!(c.session_state(), SessionState::Stopped);
        assert_eq!(c.observer_mut().reports, vec![1, 1]);
        assert_eq!(c.observer_mut().completions, 1);
        assert_eq!(c.driver_mut().stops, 1);
        assert_eq!(c.tick(), Tick::Ignored);
    }

    #[test]
    fn init_zeroes_previous_run() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        c.start().unwrap();
        for last in 0..5u8 {
            c.on_device_observed(&[0, 0, 0, 0, last, 9]);
        }
        c.stop();
        assert_eq!(c.query_count(), 5); // stale but readable

        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Interval).unwrap();
        assert_eq!(c.query_count(), 0);
        assert_eq!(c.high_water_mark(), 0);
    }

    #[test]
    fn cumulative_reset_is_external() {
        let mut c = counter();
        c.set_config(ble_config()).unwrap();
        c.init(10, CounterMode::Cumulative).unwrap();
        c.start().unwrap();

        for last in 0..4u8 {
            c.on_device_observed(&[0, 0, 0, 0, last, 7]);
        }
        assert_eq!(c.tick(), Tick::Reported);
        assert_eq!(c.query_count(), 4);

        c.reset_count();
        assert_eq!(c.query_count(), 0);
        assert_eq!(c.high_water_mark(), 4);
    }
}
