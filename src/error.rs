/// Lifecycle status codes for the counting API.
///
/// Every failure is a rejected operation: prior state is left intact and
/// the caller decides how to surface it through its own logging or
/// telemetry path. Nothing here escalates to termination.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError {
    /// A session is active. Stop it before reinitializing or reconfiguring.
    AlreadyRunning,
    /// `start` was called without an applied configuration.
    NotConfigured,
    /// The configuration enables a capability this build was compiled
    /// without.
    FeatureUnavailable,
    /// Scan window/interval outside the radio's supported range, or the
    /// window exceeds the interval.
    InvalidConfig,
    /// A zero report period would never fire.
    InvalidPeriod,
}

impl core::fmt::Display for CounterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            CounterError::AlreadyRunning => "counting session already running",
            CounterError::NotConfigured => "configuration was not yet set",
            CounterError::FeatureUnavailable => "capability not present in this build",
            CounterError::InvalidConfig => "scan parameters out of range",
            CounterError::InvalidPeriod => "report period must be non-zero",
        };
        f.write_str(msg)
    }
}
