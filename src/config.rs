/// Configuration record and its versioned storage codec.
///
/// The record persists as a fixed 64-byte little-endian image so it
/// survives firmware updates: major/minor version pair up front, payload
/// at fixed offsets, zero padding, and a CRC-16/CCITT of everything before
/// the checksum in the trailing two bytes. A major-version mismatch or a
/// corrupt image is rejected on load and the caller falls back to
/// [`Config::default_config`]; a minor drift only warns.
use serde::{Deserialize, Serialize};

/// Storage image major version. Bumped on layout changes older firmware
/// must not attempt to read.
pub const MAJOR_VERSION: u8 = 1;

/// Storage image minor version. Bumped on additive changes readable by any
/// firmware sharing the major version.
pub const MINOR_VERSION: u8 = 0;

/// Size in bytes of a serialized configuration image.
pub const STORAGE_SIZE: usize = 64;

// Fixed offsets within the image. Byte 3 is alignment padding; bytes
// 14..62 are reserved for future minor versions and stay zero.
const OFF_MAJOR: usize = 0;
const OFF_MINOR: usize = 1;
const OFF_BLE_ENABLED: usize = 2;
const OFF_RSSI: usize = 4;
const OFF_SCAN_WINDOW: usize = 6;
const OFF_SCAN_INTERVAL: usize = 8;
const OFF_SCAN_DURATION: usize = 10;
const OFF_COUNT_LIMIT: usize = 12;
const OFF_CHECKSUM: usize = STORAGE_SIZE - 2;

/// Scan timing limits supported by the radio, in milliseconds.
pub const SCAN_TIMING_MIN_MS: u16 = 3;
pub const SCAN_TIMING_MAX_MS: u16 = 10_240;

/// Runtime counting configuration. Immutable while a session runs;
/// reconfigure after stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether the BLE scanner is installed and devices are counted.
    pub ble_enabled: bool,
    /// Minimum signal strength (dBm) for a sighting to count. Applied by
    /// the scan driver; opaque to the counting core.
    pub rssi_threshold: i16,
    /// Scan window in milliseconds, 3..=10240.
    pub scan_window_ms: u16,
    /// Scan interval in milliseconds, 3..=10240. Window equal to interval
    /// is a 100% duty cycle.
    pub scan_interval_ms: u16,
    /// Scan duration in seconds; 0 scans until stopped.
    pub scan_duration_secs: u16,
    /// Report windows before a count-limited session self-terminates;
    /// 0 counts until stopped.
    pub scan_count_limit: u16,
}

impl Config {
    /// Baseline configuration: counting disabled, no RSSI filter, 80 ms
    /// window and interval (100% duty cycle), unbounded duration and
    /// window count.
    pub const fn default_config() -> Self {
        Self {
            ble_enabled: false,
            rssi_threshold: 0,
            scan_window_ms: 80,
            scan_interval_ms: 80,
            scan_duration_secs: 0,
            scan_count_limit: 0,
        }
    }

    /// Check the scan timing against the radio limits. The window may not
    /// exceed the interval.
    pub fn scan_timing_valid(&self) -> bool {
        let in_range = |v: u16| (SCAN_TIMING_MIN_MS..=SCAN_TIMING_MAX_MS).contains(&v);
        in_range(self.scan_window_ms)
            && in_range(self.scan_interval_ms)
            && self.scan_window_ms <= self.scan_interval_ms
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Why a stored configuration image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The image was written under an incompatible major version.
    IncompatibleMajorVersion { stored: u8 },
    /// The stored checksum does not match the payload.
    BadChecksum,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::IncompatibleMajorVersion { stored } => write!(
                f,
                "stored config major version {stored} incompatible with {MAJOR_VERSION}"
            ),
            ConfigError::BadChecksum => f.write_str("stored config checksum mismatch"),
        }
    }
}

/// A successfully loaded configuration plus load diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    pub config: Config,
    /// The image was written by a different minor version. Informational;
    /// the payload loaded anyway.
    pub minor_drift: bool,
}

/// CRC-16/CCITT, poly 0x1021, init 0xFFFF, computed bitwise.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Serialize a configuration into its 64-byte storage image.
pub fn serialize(config: &Config) -> [u8; STORAGE_SIZE] {
    let mut buf = [0u8; STORAGE_SIZE];
    buf[OFF_MAJOR] = MAJOR_VERSION;
    buf[OFF_MINOR] = MINOR_VERSION;
    buf[OFF_BLE_ENABLED] = config.ble_enabled as u8;
    buf[OFF_RSSI..OFF_RSSI + 2].copy_from_slice(&config.rssi_threshold.to_le_bytes());
    buf[OFF_SCAN_WINDOW..OFF_SCAN_WINDOW + 2].copy_from_slice(&config.scan_window_ms.to_le_bytes());
    buf[OFF_SCAN_INTERVAL..OFF_SCAN_INTERVAL + 2]
        .copy_from_slice(&config.scan_interval_ms.to_le_bytes());
    buf[OFF_SCAN_DURATION..OFF_SCAN_DURATION + 2]
        .copy_from_slice(&config.scan_duration_secs.to_le_bytes());
    buf[OFF_COUNT_LIMIT..OFF_COUNT_LIMIT + 2]
        .copy_from_slice(&config.scan_count_limit.to_le_bytes());
    let crc = crc16(&buf[..OFF_CHECKSUM]);
    buf[OFF_CHECKSUM..].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Load a configuration from a storage image.
///
/// A different major version or a bad checksum is rejected without
/// producing a config. A minor drift loads normally, warns, and is flagged
/// on the result so the caller can surface it.
pub fn deserialize(buf: &[u8; STORAGE_SIZE]) -> Result<Loaded, ConfigError> {
    if buf[OFF_MAJOR] != MAJOR_VERSION {
        return Err(ConfigError::IncompatibleMajorVersion {
            stored: buf[OFF_MAJOR],
        });
    }
    let stored_crc = u16::from_le_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]);
    if stored_crc != crc16(&buf[..OFF_CHECKSUM]) {
        return Err(ConfigError::BadChecksum);
    }

    let minor_drift = buf[OFF_MINOR] != MINOR_VERSION;
    if minor_drift {
        log::warn!(
            "stored config minor version {} differs from {}, loading anyway",
            buf[OFF_MINOR],
            MINOR_VERSION
        );
    }

    let config = Config {
        ble_enabled: buf[OFF_BLE_ENABLED] != 0,
        rssi_threshold: i16::from_le_bytes([buf[OFF_RSSI], buf[OFF_RSSI + 1]]),
        scan_window_ms: u16::from_le_bytes([buf[OFF_SCAN_WINDOW], buf[OFF_SCAN_WINDOW + 1]]),
        scan_interval_ms: u16::from_le_bytes([buf[OFF_SCAN_INTERVAL], buf[OFF_SCAN_INTERVAL + 1]]),
        scan_duration_secs: u16::from_le_bytes([buf[OFF_SCAN_DURATION], buf[OFF_SCAN_DURATION + 1]]),
        scan_count_limit: u16::from_le_bytes([buf[OFF_COUNT_LIMIT], buf[OFF_COUNT_LIMIT + 1]]),
    };
    Ok(Loaded {
        config,
        minor_drift,
    })
}
