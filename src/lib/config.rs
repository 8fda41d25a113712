use core::time::Duration;

use crate::modbus::DEFAULT_SLAVE_ADDRESS;

/// How many times the settings batch is written. The drive drops writes now
/// and then, so every batch goes out more than once.
pub const DEFAULT_REPETITIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct ModbusConfig {
    pub slave_address: u8,
    /// Upper bound for every single transport read.
    pub read_timeout: Duration,
    pub repetitions: usize,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            read_timeout: Duration::from_millis(500),
            repetitions: DEFAULT_REPETITIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BleConfig {
    /// Upper bound for every characteristic read or write.
    pub read_timeout: Duration,
    /// Delay between a wifi credential write and the follow-up status read.
    pub wifi_settle: Duration,
    /// Number of TX/RX entries kept in the session traffic log.
    pub log_capacity: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            wifi_settle: Duration::from_secs(2),
            log_capacity: 100,
        }
    }
}
