//! Configuration structs for the clock calibration protocol
//!
//! These are the build-time knobs of a deployment. They are handed to
//! [`Device::new`] once and stay constant for the lifetime of the device.
//!
//! [`Device::new`]: ../device/struct.Device.html#method.new

use crate::{
    mac,
    time::{PERIOD_SHIFT, TIME_MAX},
};

/// Clock calibration configuration
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CcpConfig {
    /// Target interval between two broadcasts, in microseconds
    pub period: u32,
    /// Scheduling guard, in microseconds
    ///
    /// The timer fires this long before the next broadcast is due, so the
    /// delayed start is always armed for an instant in the future.
    pub os_latency: u32,
    /// Delay between `start` and the first timer expiry, in microseconds
    pub start_delay: u32,
    /// Enables the deferred postprocessing of every valid event
    pub postprocess: bool,
}

impl Default for CcpConfig {
    fn default() -> Self {
        CcpConfig {
            period: 1_000_000,
            os_latency: 2_000,
            start_delay: 10_000,
            postprocess: true,
        }
    }
}

impl CcpConfig {
    /// Checks that the timer can fire ahead of every broadcast, and that a
    /// full broadcast interval fits into the 40-bit device clock
    pub fn validate(&self) -> bool {
        let interval = ((self.period as u64) << PERIOD_SHIFT) * 2;

        self.period > 0 && self.os_latency < self.period && interval <= TIME_MAX
    }

    /// Delay between a completed broadcast and the next timer expiry
    pub fn timer_delay(&self) -> u32 {
        self.period - self.os_latency
    }
}

/// Device configuration
#[derive(Clone, Copy, Debug)]
pub struct DeviceConfig {
    /// Short address of this node
    pub short_address: mac::ShortAddress,
    /// Clock calibration settings
    pub ccp: CcpConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            short_address: mac::ShortAddress(0x0000),
            ccp: CcpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CcpConfig::default();

        assert!(config.validate());
        assert_eq!(config.timer_delay(), 998_000);
    }

    #[test]
    fn guard_must_be_shorter_than_the_period() {
        let config = CcpConfig {
            period: 1000,
            os_latency: 1000,
            ..Default::default()
        };
        assert!(!config.validate());

        let config = CcpConfig {
            period: 0,
            os_latency: 0,
            ..Default::default()
        };
        assert!(!config.validate());
    }

    #[test]
    fn interval_must_fit_the_device_clock() {
        let config = CcpConfig {
            period: (1 << 24) - 1,
            ..Default::default()
        };
        assert!(config.validate());

        let config = CcpConfig {
            period: 1 << 24,
            ..Default::default()
        };
        assert!(!config.validate());

        let config = CcpConfig {
            period: u32::MAX,
            ..Default::default()
        };
        assert!(!config.validate());
    }
}
