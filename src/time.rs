//! Time-related types based on the DW1000's system time
//!
//! The DW1000 counts system time in 40-bit units of roughly 15.65 ps. One
//! microsecond is close to 2^16 of those units, which is what the CCP period
//! conversion relies on.

use core::ops::Add;
use serde::{Deserialize, Serialize};

/// The maximum value of 40-bit system time stamps.
pub const TIME_MAX: u64 = 0xffffffffff;

/// Shift that turns a period in microseconds into half that period in device
/// time units
pub const PERIOD_SHIFT: u32 = 15;

/// Represents an instant in time
///
/// Internally uses the same 40-bit timestamps that the DW1000 uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[repr(C)]
pub struct Instant(u64);

impl Instant {
    /// Creates a new instance of `Instant`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use dw1000_ccp::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// let valid_instant   = Instant::new(TIME_MAX);
    /// let invalid_instant = Instant::new(TIME_MAX + 1);
    ///
    /// assert!(valid_instant.is_some());
    /// assert!(invalid_instant.is_none());
    /// ```
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Instant(value))
        } else {
            None
        }
    }

    /// Creates an `Instant` from a raw 64-bit register or frame value
    ///
    /// The DW1000 leaves the upper 24 bits of its timestamps unused, so they
    /// are discarded here.
    pub fn from_raw(value: u64) -> Self {
        Instant(value & TIME_MAX)
    }

    /// Returns the raw 40-bit timestamp
    ///
    /// The returned value is guaranteed to be in the following range:
    /// 0 <= `value` <= 2^40 - 1
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the amount of time passed between the two `Instant`s
    ///
    /// Assumes that `&self` represents a later time than the argument
    /// `earlier`. DW1000 timestamps overflow, so comparing the numerical
    /// value of the timestamps doesn't tell anything about order.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use dw1000_ccp::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// let instant_1 = Instant::new(TIME_MAX - 50).unwrap();
    /// let instant_2 = Instant::new(TIME_MAX).unwrap();
    /// let instant_3 = Instant::new(49).unwrap();
    ///
    /// let duration = instant_2.duration_since(instant_1);
    /// assert_eq!(duration.value(), 50);
    ///
    /// // Still works if the later timestamp is the numerically smaller value.
    /// let duration = instant_3.duration_since(instant_2);
    /// assert_eq!(duration.value(), 50);
    /// ```
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        if self.value() >= earlier.value() {
            Duration(self.value() - earlier.value())
        } else {
            Duration(TIME_MAX - earlier.value() + self.value() + 1)
        }
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        // Both operands hold 40-bit numbers, so the sum fits into 41 bits and
        // the wrap-around keeps it within `TIME_MAX`.
        Instant((self.value() + rhs.value()) % (TIME_MAX + 1))
    }
}

/// A duration between two instants in DW1000 system time
///
/// Internally uses the same 40-bit timestamps that the DW1000 uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[repr(C)]
pub struct Duration(u64);

impl Duration {
    /// Creates a new instance of `Duration`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Duration(value))
        } else {
            None
        }
    }

    /// Scales a CCP period, given in microseconds, to device time units
    ///
    /// This is the left shift the calibration schedule is built on:
    /// `period << 15`, which is half of `period` microseconds in device time.
    /// A full broadcast interval is twice this value.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use dw1000_ccp::time::Duration;
    ///
    /// assert_eq!(Duration::from_period(1000).value(), 1000 << 15);
    /// ```
    pub fn from_period(period_us: u32) -> Self {
        // A `u32` shifted by 15 bits takes up at most 47 bits, so keep it
        // within the 40-bit range of the device clock.
        Duration(((period_us as u64) << PERIOD_SHIFT) & TIME_MAX)
    }

    /// Returns the raw 40-bit duration
    ///
    /// The returned value is guaranteed to be in the following range:
    /// 0 <= `value` <= 2^40 - 1
    pub fn value(&self) -> u64 {
        self.0
    }
}
