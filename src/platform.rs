//! Operating-system services
//!
//! The engine runs in interrupt context and on an event queue. Both are owned
//! by the platform, which exposes them through [`Platform`].

use core::fmt;

/// Handle of a scheduled timer
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimerHandle(pub u32);

/// Direction of a processed frame
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// A frame was received from the clock master
    Rx,
    /// This node transmitted a frame
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("rx"),
            Direction::Tx => f.write_str("tx"),
        }
    }
}

/// Work deferred from interrupt context to the event queue
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    /// The clock calibration timer expired
    CcpTimer,
    /// A frame was accepted and its record is ready for postprocessing
    CcpPostprocess {
        /// Whether the frame was received or sent
        direction: Direction,
        /// Event index the record was captured at
        index: u32,
    },
}

/// Timer and event queue services
pub trait Platform {
    /// Schedules a single [`Event::CcpTimer`] after `delay_us` microseconds
    ///
    /// Scheduling again replaces any pending expiry.
    fn schedule_once(&mut self, delay_us: u32) -> TimerHandle;

    /// Cancels a pending expiry
    ///
    /// Cancelling a timer that already fired is a no-op.
    fn cancel(&mut self, handle: TimerHandle);

    /// Queues an event for later processing
    ///
    /// Gives the event back if the queue is full.
    fn enqueue(&mut self, event: Event) -> Result<(), Event>;

    /// Current uptime in microseconds
    fn uptime_us(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_displays_lowercase() {
        assert_eq!(format!("{}", Direction::Rx), "rx");
        assert_eq!(format!("{}", Direction::Tx), "tx");
    }
}
