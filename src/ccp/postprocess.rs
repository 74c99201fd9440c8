//! Deferred consumers of clock calibration events
//!
//! Records are built on the event queue, never in interrupt context, from the
//! frame slots of the event that queued them.

use log::info;

use crate::{
    device::Device,
    frame::CcpFrame,
    platform::{Direction, Platform},
    radio::Radio,
    time::Instant,
};

/// Snapshot of one transmitted or received clock calibration frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostprocessRecord {
    /// Whether the frame was received or sent
    pub direction: Direction,
    /// Uptime when the record was built, in microseconds
    pub utime: u32,
    /// Reception or transmission time stamp of the frame
    pub timestamp: u64,
    /// Time since the previous frame in the same direction, wrapped to 40 bits
    pub delta: u64,
    /// Sequence number of the frame
    pub seq_num: u8,
    /// Correction factor of the frame
    pub correction_factor: f32,
}

impl PostprocessRecord {
    /// Builds the record of `frame`, relative to `previous`
    pub fn new(
        direction: Direction,
        utime: u32,
        frame: &CcpFrame,
        previous: &CcpFrame,
    ) -> Self {
        let (timestamp, previous_timestamp) = match direction {
            Direction::Rx => (frame.reception_timestamp, previous.reception_timestamp),
            Direction::Tx => (
                frame.transmission_timestamp,
                previous.transmission_timestamp,
            ),
        };

        let delta = Instant::from_raw(timestamp)
            .duration_since(Instant::from_raw(previous_timestamp))
            .value();

        PostprocessRecord {
            direction,
            utime,
            timestamp,
            delta,
            seq_num: frame.header.seq_num,
            correction_factor: frame.correction_factor,
        }
    }
}

/// Signature of a postprocess sink
///
/// Called once per valid event, on the event queue.
pub type PostprocessFn<R, P> = fn(&mut Device<R, P>, &PostprocessRecord);

/// Default sink, emits every record as a structured log line
pub fn log_record<R, P>(_: &mut Device<R, P>, record: &PostprocessRecord)
where
    R: Radio,
    P: Platform,
{
    info!(
        "{{\"utime\": {},\"ccp_{}\":[\"{:X}\",\"{:X}\"],\"seq_num\":{},\"cf\":{}}}",
        record.utime,
        record.direction,
        record.timestamp,
        record.delta,
        record.seq_num,
        record.correction_factor,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TIME_MAX;

    fn frame(seq_num: u8, tx: u64, rx: u64) -> CcpFrame {
        let mut frame = CcpFrame::template();
        frame.header.seq_num = seq_num;
        frame.transmission_timestamp = tx;
        frame.reception_timestamp = rx;
        frame
    }

    #[test]
    fn record_picks_the_timestamp_of_its_direction() {
        let previous = frame(1, 100, 1_000);
        let current = frame(2, 300, 1_500);

        let rx = PostprocessRecord::new(Direction::Rx, 7, &current, &previous);
        assert_eq!(rx.timestamp, 1_500);
        assert_eq!(rx.delta, 500);
        assert_eq!(rx.seq_num, 2);
        assert_eq!(rx.utime, 7);

        let tx = PostprocessRecord::new(Direction::Tx, 7, &current, &previous);
        assert_eq!(tx.timestamp, 300);
        assert_eq!(tx.delta, 200);
    }

    #[test]
    fn delta_wraps_with_the_device_clock() {
        let previous = frame(0, 0, TIME_MAX - 9);
        let current = frame(1, 0, 10);

        let record = PostprocessRecord::new(Direction::Rx, 0, &current, &previous);
        assert_eq!(record.delta, 20);
    }
}
