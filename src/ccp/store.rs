//! Ring of clock calibration frames
//!
//! Every transmitted or received frame occupies one slot. The slot of an event
//! is its index modulo the number of slots, so the current and the previous
//! event never share a slot as long as there are at least two.

use heapless::Vec;

use crate::frame::CcpFrame;

/// Largest supported number of slots
pub const MAX_FRAMES: usize = 16;

/// Smallest supported number of slots
pub const MIN_FRAMES: usize = 2;

/// Fixed-size ring of [`CcpFrame`]s addressed by a monotonically increasing
/// event index
#[derive(Debug)]
pub struct FrameStore {
    frames: Vec<CcpFrame, MAX_FRAMES>,
    index: u32,
}

impl FrameStore {
    /// Creates a store with `frame_count` slots
    ///
    /// Returns `None` unless `frame_count` is within
    /// `MIN_FRAMES..=MAX_FRAMES`.
    pub fn new(frame_count: usize) -> Option<Self> {
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&frame_count) {
            return None;
        }

        let mut frames = Vec::new();
        for _ in 0..frame_count {
            frames.push(CcpFrame::template()).ok()?;
        }

        Some(FrameStore { frames, index: 0 })
    }

    /// Number of slots
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Event index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Resets the event index, leaving the slot contents in place
    pub fn reset_index(&mut self) {
        self.index = 0;
    }

    /// Moves on to the next event
    pub fn advance(&mut self) {
        self.index = self.index.wrapping_add(1);
    }

    /// Slot of the event at `index`
    pub fn slot(&self, index: u32) -> usize {
        (index % self.frames.len() as u32) as usize
    }

    /// Slot of the event before the one at `index`
    ///
    /// For index 0 this is the last slot.
    pub fn slot_before(&self, index: u32) -> usize {
        let n = self.frames.len();
        (self.slot(index) + n - 1) % n
    }

    /// Frame of the event at `index`
    pub fn get(&self, index: u32) -> &CcpFrame {
        &self.frames[self.slot(index)]
    }

    /// Frame of the event before the one at `index`
    pub fn get_before(&self, index: u32) -> &CcpFrame {
        &self.frames[self.slot_before(index)]
    }

    /// Frame of the current event
    pub fn current(&self) -> &CcpFrame {
        self.get(self.index)
    }

    /// Frame of the current event, mutably
    pub fn current_mut(&mut self) -> &mut CcpFrame {
        let slot = self.slot(self.index);
        &mut self.frames[slot]
    }

    /// Frame of the previous event
    pub fn previous(&self) -> &CcpFrame {
        self.get_before(self.index)
    }

    /// Frame of the previous event, mutably
    pub fn previous_mut(&mut self) -> &mut CcpFrame {
        let slot = self.slot_before(self.index);
        &mut self.frames[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_frame_counts() {
        assert!(FrameStore::new(0).is_none());
        assert!(FrameStore::new(1).is_none());
        assert!(FrameStore::new(MAX_FRAMES + 1).is_none());
        assert!(FrameStore::new(MIN_FRAMES).is_some());
        assert!(FrameStore::new(MAX_FRAMES).is_some());
    }

    #[test]
    fn previous_of_the_first_event_is_the_last_slot() {
        let store = FrameStore::new(3).unwrap();

        assert_eq!(store.slot(0), 0);
        assert_eq!(store.slot_before(0), 2);
    }

    #[test]
    fn current_and_previous_never_alias() {
        for n in MIN_FRAMES..=MAX_FRAMES {
            let mut store = FrameStore::new(n).unwrap();

            for _ in 0..3 * n {
                assert_ne!(
                    store.slot(store.index()),
                    store.slot_before(store.index())
                );
                store.advance();
            }
        }
    }

    #[test]
    fn non_power_of_two_counts_wrap_at_the_count() {
        let mut store = FrameStore::new(5).unwrap();
        for _ in 0..7 {
            store.advance();
        }

        assert_eq!(store.index(), 7);
        assert_eq!(store.slot(store.index()), 2);
        assert_eq!(store.slot_before(store.index()), 1);
    }

    #[test]
    fn writes_land_in_the_addressed_slot() {
        let mut store = FrameStore::new(2).unwrap();

        store.current_mut().transmission_timestamp = 10;
        store.previous_mut().transmission_timestamp = 20;
        store.advance();

        assert_eq!(store.previous().transmission_timestamp, 10);
        assert_eq!(store.current().transmission_timestamp, 20);
        assert_eq!(store.get(4).transmission_timestamp, 10);
    }
}
