//! Scripted radio and recording platform for protocol tests

use std::collections::VecDeque;

use crate::{
    ccp::postprocess::PostprocessRecord,
    frame::{BlinkHeader, FrameControl},
    platform::{Event, Platform, TimerHandle},
    radio::{Radio, RegisterId, TxStart},
};

/// Radio that answers from scripted values and records what it is told
#[derive(Debug, Default)]
pub struct MockRadio {
    pub systime: u64,
    pub start_results: VecDeque<TxStart>,
    pub fail_start: bool,
    pub hold_tx: bool,
    pub tx_pending: bool,
    pub rx_buffer: Vec<u8>,
    pub rx_timestamp: u64,
    pub tracking_interval: u64,
    pub tracking_offset: u64,
    pub delayed_starts: Vec<u64>,
    pub payloads: Vec<Vec<u8>>,
    pub frame_control: Option<(u16, bool)>,
    pub wait_for_response: Option<bool>,
    pub starts: usize,
    pub reads: Vec<RegisterId>,
}

impl MockRadio {
    pub fn new() -> Self {
        MockRadio {
            tracking_interval: 0x0100_0000,
            ..Default::default()
        }
    }

    /// Places a received blink header in the receive buffer
    pub fn receive(&mut self, fctrl: FrameControl, seq_num: u8, long_address: u64, timestamp: u64) {
        let header = BlinkHeader {
            fctrl: fctrl.into(),
            seq_num,
            long_address,
        };

        let mut buf = [0; BlinkHeader::LEN];
        ssmarshal::serialize(&mut buf, &header).unwrap();

        self.rx_buffer = buf.to_vec();
        self.rx_timestamp = timestamp;
    }

    pub fn register_reads(&self, register: RegisterId) -> usize {
        self.reads.iter().filter(|&&r| r == register).count()
    }
}

impl Radio for MockRadio {
    type Error = ();

    fn read_system_time(&mut self) -> Result<u64, ()> {
        Ok(self.systime)
    }

    fn read_rx_timestamp(&mut self) -> Result<u64, ()> {
        Ok(self.rx_timestamp)
    }

    fn write_tx_payload(&mut self, bytes: &[u8], offset: u16) -> Result<(), ()> {
        assert_eq!(offset, 0);
        self.payloads.push(bytes.to_vec());
        Ok(())
    }

    fn read_rx_payload(&mut self, buf: &mut [u8], offset: u16) -> Result<(), ()> {
        let offset = offset as usize;
        buf.copy_from_slice(&self.rx_buffer[offset..offset + buf.len()]);
        Ok(())
    }

    fn configure_tx_frame_control(&mut self, length: u16, ranging: bool) -> Result<(), ()> {
        self.frame_control = Some((length, ranging));
        Ok(())
    }

    fn set_wait_for_response(&mut self, enable: bool) -> Result<(), ()> {
        self.wait_for_response = Some(enable);
        Ok(())
    }

    fn set_delayed_start(&mut self, timestamp: u64) -> Result<(), ()> {
        self.delayed_starts.push(timestamp);
        Ok(())
    }

    fn start_tx(&mut self) -> Result<TxStart, ()> {
        if self.fail_start {
            return Err(());
        }

        self.starts += 1;
        let result = self.start_results.pop_front().unwrap_or(TxStart::Started);
        self.tx_pending = result == TxStart::Started;
        Ok(result)
    }

    fn poll_tx_done(&mut self) -> nb::Result<(), ()> {
        if !self.tx_pending || self.hold_tx {
            return Err(nb::Error::WouldBlock);
        }

        self.tx_pending = false;
        Ok(())
    }

    fn read_register(&mut self, register: RegisterId, len: usize) -> Result<u64, ()> {
        assert_eq!(len, 4);
        self.reads.push(register);

        match register {
            RegisterId::RX_TTCKI => Ok(self.tracking_interval),
            RegisterId::RX_TTCKO => Ok(self.tracking_offset),
            _ => Err(()),
        }
    }
}

/// Platform that records timers and queues events
#[derive(Debug)]
pub struct MockPlatform {
    pub scheduled: Vec<u32>,
    pub cancelled: Vec<TimerHandle>,
    pub events: VecDeque<Event>,
    pub capacity: usize,
    pub uptime: u32,
    pub records: Vec<PostprocessRecord>,
    next_handle: u32,
}

impl MockPlatform {
    pub fn new() -> Self {
        MockPlatform {
            scheduled: Vec::new(),
            cancelled: Vec::new(),
            events: VecDeque::new(),
            capacity: 64,
            uptime: 0,
            records: Vec::new(),
            next_handle: 0,
        }
    }

    /// Delay of the most recently scheduled timer
    pub fn last_delay(&self) -> Option<u32> {
        self.scheduled.last().copied()
    }
}

impl Platform for MockPlatform {
    fn schedule_once(&mut self, delay_us: u32) -> TimerHandle {
        self.scheduled.push(delay_us);
        self.next_handle += 1;
        TimerHandle(self.next_handle)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.cancelled.push(handle);
    }

    fn enqueue(&mut self, event: Event) -> Result<(), Event> {
        if self.events.len() >= self.capacity {
            return Err(event);
        }

        self.events.push_back(event);
        Ok(())
    }

    fn uptime_us(&self) -> u32 {
        self.uptime
    }
}
