//! Clock Calibration Protocol
//!
//! The clock master broadcasts a time-stamped blink once per epoch. The
//! transmission instant is armed with the radio's delayed start, so it is
//! exact regardless of how late the scheduling timer fires. Receivers capture
//! the reception time stamp of every broadcast and derive a correction factor
//! from the receiver's carrier tracking registers.
//!
//! Only one blink cycle is in flight at a time. A cycle goes through the
//! states of [`CycleState`]:
//!
//! ``` text
//! Idle --blink--> Armed --accepted--> PendingTx --tx complete--> Idle
//!                   |
//!                   +-----rejected-----> Idle (basis deferred by one epoch)
//! ```
//!
//! The protocol state lives in a [`Ccp`] instance owned by the [`Device`].
//! All operations are methods of the device, named `ccp_*`.
//!
//! [`Device`]: ../device/struct.Device.html

pub mod postprocess;
pub mod store;

use log::{debug, warn};

use crate::{
    configs::CcpConfig,
    device::{CompletionFn, Device},
    frame::{BlinkHeader, CcpFrame, FrameControl},
    mac,
    platform::{Direction, Event, Platform, TimerHandle},
    radio::{Radio, RegisterId, TxStart, RX_TTCKO_RXTOFS_MASK},
    time::{Duration, Instant, TIME_MAX},
    Error,
};

use self::{
    postprocess::{log_record, PostprocessFn, PostprocessRecord},
    store::{FrameStore, MAX_FRAMES},
};

/// Clock master address that accepts broadcasts from any sender
pub const ANY_MASTER: mac::ExtendedAddress = mac::ExtendedAddress(u64::MAX);

/// Sign bit of the 19-bit RX_TTCKO offset
const RXTOFS_SIGN: i32 = 0x40000;

/// Status flags of a clock calibration instance
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CcpStatus {
    /// The instance has been initialized
    pub initialized: bool,
    /// At least two frames have been processed since the last start
    ///
    /// Never reverts to `false` while running.
    pub valid: bool,
    /// The last blink was rejected by the radio
    pub start_tx_error: bool,
    /// The scheduling timer is running
    pub timer_enabled: bool,
}

/// How [`Device::ccp_blink`] returns
///
/// [`Device::ccp_blink`]: ../device/struct.Device.html#method.ccp_blink
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlinkMode {
    /// Return once the frame has left the antenna
    Blocking,
    /// Return as soon as the transmission is armed
    NonBlocking,
}

/// State of the blink cycle
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CycleState {
    /// No cycle in flight
    Idle,
    /// The radio is being programmed
    Armed,
    /// The radio accepted the delayed start, completion is outstanding
    PendingTx,
}

/// Clock calibration instance
#[derive(Debug)]
pub struct Ccp {
    config: CcpConfig,
    frames: FrameStore,
    status: CcpStatus,
    state: CycleState,
    timer: Option<TimerHandle>,
    timer_mode: BlinkMode,
    postprocess: bool,
    seq_num: u8,
}

impl Ccp {
    fn new(config: CcpConfig, frames: FrameStore) -> Self {
        Ccp {
            postprocess: config.postprocess,
            config,
            frames,
            status: CcpStatus::default(),
            state: CycleState::Idle,
            timer: None,
            timer_mode: BlinkMode::NonBlocking,
            seq_num: 0,
        }
    }

    /// Current status flags
    pub fn status(&self) -> CcpStatus {
        self.status
    }

    /// State of the blink cycle
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Configuration the instance was created with
    pub fn config(&self) -> &CcpConfig {
        &self.config
    }

    /// The frame store
    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    /// Whether valid events are handed to the postprocess sink
    pub fn postprocess_enabled(&self) -> bool {
        self.postprocess
    }

    /// Sequence number of the next blink attempt
    pub fn next_seq_num(&self) -> u8 {
        self.seq_num
    }

    /// One scaled period in device time
    fn epoch(&self) -> Duration {
        Duration::from_period(self.config.period)
    }
}

impl<R, P> Device<R, P>
where
    R: Radio,
    P: Platform,
{
    /// Creates the clock calibration instance of this device
    ///
    /// `frame_count` is the number of frame slots, at least 2 and at most
    /// [`MAX_FRAMES`]. `clock_master` is the only sender whose broadcasts are
    /// processed; [`ANY_MASTER`] accepts all of them.
    ///
    /// Calling this again with the same `frame_count` keeps the existing
    /// instance, including its index and any callbacks set in the meantime,
    /// and only updates the clock master. A different `frame_count` is an
    /// error.
    ///
    /// [`MAX_FRAMES`]: store/constant.MAX_FRAMES.html
    pub fn ccp_init(
        &mut self,
        frame_count: usize,
        clock_master: mac::ExtendedAddress,
    ) -> Result<&Ccp, Error<R::Error>> {
        if let Some(configured) = self.ccp.as_ref().map(|ccp| ccp.frames.frame_count()) {
            if configured != frame_count {
                return Err(Error::FrameCountMismatch {
                    configured,
                    requested: frame_count,
                });
            }

            self.clock_master = clock_master.0;
            return self.ccp.as_ref().ok_or(Error::NotInitialized);
        }

        if !self.config.ccp.validate() {
            return Err(Error::InvalidConfiguration);
        }

        let frames = FrameStore::new(frame_count).ok_or(Error::InvalidFrameCount {
            requested: frame_count,
            max: MAX_FRAMES,
        })?;
        let mut ccp = Ccp::new(self.config.ccp, frames);

        let systime = self.radio.read_system_time().map_err(Error::Radio)?;
        ccp.frames.previous_mut().transmission_timestamp = systime & TIME_MAX;
        ccp.status.initialized = true;

        self.clock_master = clock_master.0;
        self.ccp_rx_cb = Some(Self::ccp_rx_complete as CompletionFn<R, P>);
        self.ccp_tx_cb = Some(Self::ccp_tx_complete as CompletionFn<R, P>);
        self.ccp_postprocess = Some(log_record::<R, P> as PostprocessFn<R, P>);

        debug!(
            "CCP initialized: {} slots, period {} us, master {:#x}",
            frame_count, ccp.config.period, clock_master.0,
        );

        Ok(&*self.ccp.insert(ccp))
    }

    /// Replaces the receive and transmit completion callbacks
    pub fn ccp_set_callbacks(&mut self, on_rx: CompletionFn<R, P>, on_tx: CompletionFn<R, P>) {
        self.ccp_rx_cb = Some(on_rx);
        self.ccp_tx_cb = Some(on_tx);
    }

    /// Replaces the postprocess sink and enables postprocessing
    pub fn ccp_set_postprocess(&mut self, sink: PostprocessFn<R, P>) -> Result<(), Error<R::Error>> {
        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        ccp.postprocess = true;
        self.ccp_postprocess = Some(sink);
        Ok(())
    }

    /// Starts the periodic broadcast
    ///
    /// Resets the index, the sequence numbers and the `valid` flag, takes the
    /// current system time as the transmission basis and schedules the first
    /// timer expiry after `start_delay`. Every timer-driven blink uses `mode`.
    pub fn ccp_start(&mut self, mode: BlinkMode) -> Result<(), Error<R::Error>> {
        if self.ccp.is_none() {
            return Err(Error::NotInitialized);
        }

        let systime = self.radio.read_system_time().map_err(Error::Radio)?;

        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        ccp.frames.reset_index();
        ccp.seq_num = 0;
        ccp.status.valid = false;
        ccp.status.timer_enabled = true;
        ccp.timer_mode = mode;
        ccp.frames.previous_mut().transmission_timestamp = systime & TIME_MAX;
        let delay = ccp.config.start_delay;

        debug!("CCP started, first blink in {} us", delay);
        self.ccp_schedule(delay)
    }

    /// Stops the periodic broadcast
    ///
    /// A transmission that is already armed is not retracted.
    pub fn ccp_stop(&mut self) -> Result<(), Error<R::Error>> {
        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        ccp.status.timer_enabled = false;

        if let Some(handle) = ccp.timer.take() {
            self.platform.cancel(handle);
        }

        debug!("CCP stopped");
        Ok(())
    }

    /// Broadcasts one clock calibration frame
    ///
    /// Waits for a cycle that is still pending to complete first. The frame
    /// is armed for two scaled periods after the previous transmission. If
    /// the radio rejects that instant, the basis moves on by one scaled
    /// period, so the next attempt targets the following epoch, and the
    /// returned status has `start_tx_error` set.
    pub fn ccp_blink(&mut self, mode: BlinkMode) -> Result<CcpStatus, Error<R::Error>> {
        if self.ccp.is_none() {
            return Err(Error::NotInitialized);
        }

        nb::block!(self.ccp_poll_complete())?;

        let short_address = self.short_address.0 as u64;
        let mut buf = [0; CcpFrame::LEN];
        let (timestamp, len) = {
            let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
            let epoch = ccp.epoch();
            let basis = Instant::from_raw(ccp.frames.previous().transmission_timestamp);
            // Rejected attempts consume a number too, so receivers see the gap.
            let seq_num = ccp.seq_num;
            ccp.seq_num = seq_num.wrapping_add(1);

            let frame = ccp.frames.current_mut();
            frame.transmission_timestamp = (basis + epoch + epoch).value();
            frame.header.seq_num = seq_num;
            frame.header.long_address = short_address;

            let len = frame.encode(&mut buf)?;
            ccp.state = CycleState::Armed;

            (frame.transmission_timestamp, len)
        };

        let start = match self.ccp_arm(&buf[..len], timestamp) {
            Ok(start) => start,
            Err(error) => {
                if let Some(ccp) = self.ccp.as_mut() {
                    ccp.state = CycleState::Idle;
                }
                return Err(error);
            }
        };

        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        match start {
            TxStart::Rejected => {
                ccp.status.start_tx_error = true;
                ccp.state = CycleState::Idle;

                let epoch = ccp.epoch();
                let previous = ccp.frames.previous_mut();
                previous.transmission_timestamp =
                    (Instant::from_raw(previous.transmission_timestamp) + epoch).value();

                warn!(
                    "CCP blink at {:#x} rejected, deferring to the next epoch",
                    timestamp,
                );
                Ok(ccp.status)
            }
            TxStart::Started => {
                ccp.status.start_tx_error = false;
                ccp.state = CycleState::PendingTx;
                self.tx_fctrl = Some(FrameControl::BlinkCcp);

                debug!("CCP blink armed at {:#x}", timestamp);

                if mode == BlinkMode::Blocking {
                    nb::block!(self.ccp_poll_complete())?;
                }

                self.ccp
                    .as_ref()
                    .map(|ccp| ccp.status)
                    .ok_or(Error::NotInitialized)
            }
        }
    }

    /// Checks whether the pending blink has left the antenna
    ///
    /// Runs the transmit completion callbacks once it has. Returns `Ok` right
    /// away if no blink is pending.
    pub fn ccp_poll_complete(&mut self) -> nb::Result<(), Error<R::Error>> {
        match self.ccp.as_ref().map(|ccp| ccp.state) {
            Some(CycleState::PendingTx) => (),
            _ => return Ok(()),
        }

        self.radio
            .poll_tx_done()
            .map_err(|error| error.map(Error::Radio))?;
        self.on_tx_complete().map_err(nb::Error::Other)?;

        // A replaced transmit callback may not have closed the cycle.
        if let Some(ccp) = self.ccp.as_mut() {
            if ccp.state == CycleState::PendingTx {
                ccp.state = CycleState::Idle;
                self.tx_fctrl = None;
            }
        }

        Ok(())
    }

    /// Default transmit completion callback
    ///
    /// Claims the completion of a pending CCP blink: advances the index,
    /// queues the transmit record and reschedules the timer.
    pub fn ccp_tx_complete(&mut self) -> Result<bool, Error<R::Error>> {
        if self.tx_fctrl != Some(FrameControl::BlinkCcp) {
            return Ok(false);
        }

        let ccp = match self.ccp.as_mut() {
            Some(ccp) if ccp.state == CycleState::PendingTx => ccp,
            _ => return Ok(false),
        };

        let index = ccp.frames.index();
        ccp.frames.advance();
        ccp.state = CycleState::Idle;

        let postprocess = ccp.postprocess;
        let timer_enabled = ccp.status.timer_enabled;
        let delay = ccp.config.timer_delay();

        debug!("CCP blink {} sent", index);

        if postprocess {
            self.defer(Event::CcpPostprocess {
                direction: Direction::Tx,
                index,
            });
        }
        if timer_enabled {
            self.ccp_schedule(delay)?;
        }

        Ok(true)
    }

    /// Default receive completion callback
    ///
    /// Claims every frame with the CCP frame control. Frames from senders
    /// other than the clock master are dropped. Accepted frames are stored in
    /// the next slot; once the instance is valid, they also get a correction
    /// factor and are queued for postprocessing.
    pub fn ccp_rx_complete(&mut self) -> Result<bool, Error<R::Error>> {
        if self.ccp.is_none() {
            return Ok(false);
        }

        let mut buf = [0; BlinkHeader::LEN];
        self.radio
            .read_rx_payload(&mut buf, 0)
            .map_err(Error::Radio)?;
        let header = BlinkHeader::decode(&buf)?;

        if header.frame_control() != Some(FrameControl::BlinkCcp) {
            return Ok(false);
        }
        if self.clock_master != ANY_MASTER.0 && header.long_address != self.clock_master {
            warn!(
                "CCP frame from {:#x} ignored, master is {:#x}",
                header.long_address, self.clock_master,
            );
            return Ok(true);
        }

        let reception_timestamp = self.radio.read_rx_timestamp().map_err(Error::Radio)?;

        let (valid, index) = {
            let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
            ccp.frames.advance();
            let index = ccp.frames.index();
            ccp.status.valid |= index > 1;

            let frame = ccp.frames.current_mut();
            frame.header = header;
            frame.reception_timestamp = reception_timestamp & TIME_MAX;

            (ccp.status.valid, index)
        };

        if !valid {
            return Ok(true);
        }

        let correction_factor = self.ccp_correction_factor()?;

        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        ccp.frames.current_mut().correction_factor = correction_factor;
        let postprocess = ccp.postprocess;

        debug!(
            "CCP frame {} received at {:#x}, cf {}",
            header.seq_num, reception_timestamp, correction_factor,
        );

        if postprocess {
            self.defer(Event::CcpPostprocess {
                direction: Direction::Rx,
                index,
            });
        }

        Ok(true)
    }

    /// Builds the postprocess record of the event at `index`
    ///
    /// The record reflects the current content of the event's slot, so it
    /// should be built before `frame_count` further events overwrite it.
    pub fn ccp_record(&self, direction: Direction, index: u32) -> Option<PostprocessRecord> {
        let ccp = self.ccp.as_ref()?;

        Some(PostprocessRecord::new(
            direction,
            self.platform.uptime_us(),
            ccp.frames.get(index),
            ccp.frames.get_before(index),
        ))
    }

    /// Handles an expiry of the scheduling timer
    pub(crate) fn ccp_timer_expired(&mut self) -> Result<(), Error<R::Error>> {
        let (mode, delay) = match self.ccp.as_mut() {
            Some(ccp) => {
                ccp.timer = None;
                if !ccp.status.timer_enabled {
                    return Ok(());
                }
                (ccp.timer_mode, ccp.config.timer_delay())
            }
            None => return Ok(()),
        };

        match self.ccp_blink(mode) {
            // A successful blink reschedules from its completion.
            Ok(status) if status.start_tx_error => self.ccp_schedule(delay),
            Ok(_) => Ok(()),
            Err(error) => {
                self.ccp_schedule(delay)?;
                Err(error)
            }
        }
    }

    /// Hands the record of the event at `index` to the postprocess sink
    pub(crate) fn ccp_run_postprocess(&mut self, direction: Direction, index: u32) {
        let sink = match self.ccp_postprocess {
            Some(sink) => sink,
            None => return,
        };

        if let Some(record) = self.ccp_record(direction, index) {
            sink(self, &record);
        }
    }

    fn ccp_arm(&mut self, payload: &[u8], timestamp: u64) -> Result<TxStart, Error<R::Error>> {
        self.radio
            .write_tx_payload(payload, 0)
            .map_err(Error::Radio)?;
        self.radio
            .configure_tx_frame_control(payload.len() as u16, true)
            .map_err(Error::Radio)?;
        self.radio
            .set_wait_for_response(false)
            .map_err(Error::Radio)?;
        self.radio
            .set_delayed_start(timestamp)
            .map_err(Error::Radio)?;
        self.radio.start_tx().map_err(Error::Radio)
    }

    fn ccp_schedule(&mut self, delay_us: u32) -> Result<(), Error<R::Error>> {
        let handle = self.platform.schedule_once(delay_us);
        let ccp = self.ccp.as_mut().ok_or(Error::NotInitialized)?;
        ccp.timer = Some(handle);
        Ok(())
    }

    fn ccp_correction_factor(&mut self) -> Result<f32, Error<R::Error>> {
        let interval = self
            .radio
            .read_register(RegisterId::RX_TTCKI, 4)
            .map_err(Error::Radio)? as u32 as i32;
        let offset = self
            .radio
            .read_register(RegisterId::RX_TTCKO, 4)
            .map_err(Error::Radio)?;

        Ok(correction_factor(interval, tracking_offset(offset)))
    }

    fn defer(&mut self, event: Event) {
        if let Err(event) = self.platform.enqueue(event) {
            warn!("Event queue full, dropping {:?}", event);
        }
    }
}

/// Extracts the signed 19-bit carrier tracking offset from RX_TTCKO
fn tracking_offset(raw: u64) -> i32 {
    let offset = (raw & RX_TTCKO_RXTOFS_MASK) as i32;
    if offset & RXTOFS_SIGN != 0 {
        offset - (RXTOFS_SIGN << 1)
    } else {
        offset
    }
}

/// Ratio between the transmitter's and the receiver's clock rate
fn correction_factor(interval: i32, offset: i32) -> f32 {
    if interval == 0 {
        return 1.0;
    }

    1.0 + offset as f32 / interval as f32
}
