//! Device instance
//!
//! A [`Device`] ties together the radio, the platform services and the
//! protocol state of one transceiver. The platform forwards radio interrupts
//! to [`Device::on_rx_complete`] and [`Device::on_tx_complete`], and events
//! from its queue to [`Device::dispatch`].

use crate::{
    ccp::{postprocess::PostprocessFn, Ccp},
    configs::DeviceConfig,
    frame::FrameControl,
    mac,
    platform::{Event, Platform},
    radio::Radio,
    Error,
};

/// Completion callback
///
/// Returns whether the callback claimed the completed frame.
pub type CompletionFn<R, P> = fn(&mut Device<R, P>) -> Result<bool, Error<<R as Radio>::Error>>;

/// A transceiver and the protocol state attached to it
pub struct Device<R, P>
where
    R: Radio,
    P: Platform,
{
    pub(crate) radio: R,
    pub(crate) platform: P,
    pub(crate) config: DeviceConfig,
    pub(crate) short_address: mac::ShortAddress,
    pub(crate) clock_master: u64,
    pub(crate) tx_fctrl: Option<FrameControl>,
    pub(crate) ccp: Option<Ccp>,
    pub(crate) ccp_rx_cb: Option<CompletionFn<R, P>>,
    pub(crate) ccp_tx_cb: Option<CompletionFn<R, P>>,
    pub(crate) ccp_postprocess: Option<PostprocessFn<R, P>>,
}

impl<R, P> Device<R, P>
where
    R: Radio,
    P: Platform,
{
    /// Creates a device without any protocol attached
    pub fn new(radio: R, platform: P, config: DeviceConfig) -> Self {
        Device {
            radio,
            platform,
            short_address: config.short_address,
            config,
            clock_master: 0,
            tx_fctrl: None,
            ccp: None,
            ccp_rx_cb: None,
            ccp_tx_cb: None,
            ccp_postprocess: None,
        }
    }

    /// Short address of this node
    pub fn short_address(&self) -> mac::ShortAddress {
        self.short_address
    }

    /// Address of the trusted clock master
    pub fn clock_master(&self) -> mac::ExtendedAddress {
        mac::ExtendedAddress(self.clock_master)
    }

    /// The clock calibration instance, if initialized
    pub fn ccp(&self) -> Option<&Ccp> {
        self.ccp.as_ref()
    }

    /// Reference to the radio
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable reference to the radio
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Reference to the platform services
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable reference to the platform services
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Releases the radio and the platform services
    pub fn free(self) -> (R, P) {
        (self.radio, self.platform)
    }

    /// Receive interrupt entry point
    ///
    /// Returns whether any protocol claimed the received frame.
    pub fn on_rx_complete(&mut self) -> Result<bool, Error<R::Error>> {
        match self.ccp_rx_cb {
            Some(callback) => callback(self),
            None => Ok(false),
        }
    }

    /// Transmit interrupt entry point
    ///
    /// Returns whether any protocol claimed the sent frame.
    pub fn on_tx_complete(&mut self) -> Result<bool, Error<R::Error>> {
        let handled = match self.ccp_tx_cb {
            Some(callback) => callback(self)?,
            None => false,
        };

        if handled {
            self.tx_fctrl = None;
        }

        Ok(handled)
    }

    /// Event queue entry point
    pub fn dispatch(&mut self, event: Event) -> Result<(), Error<R::Error>> {
        match event {
            Event::CcpTimer => self.ccp_timer_expired(),
            Event::CcpPostprocess { direction, index } => {
                self.ccp_run_postprocess(direction, index);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{MockPlatform, MockRadio},
        radio::RegisterId,
    };

    fn device() -> Device<MockRadio, MockPlatform> {
        Device::new(
            MockRadio::new(),
            MockPlatform::new(),
            DeviceConfig {
                short_address: mac::ShortAddress(0x1234),
                ..Default::default()
            },
        )
    }

    fn claim(_: &mut Device<MockRadio, MockPlatform>) -> Result<bool, Error<()>> {
        Ok(true)
    }

    #[test]
    fn interrupts_are_unclaimed_without_protocols() {
        let mut device = device();

        assert!(!device.on_rx_complete().unwrap());
        assert!(!device.on_tx_complete().unwrap());
        assert_eq!(device.short_address(), mac::ShortAddress(0x1234));
    }

    #[test]
    fn tx_frame_control_is_cleared_once_claimed() {
        let mut device = device();
        device.ccp_init(2, mac::ExtendedAddress(1)).unwrap();
        device.ccp_set_callbacks(claim, claim);
        device.tx_fctrl = Some(FrameControl::BlinkCcp);

        assert!(device.on_tx_complete().unwrap());
        assert_eq!(device.tx_fctrl, None);
    }

    #[test]
    fn events_without_an_instance_are_ignored() {
        let mut device = device();

        device.dispatch(Event::CcpTimer).unwrap();
        assert!(device.platform().scheduled.is_empty());
        assert_eq!(device.radio().register_reads(RegisterId::RX_TTCKI), 0);
    }
}
