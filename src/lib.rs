//! Clock Calibration Protocol engine for the DW1000 UWB transceiver
//!
//! Keeps the clocks of a UWB deployment aligned to a clock master. The master
//! broadcasts time-stamped blinks at a fixed period, armed with the radio's
//! delayed start so software jitter never shows up on air. Receivers capture
//! every broadcast and derive a correction factor from the carrier tracking
//! registers.
//!
//! The engine is platform-agnostic. The transceiver is reached through
//! [`radio::Radio`], which [`ll::DW1000`] implements on top of an
//! `embedded-hal` SPI device, and timers and the event queue come from
//! [`platform::Platform`]. Start with [`Device::new`] and
//! [`Device::ccp_init`].
//!
//! [`Device::new`]: device/struct.Device.html#method.new
//! [`Device::ccp_init`]: device/struct.Device.html#method.ccp_init

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod ccp;
pub mod configs;
pub mod device;
pub mod frame;
pub mod ll;
pub mod platform;
pub mod radio;
pub mod time;

mod error;

#[cfg(test)]
mod mock;

pub use ieee802154::mac;

pub use crate::{
    ccp::{BlinkMode, Ccp, CcpStatus, CycleState},
    configs::{CcpConfig, DeviceConfig},
    device::Device,
    error::Error,
    frame::{CcpFrame, FrameControl},
    ll::DW1000,
    time::{Duration, Instant, TIME_MAX},
};
