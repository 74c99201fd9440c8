//! Radio transport seam
//!
//! The clock calibration engine never touches the bus itself. Everything it
//! needs from the transceiver goes through [`Radio`], which the platform
//! implements. [`ll::DW1000`] is the register-level implementation for a
//! DW1000 on an SPI bus.
//!
//! [`ll::DW1000`]: ../ll/struct.DW1000.html

/// Outcome of a transmit start request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxStart {
    /// The transmission is armed and will go out at the delayed-start instant
    Started,
    /// The radio rejected the delayed-start instant
    ///
    /// This happens when the requested instant is too close to, or behind,
    /// the current system time (half period delay warning).
    Rejected,
}

/// Identifies a register by its index and sub-index
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterId {
    /// Register index
    pub id: u8,
    /// Register sub-index
    pub sub_id: u16,
}

impl RegisterId {
    /// Receiver Time Tracking Interval
    pub const RX_TTCKI: RegisterId = RegisterId { id: 0x13, sub_id: 0 };

    /// Receiver Time Tracking Offset
    pub const RX_TTCKO: RegisterId = RegisterId { id: 0x14, sub_id: 0 };
}

/// Mask of the 19-bit signed offset in RX_TTCKO
pub const RX_TTCKO_RXTOFS_MASK: u64 = 0x7ffff;

/// Register-level primitives the clock calibration engine relies on
///
/// Implementations are expected to serialize bus access on their own.
pub trait Radio {
    /// Error type of the underlying bus
    type Error;

    /// Reads the current system time
    fn read_system_time(&mut self) -> Result<u64, Self::Error>;

    /// Reads the time stamp of the last received frame
    fn read_rx_timestamp(&mut self) -> Result<u64, Self::Error>;

    /// Writes `bytes` into the transmit buffer, starting at `offset`
    fn write_tx_payload(&mut self, bytes: &[u8], offset: u16) -> Result<(), Self::Error>;

    /// Reads the receive buffer, starting at `offset`, into `buf`
    fn read_rx_payload(&mut self, buf: &mut [u8], offset: u16) -> Result<(), Self::Error>;

    /// Sets the length of the next frame and its ranging bit
    ///
    /// `length` is the payload length, without the two-octet CRC.
    fn configure_tx_frame_control(&mut self, length: u16, ranging: bool)
        -> Result<(), Self::Error>;

    /// Selects whether the receiver is enabled right after the next
    /// transmission
    fn set_wait_for_response(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Sets the instant of the next delayed transmission
    fn set_delayed_start(&mut self, timestamp: u64) -> Result<(), Self::Error>;

    /// Starts the delayed transmission
    fn start_tx(&mut self) -> Result<TxStart, Self::Error>;

    /// Checks whether the last transmission has left the antenna
    ///
    /// Returns `WouldBlock` while the frame is still pending. Once it returns
    /// `Ok`, the completion has been acknowledged on the radio.
    fn poll_tx_done(&mut self) -> nb::Result<(), Self::Error>;

    /// Reads the first `len` bytes of a register as a little-endian number
    fn read_register(&mut self, register: RegisterId, len: usize) -> Result<u64, Self::Error>;
}
