//! Low-level interface to the DW1000
//!
//! This module implements the register accesses the clock calibration engine
//! needs, on top of an `embedded-hal` [`SpiDevice`]. Chip select handling is
//! left to the `SpiDevice` implementation, which also serializes bus access.
//!
//! Register indices, sub-indices and bit positions are taken from the DW1000
//! user manual, section 7.2.

use core::fmt;

use embedded_hal::spi::{Operation, SpiDevice};

use crate::{
    radio::{Radio, RegisterId, TxStart},
    time::TIME_MAX,
};

/// System Time Counter
pub const SYS_TIME: RegisterId = RegisterId { id: 0x06, sub_id: 0x00 };
/// TX Frame Control
pub const TX_FCTRL: RegisterId = RegisterId { id: 0x08, sub_id: 0x00 };
/// Delayed Send or Receive Time
pub const DX_TIME: RegisterId = RegisterId { id: 0x0A, sub_id: 0x00 };
/// System Control Register
pub const SYS_CTRL: RegisterId = RegisterId { id: 0x0D, sub_id: 0x00 };
/// System Event Status Register
pub const SYS_STATUS: RegisterId = RegisterId { id: 0x0F, sub_id: 0x00 };
/// Receive Time Stamp
pub const RX_TIME: RegisterId = RegisterId { id: 0x15, sub_id: 0x00 };

const TX_BUFFER_ID: u8 = 0x09;
const RX_BUFFER_ID: u8 = 0x11;

/// Length of the 40-bit time registers
const TIME_LEN: usize = 5;

/// SYS_CTRL: Transmit Start
const TXSTRT: u8 = 1 << 1;
/// SYS_CTRL: Transmitter Delayed Sending
const TXDLYS: u8 = 1 << 2;
/// SYS_CTRL: Transceiver Off
const TRXOFF: u8 = 1 << 6;
/// SYS_CTRL: Wait for Response
const WAIT4RESP: u8 = 1 << 7;

/// SYS_STATUS: TX Frame Begins, Preamble Sent, PHY Header Sent, Frame Sent
const TX_EVENTS: u8 = 0xf0;
/// SYS_STATUS: TX Frame Sent
const TXFRS: u64 = 1 << 7;
/// SYS_STATUS: Half Period Delay Warning
const HPDWARN: u64 = 1 << 27;
/// SYS_STATUS: TX Power Up Time Error
const TXPUTE: u64 = 1 << 34;

/// TX_FCTRL: frame length including the length extension
const TFLEN_MASK: u64 = 0x3ff;
/// TX_FCTRL: TX Ranging Enable
const TR: u64 = 1 << 15;
/// TX_FCTRL: TX Buffer Index Offset
const TXBOFFS_MASK: u64 = 0x3ff << 22;

/// Entry point to the DW1000 driver's low-level API
pub struct DW1000<SPI> {
    spi: SPI,
    wait4resp: bool,
}

impl<SPI> DW1000<SPI> {
    /// Create a new instance of `DW1000`
    ///
    /// Requires the SPI device the DW1000 is connected to.
    pub fn new(spi: SPI) -> Self {
        DW1000 {
            spi,
            wait4resp: false,
        }
    }

    /// Releases the SPI device
    pub fn free(self) -> SPI {
        self.spi
    }
}

// Can't be derived without putting requirements on `SPI`.
impl<SPI> fmt::Debug for DW1000<SPI> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DW1000 {{ wait4resp: {:?}, .. }}", self.wait4resp)
    }
}

impl<SPI> DW1000<SPI>
where
    SPI: SpiDevice,
{
    /// Reads `buf.len()` bytes from a register
    pub fn read(&mut self, register: RegisterId, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        let (header, len) = header(false, register);
        self.spi
            .transaction(&mut [Operation::Write(&header[..len]), Operation::Read(buf)])
            .map_err(Error::Spi)
    }

    /// Writes `data` to a register
    pub fn write(&mut self, register: RegisterId, data: &[u8]) -> Result<(), Error<SPI::Error>> {
        let (header, len) = header(true, register);
        self.spi
            .transaction(&mut [Operation::Write(&header[..len]), Operation::Write(data)])
            .map_err(Error::Spi)
    }

    /// Reads the first `len` bytes of a register as a little-endian number
    pub fn read_value(&mut self, register: RegisterId, len: usize) -> Result<u64, Error<SPI::Error>> {
        if len > 8 {
            return Err(Error::InvalidLength { len });
        }

        let mut bytes = [0; 8];
        self.read(register, &mut bytes[..len])?;

        Ok(u64::from_le_bytes(bytes))
    }

    /// Writes the lower `len` bytes of `value` to a register
    pub fn write_value(
        &mut self,
        register: RegisterId,
        value: u64,
        len: usize,
    ) -> Result<(), Error<SPI::Error>> {
        if len > 8 {
            return Err(Error::InvalidLength { len });
        }

        self.write(register, &value.to_le_bytes()[..len])
    }
}

impl<SPI> Radio for DW1000<SPI>
where
    SPI: SpiDevice,
{
    type Error = Error<SPI::Error>;

    fn read_system_time(&mut self) -> Result<u64, Self::Error> {
        self.read_value(SYS_TIME, TIME_LEN)
    }

    fn read_rx_timestamp(&mut self) -> Result<u64, Self::Error> {
        // The fully adjusted time stamp occupies the first 40 bits of RX_TIME.
        self.read_value(RX_TIME, TIME_LEN)
    }

    fn write_tx_payload(&mut self, bytes: &[u8], offset: u16) -> Result<(), Self::Error> {
        self.write(
            RegisterId {
                id: TX_BUFFER_ID,
                sub_id: offset,
            },
            bytes,
        )
    }

    fn read_rx_payload(&mut self, buf: &mut [u8], offset: u16) -> Result<(), Self::Error> {
        self.read(
            RegisterId {
                id: RX_BUFFER_ID,
                sub_id: offset,
            },
            buf,
        )
    }

    fn configure_tx_frame_control(&mut self, length: u16, ranging: bool) -> Result<(), Self::Error> {
        let mut value = self.read_value(TX_FCTRL, TIME_LEN)?;

        value &= !(TFLEN_MASK | TR | TXBOFFS_MASK);
        // data length + two-octet CRC
        value |= (length as u64 + 2) & TFLEN_MASK;
        if ranging {
            value |= TR;
        }

        self.write_value(TX_FCTRL, value, TIME_LEN)
    }

    fn set_wait_for_response(&mut self, enable: bool) -> Result<(), Self::Error> {
        // Only takes effect together with the transmit start command.
        self.wait4resp = enable;
        Ok(())
    }

    fn set_delayed_start(&mut self, timestamp: u64) -> Result<(), Self::Error> {
        // The lower 9 bits are ignored by the hardware.
        self.write_value(DX_TIME, timestamp & TIME_MAX, TIME_LEN)
    }

    fn start_tx(&mut self) -> Result<TxStart, Self::Error> {
        let mut sys_ctrl = TXSTRT | TXDLYS;
        if self.wait4resp {
            sys_ctrl |= WAIT4RESP;
        }
        self.write(SYS_CTRL, &[sys_ctrl])?;

        // A delayed start that can't be met is flagged right away. The
        // transmitter has to be switched off explicitly in that case, and the
        // flags stay latched until they are written back.
        let sys_status = self.read_value(SYS_STATUS, TIME_LEN)?;
        if sys_status & (HPDWARN | TXPUTE) != 0 {
            self.write(SYS_CTRL, &[TRXOFF])?;
            self.write_value(SYS_STATUS, HPDWARN | TXPUTE, TIME_LEN)?;
            return Ok(TxStart::Rejected);
        }

        Ok(TxStart::Started)
    }

    fn poll_tx_done(&mut self) -> nb::Result<(), Self::Error> {
        let sys_status = self
            .read_value(SYS_STATUS, TIME_LEN)
            .map_err(nb::Error::Other)?;

        if sys_status & TXFRS == 0 {
            return Err(nb::Error::WouldBlock);
        }

        // Writing ones clears the TX event flags.
        self.write(SYS_STATUS, &[TX_EVENTS])
            .map_err(nb::Error::Other)?;

        Ok(())
    }

    fn read_register(&mut self, register: RegisterId, len: usize) -> Result<u64, Self::Error> {
        self.read_value(register, len)
    }
}

/// An error that can occur when communicating with the DW1000
#[derive(Debug)]
pub enum Error<E> {
    /// Error occured while using the SPI bus
    Spi(E),

    /// A register access wider than 64 bits was requested
    InvalidLength {
        /// Requested length in bytes
        len: usize,
    },
}

/// Builds the SPI transaction header for accessing a register
///
/// Returns the header buffer and the number of bytes of it that are used.
fn header(write: bool, register: RegisterId) -> ([u8; 3], usize) {
    let mut buffer = [0; 3];
    let sub_id = register.sub_id > 0;

    buffer[0] = ((write as u8) << 7) | ((sub_id as u8) << 6) | (register.id & 0x3f);

    if !sub_id {
        return (buffer, 1);
    }

    let ext_addr = register.sub_id > 127;

    // lower 7 bits (of 15)
    buffer[1] = ((ext_addr as u8) << 7) | (register.sub_id as u8 & 0x7f);

    if !ext_addr {
        return (buffer, 2);
    }

    // higher 8 bits (of 15)
    buffer[2] = ((register.sub_id & 0x7f80) >> 7) as u8;

    (buffer, 3)
}
