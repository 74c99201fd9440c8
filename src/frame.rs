//! Over-the-air frame layouts
//!
//! CCP and PAN frames share the IEEE 802.15.4 blink header and are sent on the
//! same channel, so their layouts live here rather than in either protocol.
//! All layouts are packed with 1-byte alignment and little-endian fields,
//! which is exactly what `ssmarshal` produces for these structs.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Frame control codes of the blink frames used on the channel
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FrameControl {
    /// Plain IEEE 802.15.4 blink with a 64-bit source address
    Blink = 0xC5,
    /// Clock calibration blink with a 64-bit source address
    BlinkCcp = 0xC2,
}

/// IEEE 802.15.4 blink header
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct BlinkHeader {
    /// Frame control byte, see [`FrameControl`]
    pub fctrl: u8,
    /// Sequence number
    pub seq_num: u8,
    /// Address of the sender
    pub long_address: u64,
}

impl BlinkHeader {
    /// Encoded length in bytes
    pub const LEN: usize = 10;

    /// Decodes the header at the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, ssmarshal::Error> {
        let (header, _) = ssmarshal::deserialize::<Self>(buf)?;
        Ok(header)
    }

    /// Returns the frame control code, if it is one we know
    pub fn frame_control(&self) -> Option<FrameControl> {
        FrameControl::try_from(self.fctrl).ok()
    }
}

/// Clock calibration frame
///
/// The same record is used on both sides of the protocol: the transmitter
/// fills in `transmission_timestamp`, receivers fill in `reception_timestamp`
/// and `correction_factor`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct CcpFrame {
    /// Blink header
    pub header: BlinkHeader,
    /// Device time at which the frame leaves the antenna
    pub transmission_timestamp: u64,
    /// Device time at which the frame was received
    pub reception_timestamp: u64,
    /// Ratio between the transmitter's and the receiver's clock rate
    pub correction_factor: f32,
}

impl CcpFrame {
    /// Encoded length in bytes
    pub const LEN: usize = BlinkHeader::LEN + 8 + 8 + 4;

    /// Creates an empty frame slot
    ///
    /// The sequence number is assigned by the sender on every blink attempt.
    pub fn template() -> Self {
        CcpFrame {
            header: BlinkHeader {
                fctrl: FrameControl::BlinkCcp.into(),
                seq_num: 0,
                long_address: 0,
            },
            transmission_timestamp: 0,
            reception_timestamp: 0,
            correction_factor: 1.0,
        }
    }

    /// Writes the packed frame into `buf`, returning the number of bytes used
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ssmarshal::Error> {
        ssmarshal::serialize(buf, self)
    }

    /// Decodes a packed frame from `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, ssmarshal::Error> {
        let (frame, _) = ssmarshal::deserialize::<Self>(buf)?;
        Ok(frame)
    }
}

/// Address assignment sent in reply to a PAN request
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct PanResponse {
    /// Blink header, identical to the one CCP frames carry
    pub header: BlinkHeader,
    /// Assigned PAN identifier
    pub pan_id: u16,
    /// Assigned short address
    pub short_address: u16,
    /// Assigned slot
    pub slot_id: u8,
}

/// PAN frame with the same timestamp trailer as [`CcpFrame`]
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct PanFrame {
    /// Address assignment
    pub response: PanResponse,
    /// Transmission timestamp
    pub transmission_timestamp: u64,
    /// Reception timestamp
    pub reception_timestamp: u64,
    /// Receiver clock correction factor
    pub correction_factor: f32,
}

impl PanFrame {
    /// Encoded length in bytes
    pub const LEN: usize = BlinkHeader::LEN + 5 + 8 + 8 + 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccp_frame_is_packed_little_endian() {
        let frame = CcpFrame {
            header: BlinkHeader {
                fctrl: FrameControl::BlinkCcp.into(),
                seq_num: 0x07,
                long_address: 0x1234,
            },
            transmission_timestamp: 0x01_0203_0405,
            reception_timestamp: 0,
            correction_factor: 1.0,
        };

        let mut buf = [0; 64];
        let len = frame.encode(&mut buf).unwrap();

        assert_eq!(len, CcpFrame::LEN);
        assert_eq!(&buf[..2], &[0xC2, 0x07]);
        assert_eq!(&buf[2..10], &[0x34, 0x12, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[10..18], &[0x05, 0x04, 0x03, 0x02, 0x01, 0, 0, 0]);
        assert_eq!(&buf[26..30], &1.0f32.to_le_bytes());
    }

    #[test]
    fn header_decodes_from_a_longer_frame() {
        let mut frame = CcpFrame::template();
        frame.header.long_address = 0xdead;

        let mut buf = [0; CcpFrame::LEN];
        frame.encode(&mut buf).unwrap();

        let header = BlinkHeader::decode(&buf[..BlinkHeader::LEN]).unwrap();
        assert_eq!(header, frame.header);
        assert_eq!(header.frame_control(), Some(FrameControl::BlinkCcp));
    }

    #[test]
    fn template_is_an_uncorrected_ccp_blink() {
        let frame = CcpFrame::template();

        assert_eq!(frame.header.frame_control(), Some(FrameControl::BlinkCcp));
        assert_eq!(frame.header.seq_num, 0);
        assert_eq!(frame.correction_factor, 1.0);
    }

    #[test]
    fn unknown_frame_control_is_not_claimed() {
        let header = BlinkHeader {
            fctrl: 0x41,
            seq_num: 0,
            long_address: 0,
        };
        assert_eq!(header.frame_control(), None);
    }

    #[test]
    fn pan_frames_share_the_blink_header() {
        let frame = PanFrame {
            response: PanResponse {
                header: BlinkHeader {
                    fctrl: FrameControl::Blink.into(),
                    seq_num: 3,
                    long_address: 0x42,
                },
                pan_id: 0xDECA,
                short_address: 0x1111,
                slot_id: 4,
            },
            transmission_timestamp: 1,
            reception_timestamp: 2,
            correction_factor: 1.0,
        };

        let mut buf = [0; 64];
        let len = ssmarshal::serialize(&mut buf, &frame).unwrap();

        assert_eq!(len, PanFrame::LEN);
        assert_eq!(
            BlinkHeader::decode(&buf).unwrap(),
            frame.response.header
        );
        assert_eq!(&buf[10..12], &[0xCA, 0xDE]);
    }
}
