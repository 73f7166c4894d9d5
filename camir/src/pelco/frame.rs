//! PelcoD frame encoding
//!
//! A PelcoD command is exactly 7 bytes:
//!
//! ```text
//! FF  addr  cmd1  cmd2  data1  data2  checksum
//! ```
//!
//! The checksum is the sum of bytes 1 through 5, truncated to 8 bits. The
//! sync byte does not take part in it. The protocol is send-only, so there
//! is no decoder.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Length of every PelcoD frame in bytes
pub const FRAME_LEN: usize = 7;

/// First byte of every frame
pub const SYNC_BYTE: u8 = 0xFF;

bitflags! {
    /// The 14 option bits carried in command bytes 1 and 2.
    ///
    /// Command byte 1 lives in the high byte and command byte 2 in the low
    /// byte, so [`command1`](Self::command1) and
    /// [`command2`](Self::command2) are plain shifts. Bits 0x40 and 0x20 of
    /// command byte 1 have no flag and therefore always encode as zero.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PelcoOptions: u16 {
        const SENSE          = 0x80 << 8;
        const TOGGLE_AUTOMAN = 0x10 << 8;
        const TOGGLE_ONOFF   = 0x08 << 8;
        const IRIS_CLOSE     = 0x04 << 8;
        const IRIS_OPEN      = 0x02 << 8;
        const FOCUS_NEAR     = 0x01 << 8;

        const FOCUS_FAR      = 0x80;
        const ZOOM_WIDE      = 0x40;
        const ZOOM_TELE      = 0x20;
        const TILT_DOWN      = 0x10;
        const TILT_UP        = 0x08;
        const PAN_LEFT       = 0x04;
        const PAN_RIGHT      = 0x02;
        const PRESET         = 0x01;
    }
}

impl PelcoOptions {
    /// Command byte 1 (sense, auto/manual, on/off, iris, focus near).
    pub fn command1(self) -> u8 {
        (self.bits() >> 8) as u8
    }

    /// Command byte 2 (focus far, zoom, tilt, pan, preset).
    pub fn command2(self) -> u8 {
        (self.bits() & 0x00FF) as u8
    }
}

/// Sum of bytes modulo 256.
pub fn compute_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Narrow a wide integer to a protocol byte.
///
/// Returns [`Error::InvalidArgument`] naming `name` when `value` is outside
/// 0–255.
pub fn byte_arg(name: &'static str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidArgument {
        name,
        value: value.to_string(),
    })
}

/// One complete, immutable PelcoD frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PelcoFrame([u8; FRAME_LEN]);

impl PelcoFrame {
    /// Universal stop. Fixed bytes, addressed to receiver 1, understood by
    /// every receiver regardless of its configured address.
    pub const STOP: PelcoFrame = PelcoFrame([SYNC_BYTE, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// Build a frame. Total over its input domain.
    pub fn encode(address: u8, options: PelcoOptions, data1: u8, data2: u8) -> Self {
        let cmd1 = options.command1();
        let cmd2 = options.command2();
        let checksum = compute_checksum(&[address, cmd1, cmd2, data1, data2]);
        Self([SYNC_BYTE, address, cmd1, cmd2, data1, data2, checksum])
    }

    /// Build a frame from unchecked integers, rejecting anything that does
    /// not fit in a byte.
    pub fn encode_checked(
        address: i64,
        options: PelcoOptions,
        data1: i64,
        data2: i64,
    ) -> Result<Self> {
        Ok(Self::encode(
            byte_arg("address", address)?,
            options,
            byte_arg("data1", data1)?,
            byte_arg("data2", data2)?,
        ))
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn address(&self) -> u8 {
        self.0[1]
    }

    pub fn command1(&self) -> u8 {
        self.0[2]
    }

    pub fn command2(&self) -> u8 {
        self.0[3]
    }

    pub fn data1(&self) -> u8 {
        self.0[4]
    }

    pub fn data2(&self) -> u8 {
        self.0[5]
    }

    pub fn checksum(&self) -> u8 {
        self.0[6]
    }

    /// True when the stored checksum matches bytes 1 through 5.
    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.0[1..6]) == self.0[6]
    }
}

impl AsRef<[u8]> for PelcoFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
