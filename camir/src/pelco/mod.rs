//! PelcoD pan-tilt mount driver
//!
//! This module encodes PelcoD frames and sends them to a DTRX3-style
//! receiver over a 9600 baud serial line.

pub mod frame;
pub mod mount;

pub use frame::{byte_arg, compute_checksum, PelcoFrame, PelcoOptions, FRAME_LEN, SYNC_BYTE};
pub use mount::{
    Direction, Intent, MountController, PAN_SPEED, PELCO_BAUD_RATE, PELCO_TIMEOUT, PRESET_RANGE,
    TILT_SPEED,
};
