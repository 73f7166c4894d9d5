//! FLIR ThermoVision A40M driver
//!
//! The camera speaks a line-oriented ASCII shell over RS-232. This module
//! provides:
//!
//! - [`ThermalChannel`]: command/response exchange and error classification
//! - [`ImageTransfer`]: block-wise retrieval of stored JPEGs
//! - [`ThermalCamera`]: focus, zoom, temperature range and image storage

pub mod camera;
pub mod channel;
pub mod transfer;

pub use camera::{level_span, AutoAdjust, ThermalCamera, KELVIN_OFFSET, SETTLE_DELAY};
pub use channel::{
    frame_command, Response, ThermalChannel, FAST_BAUD_RATE, INITIAL_BAUD_RATE, THERMAL_TIMEOUT,
};
pub use transfer::{
    block_command, block_requests, parse_listing_size, strip_block_header, write_to_file,
    ImageTransfer, TransferState, BLOCK_DELAY, BLOCK_HEADER_SKIP, BLOCK_SIZE, IMAGE_DIR,
};
