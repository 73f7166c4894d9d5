//! Error types shared by the mount and thermal camera drivers.

use thiserror::Error;

/// Failures of the serial link itself.
///
/// Anything that prevents bytes from reaching the device, or from being read
/// back, lands here. The device never saw the command when one of these is
/// returned from a write.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The port could not be opened or reconfigured.
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// Read or write failure on an open port.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation needed an open link but the link was closed.
    #[error("Serial link {0} is not open")]
    NotOpen(String),
}

/// Errors returned by the camir drivers.
///
/// There is no automatic retry anywhere: each variant is reported once and
/// the operation that produced it is abandoned.
#[derive(Error, Debug)]
pub enum Error {
    /// Port unavailable or write/read failure.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A value does not fit the protocol field it is destined for.
    #[error("Invalid argument {name}: {value}")]
    InvalidArgument {
        /// Name of the offending parameter
        name: &'static str,
        /// The rejected value, rendered for display
        value: String,
    },

    /// The thermal camera answered with bytes that are not UTF-8.
    #[error("Response is not valid UTF-8 ({} bytes)", .0.len())]
    Decode(Vec<u8>),

    /// The thermal camera reported an error in its response text.
    #[error("Device error: {0}")]
    Device(String),

    /// The image size could not be found in the directory listing.
    #[error("Size of {0} not found in directory listing")]
    SizeNotFound(String),

    /// A block-transfer response was shorter than its framing requires.
    #[error("Malformed block at offset {offset}: expected {expected} payload bytes, got {received}")]
    MalformedBlock {
        /// Byte offset of the requested block within the image
        offset: usize,
        /// Requested payload length
        expected: usize,
        /// Payload bytes actually available after the header
        received: usize,
    },

    /// Local file I/O (writing a retrieved image).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camir operations.
pub type Result<T> = std::result::Result<T, Error>;
