//! FLIR A40 ASCII command channel
//!
//! The A40M exposes a small shell over RS-232. Commands are single lines
//! delimited by carriage returns on both sides (`\rzoom 2.0\r`). The camera
//! echoes the command, prints any output, and returns to its prompt; there
//! is no length prefix and no end marker, so a response is simply whatever
//! arrives before the read timeout.
//!
//! ## Response classification
//!
//! - invalid UTF-8: [`Response::DecodeError`] with the raw bytes
//! - text containing `Error`: [`Response::DeviceError`]
//! - anything else: [`Response::Ok`]
//!
//! An empty response (nothing arrived before the timeout) is valid UTF-8 and
//! classifies as `Ok("")`.
//!
//! ## Link handling
//!
//! The port is opened for each exchange and closed afterwards, including
//! when the exchange fails part way through.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{LinkGuard, SerialLink, SerialPortLink};

/// Baud rate the camera powers up with.
pub const INITIAL_BAUD_RATE: u32 = 19200;

/// Baud rate negotiated at session start.
pub const FAST_BAUD_RATE: u32 = 115200;

/// Read timeout. Responses are considered complete once the line has been
/// quiet this long.
pub const THERMAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Substring that marks a device-reported failure.
const ERROR_MARKER: &str = "Error";

/// Outcome of one command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Valid text with no error marker.
    Ok(String),
    /// Valid text in which the camera reported an error.
    DeviceError(String),
    /// Bytes that could not be decoded as UTF-8.
    DecodeError(Vec<u8>),
}

impl Response {
    /// Classify raw bytes read back from the camera.
    pub fn classify(raw: Vec<u8>) -> Self {
        match String::from_utf8(raw) {
            Ok(text) if text.contains(ERROR_MARKER) => Response::DeviceError(text),
            Ok(text) => Response::Ok(text),
            Err(e) => Response::DecodeError(e.into_bytes()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Convert to a typed result, keeping the text on success.
    pub fn into_result(self) -> Result<String> {
        match self {
            Response::Ok(text) => Ok(text),
            Response::DeviceError(text) => Err(Error::Device(text)),
            Response::DecodeError(raw) => Err(Error::Decode(raw)),
        }
    }
}

/// Wrap a command line in the camera's carriage-return delimiters.
pub fn frame_command(command: &str) -> String {
    format!("\r{command}\r")
}

/// Command channel to one FLIR camera.
///
/// # Example
///
/// ```no_run
/// use camir::flir::{Response, ThermalChannel};
///
/// let mut channel = ThermalChannel::open_port("/dev/ttyUSB1");
/// match channel.execute("ver")? {
///     Response::Ok(text) => println!("{text}"),
///     Response::DeviceError(text) => eprintln!("camera said: {text}"),
///     Response::DecodeError(raw) => eprintln!("{} undecodable bytes", raw.len()),
/// }
/// # Ok::<(), camir::Error>(())
/// ```
pub struct ThermalChannel<L: SerialLink> {
    link: L,
}

impl ThermalChannel<SerialPortLink> {
    /// Channel on a real port at the camera's power-up settings.
    pub fn open_port(port: &str) -> Self {
        Self::new(SerialPortLink::new(
            port,
            INITIAL_BAUD_RATE,
            THERMAL_TIMEOUT,
        ))
    }
}

impl<L: SerialLink> ThermalChannel<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub(crate) fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Write several command lines in one open/close cycle and read back
    /// their combined output.
    pub fn exchange(&mut self, commands: &[&str]) -> Result<Vec<u8>> {
        let mut open = LinkGuard::acquire(&mut self.link)?;
        for command in commands {
            debug!("FLIR send: {:?}", command);
            open.write_all(frame_command(command).as_bytes())?;
        }
        let raw = open.read_available()?;
        trace!("FLIR recv: {:?}", String::from_utf8_lossy(&raw));
        Ok(raw)
    }

    /// Send one command and classify the response.
    ///
    /// Only link failures are returned as `Err`; device errors and
    /// undecodable output come back as [`Response`] variants.
    pub fn execute(&mut self, command: &str) -> Result<Response> {
        let raw = self.exchange(&[command])?;
        Ok(Response::classify(raw))
    }

    /// Send one command and require a clean response.
    ///
    /// # Errors
    ///
    /// - [`Error::Device`] if the camera reported an error (also logged)
    /// - [`Error::Decode`] if the response was not UTF-8
    /// - [`Error::Channel`] on link failure
    pub fn command(&mut self, command: &str) -> Result<String> {
        let response = self.execute(command)?;
        match &response {
            Response::DeviceError(text) => warn!("FLIR {:?} failed: {}", command, text.trim()),
            Response::DecodeError(raw) => {
                warn!("FLIR {:?} returned {} non-UTF-8 bytes", command, raw.len())
            }
            Response::Ok(_) => {}
        }
        response.into_result()
    }

    /// Switch the camera's serial port 1 to `baud_rate`, then follow on the
    /// local side.
    ///
    /// The local rate is left unchanged if the camera rejects the command.
    pub fn negotiate_baud(&mut self, baud_rate: u32) -> Result<String> {
        let text = self.command(&format!("baudrate -p 1 {baud_rate}"))?;
        self.link.set_baud_rate(baud_rate)?;
        info!("{} now at {} baud", self.link.name(), baud_rate);
        Ok(text)
    }
}
