//! Serial link abstraction shared by both drivers.
//!
//! Both devices hang off plain RS-232/RS-485 ports. The drivers never hold a
//! port open between operations: every exchange opens the link, talks, and
//! closes it again. [`LinkGuard`] ties the close to scope exit so error paths
//! cannot leak the port.
//!
//! # Example
//!
//! ```no_run
//! use camir::transport::{LinkGuard, SerialLink, SerialPortLink};
//! use std::time::Duration;
//!
//! let mut link = SerialPortLink::new("/dev/ttyUSB0", 19200, Duration::from_millis(100));
//! {
//!     let mut open = LinkGuard::acquire(&mut link)?;
//!     open.write_all(b"\rls\r")?;
//!     let reply = open.read_available()?;
//!     println!("{} bytes", reply.len());
//! } // closed here
//! assert!(!link.is_open());
//! # Ok::<(), camir::ChannelError>(())
//! ```

pub mod mock;

use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, trace};

use crate::error::ChannelError;

/// Byte-oriented duplex serial channel.
///
/// Implementations must make `read_available` return everything that
/// arrived before the read timeout elapsed, including an empty buffer when
/// nothing did. A timeout is never an error at this level.
pub trait SerialLink {
    /// Port identifier, for logging.
    fn name(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Open the port with the current baud rate and timeout.
    fn open(&mut self) -> Result<(), ChannelError>;

    /// Close the port. Closing a closed link is a no-op.
    fn close(&mut self);

    /// Write the whole buffer to an open link.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError>;

    /// Read all bytes available until the read timeout elapses.
    fn read_available(&mut self) -> Result<Vec<u8>, ChannelError>;

    fn baud_rate(&self) -> u32;

    /// Change the baud rate, applying it immediately if the link is open.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ChannelError>;
}

/// Scoped ownership of an open link.
///
/// Opens the link on [`acquire`](Self::acquire) if it is not already open
/// and closes it when dropped.
pub struct LinkGuard<'a, L: SerialLink + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: SerialLink + ?Sized> LinkGuard<'a, L> {
    pub fn acquire(link: &'a mut L) -> Result<Self, ChannelError> {
        if !link.is_open() {
            link.open()?;
        }
        Ok(Self { link })
    }
}

impl<L: SerialLink + ?Sized> Deref for LinkGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &Self::Target {
        self.link
    }
}

impl<L: SerialLink + ?Sized> DerefMut for LinkGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.link
    }
}

impl<L: SerialLink + ?Sized> Drop for LinkGuard<'_, L> {
    fn drop(&mut self) {
        self.link.close();
    }
}

/// [`SerialLink`] over a real port, via the `serialport` crate.
pub struct SerialPortLink {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLink {
    /// Describe a port. Nothing is opened until the first exchange.
    pub fn new(port_name: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout,
            port: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl SerialLink for SerialPortLink {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&mut self) -> Result<(), ChannelError> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        debug!("Opened {} at {} baud", self.port_name, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed {}", self.port_name);
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ChannelError::NotOpen(self.port_name.clone()))?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, ChannelError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ChannelError::NotOpen(self.port_name.clone()))?;

        let mut buf = [0u8; 1024];
        let mut bytes = Vec::new();
        loop {
            match port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => bytes.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("{} recv {} bytes", self.port_name, bytes.len());
        Ok(bytes)
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ChannelError> {
        self.baud_rate = baud_rate;
        if let Some(port) = self.port.as_mut() {
            port.set_baud_rate(baud_rate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLink;
    use super::*;

    #[test]
    fn test_guard_opens_and_closes() {
        let mut link = MockLink::new();
        {
            let guard = LinkGuard::acquire(&mut link).unwrap();
            assert!(guard.is_open());
        }
        assert!(!link.is_open());
        assert_eq!(link.open_count(), 1);
        assert_eq!(link.close_count(), 1);
    }

    #[test]
    fn test_guard_closes_on_error_path() {
        fn failing_exchange(link: &mut MockLink) -> Result<(), ChannelError> {
            let mut open = LinkGuard::acquire(link)?;
            open.write_all(b"x")?;
            Err(ChannelError::NotOpen("simulated".to_string()))
        }

        let mut link = MockLink::new();
        assert!(failing_exchange(&mut link).is_err());
        assert!(!link.is_open());
        assert_eq!(link.close_count(), 1);
    }

    #[test]
    fn test_guard_reports_open_failure() {
        let mut link = MockLink::unavailable();
        let result = LinkGuard::acquire(&mut link);
        assert!(matches!(result, Err(ChannelError::Io(_))));
        drop(result);
        assert_eq!(link.close_count(), 0);
    }

    #[test]
    fn test_unopened_port_link_refuses_io() {
        let mut link = SerialPortLink::new("/dev/null-camir", 9600, Duration::from_secs(1));
        assert!(!link.is_open());
        assert!(matches!(
            link.write_all(&[0xFF]),
            Err(ChannelError::NotOpen(_))
        ));
        assert!(matches!(
            link.read_available(),
            Err(ChannelError::NotOpen(_))
        ));
    }

    #[test]
    fn test_baud_rate_change_while_closed() {
        let mut link = SerialPortLink::new("/dev/null-camir", 19200, Duration::from_millis(100));
        link.set_baud_rate(115200).unwrap();
        assert_eq!(link.baud_rate(), 115200);
        assert_eq!(link.timeout(), Duration::from_millis(100));
    }
}
