//! Serial drivers for a PelcoD pan-tilt mount and a FLIR A40 thermal camera.
//!
//! Both devices are driven over plain serial ports through the
//! [`transport::SerialLink`] abstraction, which also lets the drivers run
//! against the scripted [`transport::mock::MockLink`] without hardware.
//!
//! # Features
//!
//! - `pelco` - PelcoD mount frame codec and controller
//! - `flir` - FLIR A40 ASCII command channel, camera control and image transfer
//! - `full` - both drivers (default)

pub mod config;
pub mod error;
pub mod transport;

#[cfg(feature = "flir")]
pub mod flir;

#[cfg(feature = "pelco")]
pub mod pelco;

pub use error::{ChannelError, Error, Result};
