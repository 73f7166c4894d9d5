//! Pan-tilt mount control over PelcoD.
//!
//! The mount is driven open-loop: a frame that was written successfully says
//! nothing about whether the receiver acted on it. Motion commands keep the
//! mount moving until a stop frame arrives, except presets, which complete
//! on their own.

use std::ops::RangeInclusive;
use std::time::Duration;

use strum::{Display, EnumIter};
use tracing::{debug, warn};

use super::frame::{PelcoFrame, PelcoOptions};
use crate::error::Result;
use crate::transport::{LinkGuard, SerialLink, SerialPortLink};

/// Fixed PelcoD line speed.
pub const PELCO_BAUD_RATE: u32 = 9600;

/// Read/write timeout for the mount port.
pub const PELCO_TIMEOUT: Duration = Duration::from_secs(1);

/// Pan speed sent in data1 for left/right moves.
pub const PAN_SPEED: u8 = 0x3F;

/// Tilt speed sent in data2 for up/down moves.
pub const TILT_SPEED: u8 = 0x3F;

/// Presets a caller may set or clear. Preset 1 holds the factory start
/// position.
pub const PRESET_RANGE: RangeInclusive<u8> = 2..=40;

/// Manual motion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// One thing the mount can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Move(Direction),
    Stop,
    SetPreset(u8),
    GoToPreset(u8),
    ClearPreset(u8),
}

impl Intent {
    /// Option bits for this intent, built fresh every time.
    pub fn options(self) -> PelcoOptions {
        match self {
            Intent::Move(Direction::Left) => PelcoOptions::PAN_LEFT,
            Intent::Move(Direction::Right) => PelcoOptions::PAN_RIGHT,
            Intent::Move(Direction::Up) => PelcoOptions::TILT_UP,
            Intent::Move(Direction::Down) => PelcoOptions::TILT_DOWN,
            Intent::Stop => PelcoOptions::empty(),
            Intent::SetPreset(_) => PelcoOptions::PRESET | PelcoOptions::PAN_RIGHT,
            Intent::GoToPreset(_) => {
                PelcoOptions::PRESET | PelcoOptions::PAN_LEFT | PelcoOptions::PAN_RIGHT
            }
            Intent::ClearPreset(_) => PelcoOptions::PRESET | PelcoOptions::PAN_LEFT,
        }
    }

    /// `(data1, data2)` for this intent.
    pub fn data(self) -> (u8, u8) {
        match self {
            Intent::Move(Direction::Left | Direction::Right) => (PAN_SPEED, 0),
            Intent::Move(Direction::Up | Direction::Down) => (0, TILT_SPEED),
            Intent::Stop => (0, 0),
            Intent::SetPreset(n) | Intent::GoToPreset(n) | Intent::ClearPreset(n) => (0, n),
        }
    }

    /// Preset number, for preset intents.
    pub fn preset(self) -> Option<u8> {
        match self {
            Intent::SetPreset(n) | Intent::GoToPreset(n) | Intent::ClearPreset(n) => Some(n),
            _ => None,
        }
    }

    /// Wire frame for this intent on a receiver at `address`.
    ///
    /// Stop ignores `address` and always yields [`PelcoFrame::STOP`].
    pub fn frame(self, address: u8) -> PelcoFrame {
        if self == Intent::Stop {
            return PelcoFrame::STOP;
        }
        let (data1, data2) = self.data();
        PelcoFrame::encode(address, self.options(), data1, data2)
    }
}

/// Controller for a single PelcoD receiver.
///
/// Holds no motion state. Every call encodes one frame and writes it,
/// opening the link for the write and closing it afterwards.
///
/// # Example
///
/// ```no_run
/// use camir::pelco::MountController;
/// use std::{thread, time::Duration};
///
/// let mut mount = MountController::open_port("/dev/ttyUSB0", 1);
/// mount.left()?;
/// thread::sleep(Duration::from_millis(500));
/// mount.stop()?;
/// mount.go_to_preset(3)?;
/// # Ok::<(), camir::Error>(())
/// ```
pub struct MountController<L: SerialLink> {
    link: L,
    address: u8,
}

impl MountController<SerialPortLink> {
    /// Controller on a real port at the fixed PelcoD line settings.
    pub fn open_port(port: &str, address: u8) -> Self {
        Self::new(
            SerialPortLink::new(port, PELCO_BAUD_RATE, PELCO_TIMEOUT),
            address,
        )
    }
}

impl<L: SerialLink> MountController<L> {
    pub fn new(link: L, address: u8) -> Self {
        Self { link, address }
    }

    /// Receiver address frames are sent to.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Encode and transmit the frame for `intent`, returning what was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`](crate::Error::Channel) if the port cannot
    /// be opened or the write fails.
    pub fn send(&mut self, intent: Intent) -> Result<PelcoFrame> {
        if let Some(n) = intent.preset() {
            if !PRESET_RANGE.contains(&n) {
                warn!(
                    "Preset {} is outside {}-{}; preset 1 is the start position",
                    n,
                    PRESET_RANGE.start(),
                    PRESET_RANGE.end()
                );
            }
        }

        let frame = intent.frame(self.address);
        debug!("PelcoD send {:?}: {:02X?}", intent, frame.as_bytes());

        let mut open = LinkGuard::acquire(&mut self.link)?;
        open.write_all(frame.as_bytes())?;
        Ok(frame)
    }

    /// Pan left at the fixed pan speed until stopped.
    pub fn left(&mut self) -> Result<PelcoFrame> {
        self.send(Intent::Move(Direction::Left))
    }

    /// Pan right at the fixed pan speed until stopped.
    pub fn right(&mut self) -> Result<PelcoFrame> {
        self.send(Intent::Move(Direction::Right))
    }

    /// Tilt up at the fixed tilt speed until stopped.
    pub fn up(&mut self) -> Result<PelcoFrame> {
        self.send(Intent::Move(Direction::Up))
    }

    /// Tilt down at the fixed tilt speed until stopped.
    pub fn down(&mut self) -> Result<PelcoFrame> {
        self.send(Intent::Move(Direction::Down))
    }

    /// Interrupt the current move. Safe to repeat.
    pub fn stop(&mut self) -> Result<PelcoFrame> {
        self.send(Intent::Stop)
    }

    /// Save the current position as preset `n` (2–40).
    pub fn set_preset(&mut self, n: u8) -> Result<PelcoFrame> {
        self.send(Intent::SetPreset(n))
    }

    /// Move to the position saved as preset `n`.
    pub fn go_to_preset(&mut self, n: u8) -> Result<PelcoFrame> {
        self.send(Intent::GoToPreset(n))
    }

    /// Forget preset `n` (2–40).
    pub fn clear_preset(&mut self, n: u8) -> Result<PelcoFrame> {
        self.send(Intent::ClearPreset(n))
    }
}
