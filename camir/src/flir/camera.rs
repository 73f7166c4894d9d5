//! Typed camera operations on top of [`ThermalChannel`].
//!
//! Each method is one command line (or a short fixed sequence) of the A40
//! shell. Temperatures are taken in °C and sent in Kelvin.

use std::path::Path;
use std::thread;
use std::time::Duration;

use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use super::channel::{Response, ThermalChannel, FAST_BAUD_RATE, INITIAL_BAUD_RATE, THERMAL_TIMEOUT};
use super::transfer::{ImageTransfer, BLOCK_DELAY, IMAGE_DIR};
use crate::error::{Error, Result};
use crate::transport::{SerialLink, SerialPortLink};

/// Pause between the commands of [`ThermalCamera::set_range`].
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Step size used for continuous focus moves.
const FOCUS_STEP: u32 = 25;

/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Automatic level/span adjustment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AutoAdjust {
    On,
    Off,
}

/// `(level, span)` in Kelvin for a Celsius display range.
pub fn level_span(low_c: f64, high_c: f64) -> (f64, f64) {
    ((low_c + high_c) / 2.0 + KELVIN_OFFSET, high_c - low_c)
}

/// FLIR A40 camera.
///
/// # Example
///
/// ```no_run
/// use camir::flir::ThermalCamera;
///
/// let mut camera = ThermalCamera::open_port("/dev/ttyUSB1")?;
/// camera.zoom(2.0)?;
/// camera.set_range(20.0, 40.0)?;
/// camera.store_image("IR_0001.jpg")?;
/// let bytes = camera.get_image("IR_0001.jpg", "IR_0001.jpg")?;
/// println!("saved {bytes} bytes");
/// # Ok::<(), camir::Error>(())
/// ```
pub struct ThermalCamera<L: SerialLink> {
    channel: ThermalChannel<L>,
    settle_delay: Duration,
    block_delay: Duration,
}

impl ThermalCamera<SerialPortLink> {
    /// Open a session on a real port, negotiating the fast baud rate.
    pub fn open_port(port: &str) -> Result<Self> {
        Self::open(SerialPortLink::new(port, INITIAL_BAUD_RATE, THERMAL_TIMEOUT))
    }
}

impl<L: SerialLink> ThermalCamera<L> {
    /// Wrap a link without touching the camera. The link must already be
    /// at whatever rate the camera is using.
    pub fn new(link: L) -> Self {
        Self {
            channel: ThermalChannel::new(link),
            settle_delay: SETTLE_DELAY,
            block_delay: BLOCK_DELAY,
        }
    }

    /// Start a session: switch both sides to [`FAST_BAUD_RATE`].
    pub fn open(link: L) -> Result<Self> {
        Self::open_with_baud(link, FAST_BAUD_RATE)
    }

    /// Start a session at a non-default speed.
    ///
    /// Nothing is sent when the link is already at `baud_rate`; the camera
    /// keeps its rate between sessions.
    pub fn open_with_baud(link: L, baud_rate: u32) -> Result<Self> {
        let mut camera = Self::new(link);
        if camera.link().baud_rate() == baud_rate {
            debug!("{} already at {} baud", camera.link().name(), baud_rate);
        } else {
            camera.channel.negotiate_baud(baud_rate)?;
        }
        Ok(camera)
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_block_delay(mut self, block_delay: Duration) -> Self {
        self.block_delay = block_delay;
        self
    }

    pub fn channel(&mut self) -> &mut ThermalChannel<L> {
        &mut self.channel
    }

    pub fn link(&self) -> &L {
        self.channel.link()
    }

    pub fn into_link(self) -> L {
        self.channel.into_link()
    }

    /// Run one autofocus cycle.
    pub fn autofocus(&mut self) -> Result<String> {
        self.channel.command("autofocus now")
    }

    /// Start moving focus towards near. Runs until [`focus_stop`](Self::focus_stop).
    pub fn focus_near(&mut self) -> Result<String> {
        self.channel.command(&format!("focus -c {FOCUS_STEP}"))
    }

    /// Start moving focus towards infinity. Runs until [`focus_stop`](Self::focus_stop).
    pub fn focus_far(&mut self) -> Result<String> {
        self.channel.command(&format!("focus -i {FOCUS_STEP}"))
    }

    pub fn focus_stop(&mut self) -> Result<String> {
        self.channel.command("focus -s")
    }

    /// Set digital zoom. The camera decides which powers it accepts.
    pub fn zoom(&mut self, power: f64) -> Result<String> {
        self.channel.command(&format!("zoom {power:?}"))
    }

    /// Fix the display range to `low_c`..`high_c` °C.
    ///
    /// Turns automatic adjustment off, then sets level and span. Stops at
    /// the first command the camera rejects.
    pub fn set_range(&mut self, low_c: f64, high_c: f64) -> Result<()> {
        let (level, span) = level_span(low_c, high_c);
        debug!("Range {}..{} °C: level {} K, span {} K", low_c, high_c, level, span);

        self.auto_adjust(AutoAdjust::Off)?;
        thread::sleep(self.settle_delay);
        self.channel.command(&format!("levelt {level:?}"))?;
        thread::sleep(self.settle_delay);
        self.channel.command(&format!("spant {span:?}"))?;
        Ok(())
    }

    pub fn auto_adjust(&mut self, mode: AutoAdjust) -> Result<String> {
        self.channel.command(&format!("autoadj {mode}"))
    }

    /// Save the current frame to flash as `name`.
    pub fn store_image(&mut self, name: &str) -> Result<()> {
        let cd = format!("cd {IMAGE_DIR}");
        self.channel.command(&cd)?;
        self.channel.command(&format!("store -j {name}"))?;
        info!("Stored {}", name);
        Ok(())
    }

    /// Delete `name` from flash.
    pub fn remove_image(&mut self, name: &str) -> Result<()> {
        let cd = format!("cd {IMAGE_DIR}");
        self.channel.command(&cd)?;
        self.channel.command(&format!("rm {name}"))?;
        info!("Removed {}", name);
        Ok(())
    }

    /// Names of the JPEG images in flash, in listing order.
    ///
    /// The listing is tokenized even if it contains `Error`, since file
    /// names may.
    pub fn list_images(&mut self) -> Result<Vec<String>> {
        let listing = match self.channel.execute(&format!("ls {IMAGE_DIR}"))? {
            Response::Ok(text) => text,
            Response::DeviceError(text) => {
                warn!("Listing of {} mentions an error: {}", IMAGE_DIR, text.trim());
                text
            }
            Response::DecodeError(raw) => return Err(Error::Decode(raw)),
        };
        Ok(listing
            .split_whitespace()
            .filter(|token| token.to_ascii_lowercase().ends_with(".jpg"))
            .map(str::to_string)
            .collect())
    }

    /// Block transfer over this camera's channel.
    pub fn transfer(&mut self) -> ImageTransfer<'_, L> {
        ImageTransfer::new(&mut self.channel).with_block_delay(self.block_delay)
    }

    /// Copy `name` from flash to `output`. Returns the byte count.
    pub fn get_image(&mut self, name: &str, output: impl AsRef<Path>) -> Result<usize> {
        self.transfer().get_image(name, output)
    }
}
