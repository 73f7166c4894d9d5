//! Command-line control for the PelcoD mount and the FLIR thermal camera.
//!
//! Subcommands:
//! - `mount move|stop|preset`: drive the pan-tilt mount
//! - `thermal focus|zoom|range|auto-adjust`: camera optics and display range
//! - `thermal image get|save|rm|ls`: manage and retrieve stored images
//! - `thermal cmd`: send one raw command line and show the classified reply
//!
//! Port names and timing come from `~/.camir/config.json` (or `--config`),
//! with the port and address flags taking precedence.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use camir::config::CamIrConfig;
use camir::flir::{write_to_file, AutoAdjust, Response, ThermalCamera};
use camir::pelco::{Direction, Intent, MountController, PRESET_RANGE};
use camir::transport::SerialPortLink;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Digital zoom powers the A40 supports
const ZOOM_RANGE: std::ops::RangeInclusive<f64> = 1.0..=8.0;

/// PelcoD mount and FLIR thermal camera control tool
#[derive(Parser, Debug)]
#[command(name = "camir_tool")]
#[command(about = "Control a PelcoD pan-tilt mount and a FLIR A40 thermal camera")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to ~/.camir/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mount serial port, overriding the config file
    #[arg(long, global = true)]
    mount_port: Option<String>,

    /// Mount receiver address, overriding the config file
    #[arg(long, global = true)]
    address: Option<u8>,

    /// Thermal camera serial port, overriding the config file
    #[arg(long, global = true)]
    thermal_port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pan-tilt mount
    Mount {
        #[command(subcommand)]
        action: MountAction,
    },

    /// FLIR thermal camera
    Thermal {
        #[command(subcommand)]
        action: ThermalAction,
    },
}

#[derive(Subcommand, Debug)]
enum MountAction {
    /// Move in one direction, then stop
    Move {
        direction: DirectionArg,

        /// Seconds to move before stopping
        #[arg(short, long, default_value = "1.0")]
        duration: f64,
    },

    /// Stop any motion
    Stop,

    /// Set, recall or clear a preset position
    Preset {
        action: PresetAction,

        /// Preset number (1 is reserved for the start position)
        #[arg(value_parser = clap::value_parser!(u8).range(2..=40))]
        number: u8,
    },
}

#[derive(Subcommand, Debug)]
enum ThermalAction {
    /// Focus control
    Focus { mode: FocusMode },

    /// Digital zoom power (1.0 to 8.0)
    Zoom {
        #[arg(value_parser = parse_zoom)]
        power: f64,
    },

    /// Fix the displayed temperature range in °C
    #[command(allow_negative_numbers = true)]
    Range { low: f64, high: f64 },

    /// Automatic level/span adjustment
    AutoAdjust { mode: OnOff },

    /// Stored image management
    Image {
        action: ImageAction,

        /// Image file name on the camera
        name: Option<String>,

        /// Local output path for `get` (defaults to the image name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send a raw command line, e.g. `thermal cmd "ver"`
    Cmd { text: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Left,
    Right,
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Left => Direction::Left,
            DirectionArg::Right => Direction::Right,
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PresetAction {
    Set,
    Goto,
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FocusMode {
    Auto,
    Near,
    Far,
    Stop,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnOff {
    On,
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImageAction {
    /// Copy an image from the camera
    Get,
    /// Store the current frame on the camera
    Save,
    /// Delete an image on the camera
    Rm,
    /// List stored images
    Ls,
}

fn parse_zoom(s: &str) -> std::result::Result<f64, String> {
    let power: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !ZOOM_RANGE.contains(&power) {
        return Err(format!(
            "zoom must be between {} and {}",
            ZOOM_RANGE.start(),
            ZOOM_RANGE.end()
        ));
    }
    Ok(power)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Mount { action } => cmd_mount(&config, action),
        Command::Thermal { action } => cmd_thermal(&config, action),
    }
}

fn load_config(args: &Args) -> Result<CamIrConfig> {
    let mut config = match &args.config {
        Some(path) => CamIrConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => match CamIrConfig::default_path() {
            Ok(path) => CamIrConfig::load_or_default(&path)
                .with_context(|| format!("reading {}", path.display()))?,
            Err(_) => CamIrConfig::default(),
        },
    };

    if let Some(port) = &args.mount_port {
        config.mount.port = port.clone();
    }
    if let Some(address) = args.address {
        config.mount.address = address;
    }
    if let Some(port) = &args.thermal_port {
        config.thermal.port = port.clone();
    }
    Ok(config)
}

// ==================== Mount ====================

fn cmd_mount(config: &CamIrConfig, action: MountAction) -> Result<()> {
    let mut mount = MountController::new(config.mount.link(), config.mount.address);
    info!(
        "Mount on {} (address {})",
        config.mount.port, config.mount.address
    );

    match action {
        MountAction::Move {
            direction,
            duration,
        } => {
            let duration = Duration::try_from_secs_f64(duration)
                .map_err(|_| anyhow!("invalid duration {duration}"))?;
            let direction = Direction::from(direction);

            info!("Moving {} for {:?}", direction, duration);
            mount.send(Intent::Move(direction))?;
            thread::sleep(duration);
            mount.stop()?;
        }
        MountAction::Stop => {
            mount.stop()?;
        }
        MountAction::Preset { action, number } => {
            debug_assert!(PRESET_RANGE.contains(&number));
            match action {
                PresetAction::Set => mount.set_preset(number)?,
                PresetAction::Goto => mount.go_to_preset(number)?,
                PresetAction::Clear => mount.clear_preset(number)?,
            };
            info!("Preset {} {:?} sent", number, action);
        }
    }
    Ok(())
}

// ==================== Thermal ====================

fn cmd_thermal(config: &CamIrConfig, action: ThermalAction) -> Result<()> {
    info!(
        "Opening thermal camera on {} at {} baud",
        config.thermal.port, config.thermal.baud_rate
    );
    let mut camera = ThermalCamera::open_with_baud(
        config.thermal.link(),
        config.thermal.fast_baud_rate,
    )?
    .with_settle_delay(config.thermal.settle_delay())
    .with_block_delay(config.thermal.block_delay());

    match action {
        ThermalAction::Focus { mode } => {
            let reply = match mode {
                FocusMode::Auto => camera.autofocus()?,
                FocusMode::Near => camera.focus_near()?,
                FocusMode::Far => camera.focus_far()?,
                FocusMode::Stop => camera.focus_stop()?,
            };
            print_reply(&reply);
        }
        ThermalAction::Zoom { power } => print_reply(&camera.zoom(power)?),
        ThermalAction::Range { low, high } => {
            if low >= high {
                bail!("low ({low}) must be below high ({high})");
            }
            camera.set_range(low, high)?;
            info!("Range set to {}..{} °C", low, high);
        }
        ThermalAction::AutoAdjust { mode } => {
            let mode = match mode {
                OnOff::On => AutoAdjust::On,
                OnOff::Off => AutoAdjust::Off,
            };
            print_reply(&camera.auto_adjust(mode)?);
        }
        ThermalAction::Image {
            action,
            name,
            output,
        } => cmd_image(&mut camera, action, name, output)?,
        ThermalAction::Cmd { text } => match camera.channel().execute(&text)? {
            Response::Ok(reply) => print_reply(&reply),
            Response::DeviceError(reply) => bail!("camera reported: {}", reply.trim()),
            Response::DecodeError(raw) => {
                bail!("reply was not UTF-8 ({} bytes): {:02X?}", raw.len(), raw)
            }
        },
    }
    Ok(())
}

fn cmd_image(
    camera: &mut ThermalCamera<SerialPortLink>,
    action: ImageAction,
    name: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    match action {
        ImageAction::Ls => {
            for image in camera.list_images()? {
                println!("{image}");
            }
        }
        ImageAction::Save => camera.store_image(&require_name(name, action)?)?,
        ImageAction::Rm => camera.remove_image(&require_name(name, action)?)?,
        ImageAction::Get => {
            let name = require_name(name, action)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&name));
            let mut transfer = camera.transfer();
            let size = transfer.discover_size(&name)?;

            let bar = ProgressBar::new(size as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("#>-"),
            );
            let bytes = transfer.fetch_with_progress(&name, size, |state| {
                bar.set_position(state.received() as u64)
            })?;
            bar.finish();

            write_to_file(&output, &bytes)?;
            println!("{} -> {} ({} bytes)", name, output.display(), bytes.len());
        }
    }
    Ok(())
}

fn require_name(name: Option<String>, action: ImageAction) -> Result<String> {
    name.ok_or_else(|| anyhow!("an image name is required for {:?}", action))
}

fn print_reply(reply: &str) {
    let reply = reply.trim();
    if !reply.is_empty() {
        println!("{reply}");
    }
}
