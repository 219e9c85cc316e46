use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use lumen_renderer::RenderFlags;

/// Log levels selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "lumen")]
#[command(about = "Render the demo scene with the interactive path tracer and save a PNG")]
pub struct Args {
    /// Image width in pixels
    #[arg(long, default_value_t = 320)]
    pub width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 240)]
    pub height: u32,

    /// Completed frames to accumulate before saving
    #[arg(short, long, default_value_t = 16)]
    pub frames: u64,

    /// Renderer properties as JSON; command line flags override it
    #[arg(short, long)]
    pub properties: Option<PathBuf>,

    /// Render flags, e.g. "ACCUMULATE | PARALLELIZE"
    #[arg(long, value_parser = parse_flags)]
    pub flags: Option<RenderFlags>,

    /// Maximum ray bounce depth
    #[arg(long)]
    pub bounces: Option<u32>,

    /// Vertical field of view in degrees
    #[arg(long)]
    pub fov: Option<f32>,

    /// Camera ticks of simulated look input before the final frames
    #[arg(long, default_value_t = 0)]
    pub orbit_ticks: u32,

    /// Image applied to the textured sphere
    #[arg(short, long)]
    pub texture: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = "lumen.png")]
    pub output: PathBuf,

    /// Give up waiting for frames after this many seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Set the logging level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

fn parse_flags(value: &str) -> Result<RenderFlags, String> {
    bitflags::parser::from_str::<RenderFlags>(value).map_err(|e| e.to_string())
}
