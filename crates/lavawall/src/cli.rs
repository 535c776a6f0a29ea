use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lavaconfig::{MAX_FPS, MIN_FPS};

#[derive(Parser, Debug)]
#[command(
    name = "lavawall",
    author,
    version,
    about = "Ambient metaball lava lamp rendered with wgpu"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Window (or export) size in physical pixels, e.g. `1920x1080`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Frame-rate cap (0 = uncapped); overrides `display.fps`.
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Render a single still frame and stop animating.
    #[arg(long)]
    pub reduced_motion: bool,

    /// Seed for blob placement; overrides the configured seed.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Render one frame headlessly and write it to this PNG file.
    #[arg(long, value_name = "PATH")]
    pub still_export: Option<PathBuf>,

    /// Seconds of simulation to run before the still export.
    #[arg(long, value_name = "SECONDS", requires = "still_export")]
    pub still_time: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and validate configuration.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Parse and validate the configuration, then print a summary.
    Check,
    /// Print the built-in default configuration as TOML.
    Dump,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate `{value}`"))?;
    if fps == 0.0 || (MIN_FPS..=MAX_FPS).contains(&fps) {
        Ok(fps)
    } else {
        Err(format!("frame rate must be 0 (uncapped) or within {MIN_FPS}..={MAX_FPS}"))
    }
}
