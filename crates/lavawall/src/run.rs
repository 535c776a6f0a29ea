use std::fs;

use anyhow::{Context, Result};
use lavaconfig::LavaConfig;
use renderer::{RenderPolicy, Renderer, RendererConfig, SetupError};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigAction, RunArgs};
use crate::paths::{self, ConfigSource};

const DEFAULT_SURFACE_SIZE: (u32, u32) = (1280, 720);

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Some(Command::Config(command)) => match command.action {
            ConfigAction::Check => check_config(&cli.run),
            ConfigAction::Dump => dump_config(),
        },
        None => run_lamp(&cli.run),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &RunArgs) -> Result<(LavaConfig, ConfigSource)> {
    let source = paths::resolve_config(args.config.as_deref())?;
    let Some(path) = source.path() else {
        return Ok((LavaConfig::default(), source));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = LavaConfig::from_toml_str(&text)
        .with_context(|| format!("failed to load config file {}", path.display()))?;
    tracing::debug!(source = %source, "loaded configuration");
    Ok((config, source))
}

fn check_config(args: &RunArgs) -> Result<()> {
    let (config, source) = load_config(args)?;
    println!("configuration OK ({source})");
    println!(
        "  {} blobs in {} size classes",
        config.total_population(),
        config.population.classes.len()
    );
    for class in &config.population.classes {
        println!(
            "    {}: {} x radius {}..{}",
            class.name, class.count, class.min_radius, class.max_radius
        );
    }
    println!(
        "  bloom threshold {} intensity {} radius {}",
        config.bloom.threshold, config.bloom.intensity, config.bloom.radius
    );
    Ok(())
}

fn dump_config() -> Result<()> {
    let text = LavaConfig::default()
        .to_toml_string()
        .context("failed to serialise default configuration")?;
    print!("{text}");
    Ok(())
}

/// Combines the loaded configuration with CLI overrides.
fn renderer_config(args: &RunArgs, lava: LavaConfig) -> RendererConfig {
    let seed = args.seed.or(lava.seed).unwrap_or_else(rand::random);
    let policy = match &args.still_export {
        Some(path) => RenderPolicy::Export {
            time: args.still_time.unwrap_or(0.0),
            path: path.clone(),
        },
        None => {
            let reduced_motion = args.reduced_motion || lava.display.reduced_motion;
            let fps = args.fps.or(lava.display.fps).filter(|fps| *fps > 0.0);
            RenderPolicy::for_display(reduced_motion, fps)
        }
    };
    RendererConfig {
        surface_size: args.size.unwrap_or(DEFAULT_SURFACE_SIZE),
        seed,
        policy,
        lava,
    }
}

fn run_lamp(args: &RunArgs) -> Result<()> {
    let (lava, source) = load_config(args)?;
    let config = renderer_config(args, lava);
    tracing::info!(
        config = %source,
        width = config.surface_size.0,
        height = config.surface_size.1,
        seed = config.seed,
        "starting lavawall"
    );

    let exporting = matches!(config.policy, RenderPolicy::Export { .. });
    let mut renderer = Renderer::new(config);
    settle(renderer.run(), exporting)
}

/// An unsupported environment disables the animation instead of failing the
/// process; an export still has to produce its file.
fn settle(result: Result<()>, exporting: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if !exporting => match err.downcast_ref::<SetupError>() {
            Some(setup) => {
                tracing::error!(error = %setup, "rendering unavailable; animation disabled");
                Ok(())
            }
            None => Err(err),
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_overrides_config_display_settings() {
        let mut lava = LavaConfig::default();
        lava.seed = Some(7);
        lava.display.fps = Some(30.0);
        let args = RunArgs {
            fps: Some(24.0),
            size: Some((800, 600)),
            ..RunArgs::default()
        };

        let config = renderer_config(&args, lava);
        assert_eq!(config.seed, 7);
        assert_eq!(config.surface_size, (800, 600));
        assert_eq!(
            config.policy,
            RenderPolicy::Animate {
                target_fps: Some(24.0)
            }
        );
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let args = RunArgs {
            fps: Some(0.0),
            ..RunArgs::default()
        };
        let config = renderer_config(&args, LavaConfig::default());
        assert_eq!(config.policy, RenderPolicy::Animate { target_fps: None });
    }

    #[test]
    fn reduced_motion_from_either_source_selects_still() {
        let mut lava = LavaConfig::default();
        lava.display.reduced_motion = true;
        let config = renderer_config(&RunArgs::default(), lava);
        assert_eq!(config.policy, RenderPolicy::Still);

        let args = RunArgs {
            reduced_motion: true,
            ..RunArgs::default()
        };
        let config = renderer_config(&args, LavaConfig::default());
        assert_eq!(config.policy, RenderPolicy::Still);
    }

    #[test]
    fn unsupported_environment_is_not_a_failure() {
        let unsupported: Result<()> =
            Err(SetupError::Unsupported("no event loop: no display".into()).into());
        assert!(settle(unsupported, false).is_ok());

        let build: Result<()> = Err(SetupError::ProgramBuild {
            program: "field",
            message: "bad".into(),
        }
        .into());
        assert!(settle(build, false).is_ok());
    }

    #[test]
    fn export_and_other_errors_still_fail() {
        let unsupported: Result<()> = Err(SetupError::Unsupported("no adapter".into()).into());
        assert!(settle(unsupported, true).is_err());
        assert!(settle(Err(anyhow::anyhow!("disk full")), false).is_err());
    }

    #[test]
    fn still_export_takes_precedence() {
        let args = RunArgs {
            reduced_motion: true,
            seed: Some(3),
            still_export: Some(PathBuf::from("lamp.png")),
            still_time: Some(4.5),
            ..RunArgs::default()
        };
        let config = renderer_config(&args, LavaConfig::default());
        assert_eq!(config.seed, 3);
        assert_eq!(config.surface_size, DEFAULT_SURFACE_SIZE);
        assert_eq!(
            config.policy,
            RenderPolicy::Export {
                time: 4.5,
                path: PathBuf::from("lamp.png")
            }
        );
    }
}
