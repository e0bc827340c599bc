//! A command line front end for the brightness synchronization engine

use anyhow::{bail, Result};
use brightsync::{
    config::Config,
    external::{
        dependency_provider::{make_controller, Backend},
        display::ddcutil::normalize_code,
    },
    sync::{Parameter, Snapshot, StepDirection, SyncEngine, Value},
};
use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use std::path::PathBuf;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Backend used to control the display (light, brightnessctl, logind, ddcutil)
    #[clap(short, long)]
    backend: Option<Backend>,

    /// Backlight device, or bus number / display:<n> for ddcutil
    #[clap(short, long)]
    device: Option<String>,

    /// Log more, can be repeated
    #[clap(short, long, parse(from_occurrences))]
    verbose: usize,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current value of a parameter, or of all of them
    Get { parameter: Option<Parameter> },
    /// Set a parameter. Levels are percentages, presets are codes as printed by `presets`
    Set { parameter: Parameter, value: String },
    /// Increase the brightness by one step
    Up,
    /// Decrease the brightness by one step
    Down,
    /// List the color presets offered by the display
    Presets,
    /// Keep printing the values whenever they change
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _logger = Logger::try_with_env_or_str(level)?.start()?;
    log_panics::init();

    let mut config = Config::load(args.config.as_deref()).await?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(device) = args.device {
        config.device = device;
    }

    let controller = make_controller(config.backend, &config.device).await?;
    let engine = SyncEngine::start(controller, config.engine_config()).await?;
    let result = run_command(&engine, &config, args.command).await;
    engine.shutdown().await;
    result
}

async fn run_command(engine: &SyncEngine, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Get { parameter: None } => print_snapshot(engine, &engine.snapshot()),
        Command::Get {
            parameter: Some(parameter),
        } => match engine.current_value(parameter) {
            Some(value) => println!("{}", value),
            None => bail!("{} is not supported by the {} backend", parameter, config.backend),
        },
        Command::Set { parameter, value } => {
            if !engine.supports(parameter) {
                bail!("{} is not supported by the {} backend", parameter, config.backend);
            }
            let value = parse_value(parameter, &value)?;
            if engine.is_paused() {
                log::warn!("Device access is paused, the value is only kept locally");
            }
            engine.request_change(parameter, value);
            engine.commit_on_release(parameter);
            engine.settled().await;
        }
        Command::Up => {
            engine.step(StepDirection::Up);
            engine.settled().await;
        }
        Command::Down => {
            engine.step(StepDirection::Down);
            engine.settled().await;
        }
        Command::Presets => {
            let current = engine.snapshot().color_preset;
            for preset in engine.color_presets() {
                let marker = if current.as_deref() == Some(&preset.code) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}\t{}", marker, preset.code, preset.name);
            }
        }
        Command::Watch => watch(engine, config).await?,
    }
    Ok(())
}

/// Accepts levels as `40` or `40%`, preset codes in any of the forms ddcutil
/// prints them in.
fn parse_value(parameter: Parameter, raw: &str) -> Result<Value> {
    let raw = raw.trim();
    if parameter.is_level() {
        Ok(Value::from(raw.trim_end_matches('%').parse::<i32>()?))
    } else {
        Ok(Value::from(normalize_code(raw)))
    }
}

/// Print the values on the render cadence whenever they change, until
/// interrupted.
async fn watch(engine: &SyncEngine, config: &Config) -> Result<()> {
    let mut ticker = time::interval(config.render_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_shown: Option<Snapshot> = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = engine.snapshot();
                if last_shown.as_ref() != Some(&snapshot) {
                    print_snapshot(engine, &snapshot);
                    last_shown = Some(snapshot);
                }
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                log::info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn print_snapshot(engine: &SyncEngine, snapshot: &Snapshot) {
    let mut line = format!("brightness {}%", snapshot.brightness);
    if let Some(contrast) = snapshot.contrast {
        line.push_str(&format!(" contrast {}%", contrast));
    }
    if let Some(code) = &snapshot.color_preset {
        let name = engine
            .color_presets()
            .iter()
            .find(|preset| &preset.code == code)
            .map_or(code.as_str(), |preset| preset.name.as_str());
        line.push_str(&format!(" preset {}", name));
    }
    if snapshot.paused {
        line.push_str(" (paused)");
    }
    println!("{}", line);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_value_parsing() {
        assert_eq!(
            parse_value(Parameter::Brightness, " 40% ").unwrap(),
            Value::Level(40)
        );
        assert_eq!(
            parse_value(Parameter::Contrast, "120").unwrap(),
            Value::Level(100)
        );
        assert!(parse_value(Parameter::Brightness, "bright").is_err());
        for code in ["x05", "0x05", "05", "X05"] {
            assert_eq!(
                parse_value(Parameter::ColorPreset, code).unwrap(),
                Value::Preset("05".to_owned())
            );
        }
    }
}
