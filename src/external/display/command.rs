//! Backends driving the backlight through external command line tools.

use super::{ControllerKind, DisplayController};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Run a program to completion and return its standard output.
///
/// A non-zero exit status is reported as an error carrying the program's
/// standard error output.
pub(crate) async fn run_command(program: &str, args: &[String]) -> Result<String> {
    log::trace!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Couldn't run {}", program))?;
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A [DisplayController] built on top of the `light` utility.
#[derive(Debug, Clone)]
pub struct LightController {
    device_args: Vec<String>,
}

impl LightController {
    /// Create a controller for the given backlight device, or for light's
    /// default device if the name is empty.
    pub fn new(device: &str) -> LightController {
        let device_args = if device.is_empty() {
            vec![]
        } else {
            vec!["-s".to_owned(), format!("sysfs/backlight/{}", device)]
        };
        LightController { device_args }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        self.device_args
            .iter()
            .cloned()
            .chain(rest.iter().map(|s| s.to_string()))
            .collect()
    }
}

#[async_trait]
impl DisplayController for LightController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Simple
    }

    async fn get_brightness(&self) -> Result<i32> {
        let output = run_command("light", &self.args(&["-G"])).await?;
        parse_light_output(&output)
    }

    async fn set_brightness(&self, percentage: u8) -> Result<()> {
        run_command("light", &self.args(&["-S", &percentage.to_string()])).await?;
        Ok(())
    }
}

/// `light -G` prints the brightness as a float percentage, e.g. `41.67`.
pub(crate) fn parse_light_output(output: &str) -> Result<i32> {
    let value: f64 = output
        .trim()
        .parse()
        .with_context(|| format!("Unexpected output from light: {:?}", output.trim()))?;
    Ok(value.round() as i32)
}

/// A [DisplayController] built on top of `brightnessctl`.
#[derive(Debug, Clone)]
pub struct BrightnessctlController {
    device_args: Vec<String>,
}

impl BrightnessctlController {
    pub fn new(device: &str) -> BrightnessctlController {
        let device_args = if device.is_empty() {
            vec![]
        } else {
            vec!["-d".to_owned(), device.to_owned()]
        };
        BrightnessctlController { device_args }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        self.device_args
            .iter()
            .cloned()
            .chain(rest.iter().map(|s| s.to_string()))
            .collect()
    }
}

#[async_trait]
impl DisplayController for BrightnessctlController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Simple
    }

    async fn get_brightness(&self) -> Result<i32> {
        let output = run_command("brightnessctl", &self.args(&["-m", "info"])).await?;
        parse_brightnessctl_output(&output)
    }

    async fn set_brightness(&self, percentage: u8) -> Result<()> {
        let value = format!("{}%", percentage);
        run_command("brightnessctl", &self.args(&["-q", "set", &value])).await?;
        Ok(())
    }
}

/// `brightnessctl -m info` prints one CSV line per device:
/// `intel_backlight,backlight,9600,50%,19200`.
pub(crate) fn parse_brightnessctl_output(output: &str) -> Result<i32> {
    let line = output
        .lines()
        .next()
        .ok_or_else(|| anyhow!("brightnessctl returned no output"))?;
    let percentage = line
        .split(',')
        .nth(3)
        .and_then(|field| field.trim().strip_suffix('%'))
        .ok_or_else(|| anyhow!("Unexpected output from brightnessctl: {:?}", line))?;
    Ok(percentage.parse()?)
}
