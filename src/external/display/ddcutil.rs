use super::{command::run_command, ColorPreset, ControllerKind, DisplayController};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

const VCP_BRIGHTNESS: &str = "10";
const VCP_CONTRAST: &str = "12";
const VCP_COLOR_PRESET: &str = "14";

/// A [DisplayController] talking to external monitors over DDC/CI by means of
/// the `ddcutil` program.
///
/// Every call takes in the order of hundreds of milliseconds, so the
/// controller reports itself as [ControllerKind::Extended].
///
/// The device string selects the monitor: a plain number is an I2C bus
/// number, `display:<n>` is ddcutil's display number and an empty string
/// leaves the choice to ddcutil.
#[derive(Debug, Clone)]
pub struct DdcutilController {
    device_args: Vec<String>,
}

impl DdcutilController {
    pub fn new(device: &str) -> Result<DdcutilController> {
        let device = device.trim();
        let device_args = if device.is_empty() {
            vec![]
        } else if let Some(display) = device.strip_prefix("display:") {
            display.parse::<u32>().map_err(|_| {
                anyhow!("Invalid ddcutil display number {:?}", display)
            })?;
            vec![format!("--display={}", display)]
        } else if device.parse::<u32>().is_ok() {
            vec![format!("--bus={}", device)]
        } else {
            bail!(
                "ddcutil device must be a bus number or display:<number>, got {:?}",
                device
            );
        };
        Ok(DdcutilController { device_args })
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        rest.iter()
            .map(|s| s.to_string())
            .chain(self.device_args.iter().cloned())
            .collect()
    }

    async fn get_vcp(&self, code: &str) -> Result<String> {
        run_command("ddcutil", &self.args(&["getvcp", code, "--brief"])).await
    }

    async fn set_vcp(&self, code: &str, value: &str) -> Result<()> {
        run_command("ddcutil", &self.args(&["setvcp", code, value])).await?;
        Ok(())
    }
}

#[async_trait]
impl DisplayController for DdcutilController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Extended
    }

    async fn get_brightness(&self) -> Result<i32> {
        parse_continuous_vcp(&self.get_vcp(VCP_BRIGHTNESS).await?)
    }

    async fn set_brightness(&self, percentage: u8) -> Result<()> {
        self.set_vcp(VCP_BRIGHTNESS, &percentage.to_string()).await
    }

    async fn get_contrast(&self) -> Result<i32> {
        parse_continuous_vcp(&self.get_vcp(VCP_CONTRAST).await?)
    }

    async fn set_contrast(&self, percentage: u8) -> Result<()> {
        self.set_vcp(VCP_CONTRAST, &percentage.to_string()).await
    }

    async fn get_color_preset(&self) -> Result<String> {
        parse_non_continuous_vcp(&self.get_vcp(VCP_COLOR_PRESET).await?)
    }

    async fn set_color_preset(&self, code: &str) -> Result<()> {
        self.set_vcp(VCP_COLOR_PRESET, &format!("x{}", normalize_code(code)))
            .await
    }

    async fn list_color_presets(&self) -> Result<Vec<ColorPreset>> {
        let output = run_command("ddcutil", &self.args(&["capabilities"])).await?;
        Ok(parse_color_presets(&output))
    }
}

/// Parses the current value out of `VCP 10 C 50 100`.
///
/// ddcutil answers `VCP 10 ERR` when the monitor doesn't respond, which is
/// returned as -1 so that it gets discarded like any other invalid reading.
pub(crate) fn parse_continuous_vcp(output: &str) -> Result<i32> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    match fields.as_slice() {
        ["VCP", _, "C", current, _max] => Ok(current.parse()?),
        ["VCP", _, "ERR", ..] => Ok(-1),
        _ => Err(anyhow!("Unexpected output from ddcutil: {:?}", output.trim())),
    }
}

/// Parses the preset code out of `VCP 14 SNC x05`. An unreadable value gives
/// an empty code.
pub(crate) fn parse_non_continuous_vcp(output: &str) -> Result<String> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    match fields.as_slice() {
        ["VCP", _, "SNC", value, ..] => Ok(normalize_code(value)),
        ["VCP", _, "ERR", ..] => Ok(String::new()),
        _ => Err(anyhow!("Unexpected output from ddcutil: {:?}", output.trim())),
    }
}

/// Preset codes show up as `x05`, `0x05` or `05` depending on the command,
/// they're stored as lowercase hex without a prefix.
pub fn normalize_code(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase();
    let stripped = code
        .strip_prefix("0x")
        .or_else(|| code.strip_prefix('x'))
        .unwrap_or(&code);
    stripped.to_owned()
}

/// Extracts the values of feature 14 from `ddcutil capabilities` output:
///
/// ```text
///    Feature: 14 (Select color preset)
///       Values:
///          05: 6500 K
///          0b: User 1
///    Feature: 16 (Video gain: Red)
/// ```
pub(crate) fn parse_color_presets(output: &str) -> Vec<ColorPreset> {
    let mut presets = vec![];
    let mut lines = output.lines().map(str::trim);
    if !lines.any(|line| line.starts_with(&format!("Feature: {}", VCP_COLOR_PRESET))) {
        return presets;
    }
    for line in lines {
        if line.starts_with("Feature:") {
            break;
        }
        if let Some(inline_values) = line.strip_prefix("Values:") {
            // Monitors without a known interpretation list the codes inline,
            // e.g. `Values: 05 08 0b (interpretation unavailable)`
            presets.extend(
                inline_values
                    .split_whitespace()
                    .take_while(|value| !value.starts_with('('))
                    .map(|value| ColorPreset::new(normalize_code(value), value)),
            );
            continue;
        }
        match line.split_once(':') {
            Some((code, name)) if is_hex_code(code.trim()) => {
                presets.push(ColorPreset::new(normalize_code(code), name.trim()));
            }
            _ => break,
        }
    }
    presets
}

fn is_hex_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 4 && code.chars().all(|c| c.is_ascii_hexdigit())
}
