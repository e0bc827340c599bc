use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Which family of display control a backend belongs to.
///
/// `Simple` backends only know about the backlight brightness and answer
/// quickly. `Extended` backends (monitors driven over DDC/CI) also control
/// contrast and color presets, but every call takes hundreds of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Simple,
    Extended,
}

/// A named color preset offered by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPreset {
    pub code: String,
    pub name: String,
}

impl ColorPreset {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> ColorPreset {
        ColorPreset {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A trait allowing to read and set display parameters.
///
/// Getters return raw readings. A backend which can't interpret the device's
/// answer may return an out of range value (such as -1) or an empty preset
/// code, the caller is responsible for validating them.
///
/// Only brightness is mandatory, the remaining methods fail by default and
/// are overridden by [ControllerKind::Extended] backends.
#[async_trait]
pub trait DisplayController: Send + Sync + 'static {
    fn kind(&self) -> ControllerKind;

    async fn get_brightness(&self) -> Result<i32>;
    async fn set_brightness(&self, percentage: u8) -> Result<()>;

    async fn get_contrast(&self) -> Result<i32> {
        Err(anyhow!("Contrast is not supported by this controller"))
    }

    async fn set_contrast(&self, _percentage: u8) -> Result<()> {
        Err(anyhow!("Contrast is not supported by this controller"))
    }

    async fn get_color_preset(&self) -> Result<String> {
        Err(anyhow!("Color presets are not supported by this controller"))
    }

    async fn set_color_preset(&self, _code: &str) -> Result<()> {
        Err(anyhow!("Color presets are not supported by this controller"))
    }

    async fn list_color_presets(&self) -> Result<Vec<ColorPreset>> {
        Ok(vec![])
    }
}
