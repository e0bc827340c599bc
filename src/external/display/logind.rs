use super::{ControllerKind, DisplayController};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use logind_zbus::session::SessionProxy;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

const BACKLIGHT_CLASS_PATH: &str = "/sys/class/backlight";

/// logind resolves this path to the session of the calling process.
const OWN_SESSION_PATH: &str = "/org/freedesktop/login1/session/auto";

/// A [DisplayController] which uses the kernel's /sys/class/backlight device
/// class to control the display brightness.
///
/// The brightness is read directly from the filesystem but writing is mediated
/// via logind Session's SetBrightness method, to allow root-less brightness
/// setting.
#[derive(Debug, Clone)]
pub struct LogindBrightnessController {
    device: String,
    device_path: String,
    max_brightness: usize,
    proxy: SessionProxy<'static>,
}

impl LogindBrightnessController {
    /// Create a new controller which will set the brightness on the device
    /// under /sys/class/backlight/{device}.
    ///
    /// If the device name is empty, the first device in the class is used.
    pub async fn new(device: &str, connection: zbus::Connection) -> Result<Self> {
        let device = if device.is_empty() {
            first_backlight_device().await?
        } else {
            device.to_string()
        };
        let proxy = SessionProxy::builder(&connection)
            .path(OWN_SESSION_PATH)?
            .build()
            .await?;

        let device_path = format!("{}/{}", BACKLIGHT_CLASS_PATH, device);
        let max_brightness =
            read_number_from_file(format!("{}/{}", device_path, "max_brightness"))
                .await
                .with_context(|| format!("Couldn't read maximum brightness of {}", device))?;
        if max_brightness == 0 {
            bail!("Backlight device {} reports zero maximum brightness", device);
        }
        log::debug!(
            "Using backlight device {} with maximum brightness {}",
            device,
            max_brightness
        );
        Ok(LogindBrightnessController {
            device,
            device_path,
            max_brightness,
            proxy,
        })
    }
}

#[async_trait]
impl DisplayController for LogindBrightnessController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Simple
    }

    async fn get_brightness(&self) -> Result<i32> {
        let raw_brightness =
            read_number_from_file(&format!("{}/{}", self.device_path, "brightness")).await?;
        Ok(((raw_brightness as f64 / self.max_brightness as f64) * 100.0).round() as i32)
    }

    async fn set_brightness(&self, percentage: u8) -> Result<()> {
        if percentage > 100 {
            return Err(anyhow!("Cannot set brightness higher than 100%"));
        }
        let resulting_brightness =
            (self.max_brightness as f64 * (percentage as f64 / 100.0)).round() as u32;
        Ok(self
            .proxy
            .set_brightness("backlight", &self.device, resulting_brightness)
            .await?)
    }
}

async fn first_backlight_device() -> Result<String> {
    let mut entries = fs::read_dir(BACKLIGHT_CLASS_PATH)
        .await
        .context("Couldn't list backlight devices")?;
    let mut names = vec![];
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No backlight device found in {}", BACKLIGHT_CLASS_PATH))
}

async fn read_number_from_file(path: impl AsRef<Path>) -> Result<usize> {
    let mut f = fs::File::open(path).await?;
    let mut contents = String::new();
    f.read_to_string(&mut contents).await?;
    Ok(contents.trim().parse()?)
}
