use super::display::{
    command::{BrightnessctlController, LightController},
    ddcutil::DdcutilController,
    logind::LogindBrightnessController,
    DisplayController,
};
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::{fmt, str::FromStr, sync::Arc};

/// The mechanism used to talk to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Light,
    Brightnessctl,
    Logind,
    Ddcutil,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Light
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(Backend::Light),
            "brightnessctl" => Ok(Backend::Brightnessctl),
            "logind" => Ok(Backend::Logind),
            "ddcutil" => Ok(Backend::Ddcutil),
            _ => Err(anyhow::anyhow!(
                "Unknown backend {}, expected one of light, brightnessctl, logind, ddcutil",
                s
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Light => "light",
            Backend::Brightnessctl => "brightnessctl",
            Backend::Logind => "logind",
            Backend::Ddcutil => "ddcutil",
        };
        f.write_str(name)
    }
}

/// Builds the [DisplayController] for the configured backend and device.
///
/// The logind backend needs a connection to the system D-Bus, which is only
/// created when that backend is selected.
pub async fn make_controller(backend: Backend, device: &str) -> Result<Arc<dyn DisplayController>> {
    info!("Using {} backend, device {:?}", backend, device);
    let controller: Arc<dyn DisplayController> = match backend {
        Backend::Light => Arc::new(LightController::new(device)),
        Backend::Brightnessctl => Arc::new(BrightnessctlController::new(device)),
        Backend::Logind => {
            info!("Creating a new connection to the system bus");
            let connection = zbus::Connection::system()
                .await
                .context("Couldn't connect to the system bus")?;
            Arc::new(LogindBrightnessController::new(device, connection).await?)
        }
        Backend::Ddcutil => Arc::new(DdcutilController::new(device)?),
    };
    Ok(controller)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::external::display::ControllerKind;

    #[test]
    fn test_backend_names() {
        for backend in [
            Backend::Light,
            Backend::Brightnessctl,
            Backend::Logind,
            Backend::Ddcutil,
        ] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
        assert!("xrandr".parse::<Backend>().is_err());
    }

    #[tokio::test]
    async fn test_command_backends_are_built_without_io() {
        let light = make_controller(Backend::Light, "").await.unwrap();
        assert_eq!(light.kind(), ControllerKind::Simple);
        let ddcutil = make_controller(Backend::Ddcutil, "display:2").await.unwrap();
        assert_eq!(ddcutil.kind(), ControllerKind::Extended);
        assert!(make_controller(Backend::Ddcutil, "DP-1").await.is_err());
    }

    #[tokio::test]
    async fn test_logind_backend_fails_on_missing_device() {
        // Fails either on the bus connection or on the missing sysfs entry
        let result = make_controller(Backend::Logind, "brightsync-no-such-device").await;
        assert!(result.is_err());
    }
}
