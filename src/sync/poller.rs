//! Periodic re-reading of the device state.

use super::{
    engine::{EngineState, Shared},
    Parameter, SyncError, Value,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};

pub(crate) async fn run(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    log::debug!("Poller started, interval {:?}", interval);
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires right away, the engine has just read everything.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => poll_once(&shared, false).await,
            _ = shutdown.changed() => {
                log::debug!("Poller stopping");
                return;
            }
        }
    }
}

/// Read every supported parameter from the device and publish the values
/// which are valid and not overridden by the user.
///
/// Nothing is read while the engine is paused, unless `force` is set.
pub(crate) async fn poll_once(shared: &Shared, force: bool) {
    for parameter in shared.supported_parameters() {
        let revision = {
            let state = shared.lock();
            if state.paused && !force {
                log::trace!("Paused, not polling");
                return;
            }
            match state.parameters.get(parameter) {
                Some(entry) if entry.editing => {
                    log::trace!("{} is being edited, not polling it", parameter);
                    continue;
                }
                Some(_) if is_scrolling(&state, *parameter) => {
                    log::trace!("{} is being scrolled, not polling it", parameter);
                    continue;
                }
                Some(entry) => entry.revision,
                None => continue,
            }
        };

        let value = match read(shared, *parameter).await {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Discarding reading: {}", e);
                continue;
            }
        };

        let mut state = shared.lock();
        let paused = state.paused;
        let scrolling = is_scrolling(&state, *parameter);
        if let Some(entry) = state.parameters.get_mut(parameter) {
            if entry.editing || scrolling || entry.revision != revision || (paused && !force) {
                log::trace!("{} changed locally while reading, discarding", parameter);
                continue;
            }
            if entry.current != value {
                log::debug!("{} changed on the device to {}", parameter, value);
                entry.current = value;
            }
        }
    }
}

fn is_scrolling(state: &EngineState, parameter: Parameter) -> bool {
    parameter == Parameter::Brightness && state.scroll_writer_running
}

/// Read one parameter, rejecting values outside of its domain.
async fn read(shared: &Shared, parameter: Parameter) -> Result<Value, SyncError> {
    let controller = &shared.controller;
    let level = |result: anyhow::Result<i32>| match result {
        Ok(raw) if (0..=100).contains(&raw) => Ok(Value::Level(raw as u8)),
        Ok(raw) => Err(SyncError::InvalidReading {
            parameter,
            raw: raw.to_string(),
        }),
        Err(cause) => Err(SyncError::DeviceRead { parameter, cause }),
    };
    match parameter {
        Parameter::Brightness => level(controller.get_brightness().await),
        Parameter::Contrast => level(controller.get_contrast().await),
        Parameter::ColorPreset => match controller.get_color_preset().await {
            Ok(code) if !code.trim().is_empty() => Ok(Value::Preset(code.trim().to_owned())),
            Ok(code) => Err(SyncError::InvalidReading {
                parameter,
                raw: code,
            }),
            Err(cause) => Err(SyncError::DeviceRead { parameter, cause }),
        },
    }
}
