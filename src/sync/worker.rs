//! The task draining the [super::PendingWriteQueue].

use super::{engine::Shared, Parameter, SyncError, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// A write taken off the queue, together with the parameter's revision at
/// the time it was taken.
struct Job {
    parameter: Parameter,
    value: Value,
    revision: u64,
}

pub(crate) async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    log::debug!("Write worker started");
    loop {
        match take_next(&shared) {
            Some(job) => execute(&shared, job).await,
            None => {
                shared.settled.notify_waiters();
                tokio::select! {
                    _ = shared.work_available.notified() => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            log::debug!("Write worker stopping");
            return;
        }
    }
}

fn take_next(shared: &Shared) -> Option<Job> {
    let mut state = shared.lock();
    if state.paused {
        return None;
    }
    let (parameter, value) = state.queue.dequeue_oldest()?;
    let entry = state.parameters.get_mut(&parameter)?;
    entry.in_flight = Some(value.clone());
    Some(Job {
        parameter,
        value,
        revision: entry.revision,
    })
}

async fn execute(shared: &Shared, job: Job) {
    log::debug!("Writing {} = {}", job.parameter, job.value);
    let result = write(shared, job.parameter, &job.value).await;

    let mut state = shared.lock();
    let still_queued = state.queue.contains(job.parameter);
    if let Some(entry) = state.parameters.get_mut(&job.parameter) {
        entry.in_flight = None;
        match &result {
            Ok(()) => {
                // A value the user set locally while paused wins over an
                // older write finishing late.
                if entry.revision == job.revision || entry.pending.is_some() {
                    entry.current = job.value.clone();
                }
            }
            Err(e) => log::error!("{}", e),
        }
        if !still_queued {
            entry.pending = None;
            entry.editing = false;
        }
        entry.touch();
    }
    drop(state);
    shared.settled.notify_waiters();
}

/// Send a single value to the device, with no other write running at the
/// same time.
pub(crate) async fn write(
    shared: &Shared,
    parameter: Parameter,
    value: &Value,
) -> Result<(), SyncError> {
    let _guard = shared.write_lock.lock().await;
    write_locked(shared, parameter, value).await
}

/// Like [write], the caller must already hold the write lock.
async fn write_locked(
    shared: &Shared,
    parameter: Parameter,
    value: &Value,
) -> Result<(), SyncError> {
    let controller = &shared.controller;
    let result = match (parameter, value) {
        (Parameter::Brightness, Value::Level(level)) => controller.set_brightness(*level).await,
        (Parameter::Contrast, Value::Level(level)) => controller.set_contrast(*level).await,
        (Parameter::ColorPreset, Value::Preset(code)) => controller.set_color_preset(code).await,
        _ => {
            return Err(SyncError::InvalidValue {
                parameter,
                value: value.clone(),
            })
        }
    };
    result.map_err(|cause| SyncError::DeviceWrite {
        parameter,
        value: value.clone(),
        cause,
    })
}

/// Write scroll-wheel steps outside of the queue until no newer step is
/// waiting or the engine gets paused.
///
/// The write lock is taken before the value, so a step never overtakes a
/// queued write that was requested after it, nor the other way around.
pub(crate) async fn write_scroll_steps(shared: Arc<Shared>) {
    loop {
        let _guard = shared.write_lock.lock().await;
        let value = {
            let mut state = shared.lock();
            match state.scroll_target.take() {
                Some(value) if !state.paused => value,
                _ => {
                    state.scroll_writer_running = false;
                    break;
                }
            }
        };
        log::debug!("Writing {} = {} directly", Parameter::Brightness, value);
        if let Err(e) = write_locked(&shared, Parameter::Brightness, &value).await {
            log::error!("{}", e);
        }
    }
    shared.settled.notify_waiters();
}
