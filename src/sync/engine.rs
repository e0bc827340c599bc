//! The UI-facing side of the synchronization engine.
//!
//! A [SyncEngine] owns the state of every supported [Parameter] and two
//! long-lived background tasks: the write worker, which drains the
//! [PendingWriteQueue] one write at a time, and the poller, which
//! periodically re-reads the device so that changes made by other programs
//! show up. All the methods a presentation shell calls on every gesture or
//! render tick are synchronous and never wait for the device.

use super::{
    poller, worker, EngineConfig, Parameter, ParameterState, PendingWriteQueue, SyncError, Value,
};
use crate::external::display::{ColorPreset, ControllerKind, DisplayController};
use anyhow::Result;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::{
    runtime,
    sync::{watch, Notify},
    task::JoinHandle,
};

/// Direction of a single scroll-wheel step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

/// A consistent view of all values, meant for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub brightness: u8,
    /// `None` when the controller doesn't support contrast
    pub contrast: Option<u8>,
    /// `None` when the controller doesn't support color presets
    pub color_preset: Option<String>,
    pub paused: bool,
}

/// Everything guarded by the engine's lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) parameters: BTreeMap<Parameter, ParameterState>,
    pub(crate) queue: PendingWriteQueue,
    pub(crate) paused: bool,
    /// Latest scroll-wheel brightness waiting to be written outside of the
    /// queue
    pub(crate) scroll_target: Option<Value>,
    /// Whether a task is currently draining `scroll_target`
    pub(crate) scroll_writer_running: bool,
}

impl EngineState {
    fn new(kind: ControllerKind, paused: bool) -> EngineState {
        let parameters = supported_parameters(kind)
            .iter()
            .map(|parameter| (*parameter, ParameterState::new(*parameter)))
            .collect();
        EngineState {
            parameters,
            queue: PendingWriteQueue::new(),
            paused,
            scroll_target: None,
            scroll_writer_running: false,
        }
    }

    fn is_settled(&self) -> bool {
        !self.scroll_writer_running
            && self.parameters.values().all(|p| p.in_flight.is_none())
            && (self.paused || self.queue.is_empty())
    }
}

/// State shared between the engine handle and its background tasks.
pub(crate) struct Shared {
    pub(crate) controller: Arc<dyn DisplayController>,
    pub(crate) kind: ControllerKind,
    pub(crate) presets: Vec<ColorPreset>,
    state: Mutex<EngineState>,
    /// Signalled whenever there may be new work for the write worker
    pub(crate) work_available: Notify,
    /// Signalled whenever a write finishes or the engine gets paused
    pub(crate) settled: Notify,
    /// Held for the duration of every device write
    pub(crate) write_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        // A panic while holding the lock can't leave the state torn, every
        // critical section only assigns plain values.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn supported_parameters(&self) -> &'static [Parameter] {
        supported_parameters(self.kind)
    }
}

fn supported_parameters(kind: ControllerKind) -> &'static [Parameter] {
    match kind {
        ControllerKind::Simple => &[Parameter::Brightness],
        ControllerKind::Extended => &Parameter::ALL,
    }
}

/// Keeps the display parameters shown by a UI in sync with the device.
///
/// Change requests are coalesced per parameter, so that a slider being
/// dragged results in device writes only as fast as the device can take
/// them, each carrying the latest value. While a parameter is being edited,
/// device readings don't overwrite it.
///
/// The engine must be started from within a Tokio runtime, its synchronous
/// methods can then be called from any thread.
pub struct SyncEngine {
    shared: Arc<Shared>,
    step_size: u8,
    runtime: runtime::Handle,
    shutdown_sender: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Fetches the available color presets and the current values from the
    /// device, then spawns the poll and write tasks.
    pub async fn start(
        controller: Arc<dyn DisplayController>,
        config: EngineConfig,
    ) -> Result<SyncEngine> {
        let kind = controller.kind();
        let presets = if kind == ControllerKind::Extended {
            match controller.list_color_presets().await {
                Ok(presets) => presets,
                Err(e) => {
                    log::warn!("Couldn't list color presets: {:#}", e);
                    vec![]
                }
            }
        } else {
            vec![]
        };
        log::debug!("Controller is {:?}, {} color presets", kind, presets.len());

        let shared = Arc::new(Shared {
            controller,
            kind,
            presets,
            state: Mutex::new(EngineState::new(kind, config.start_paused)),
            work_available: Notify::new(),
            settled: Notify::new(),
            write_lock: tokio::sync::Mutex::new(()),
        });

        // The initial values are read even when starting paused, otherwise
        // there would be nothing sensible to show.
        poller::poll_once(&shared, true).await;

        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(worker::run(shared.clone(), shutdown_receiver.clone())),
            tokio::spawn(poller::run(
                shared.clone(),
                config.poll_interval,
                shutdown_receiver,
            )),
        ];
        log::info!("Synchronization engine started");
        Ok(SyncEngine {
            shared,
            step_size: config.step_size,
            runtime: runtime::Handle::current(),
            shutdown_sender,
            tasks,
        })
    }

    pub fn kind(&self) -> ControllerKind {
        self.shared.kind
    }

    pub fn supports(&self, parameter: Parameter) -> bool {
        self.shared.supported_parameters().contains(&parameter)
    }

    /// Color presets offered by the display, in the order it lists them.
    pub fn color_presets(&self) -> &[ColorPreset] {
        &self.shared.presets
    }

    /// Request a new value, typically on every slider movement.
    ///
    /// Levels are clamped to `0..=100`. Invalid or unsupported requests are
    /// logged and ignored.
    pub fn request_change(&self, parameter: Parameter, value: impl Into<Value>) {
        if let Err(e) = self.stage_change(parameter, value.into()) {
            log::warn!("Ignoring change request: {}", e);
        }
    }

    fn stage_change(&self, parameter: Parameter, value: Value) -> Result<(), SyncError> {
        if !value.fits(parameter) {
            return Err(SyncError::InvalidValue { parameter, value });
        }
        if let Value::Preset(code) = &value {
            if !self.shared.presets.is_empty()
                && !self.shared.presets.iter().any(|preset| &preset.code == code)
            {
                return Err(SyncError::UnknownPreset(code.clone()));
            }
        }
        let mut state = self.shared.lock();
        let paused = state.paused;
        if parameter == Parameter::Brightness {
            state.scroll_target = None;
        }
        let entry = state
            .parameters
            .get_mut(&parameter)
            .ok_or(SyncError::Unsupported(parameter))?;
        entry.touch();
        if paused {
            log::trace!("Paused, keeping {} = {} locally", parameter, value);
            entry.current = value;
            entry.pending = None;
            return Ok(());
        }
        entry.pending = Some(value.clone());
        entry.editing = true;
        state.queue.enqueue(parameter, value);
        drop(state);
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Make sure the last requested value gets written once the user lets go
    /// of the control. Does nothing if it's already queued or being written.
    pub fn commit_on_release(&self, parameter: Parameter) {
        let mut state = self.shared.lock();
        if state.paused || state.queue.contains(parameter) {
            return;
        }
        let staged = match state.parameters.get(&parameter) {
            Some(entry) => match &entry.pending {
                Some(value) if entry.in_flight.as_ref() != Some(value) => value.clone(),
                _ => return,
            },
            None => return,
        };
        log::debug!("Committing {} = {} on release", parameter, staged);
        state.queue.enqueue(parameter, staged);
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// The latest locally known value, `None` if the parameter is not
    /// supported.
    pub fn current_value(&self, parameter: Parameter) -> Option<Value> {
        self.shared
            .lock()
            .parameters
            .get(&parameter)
            .map(|entry| entry.visible().clone())
    }

    /// Whether the user's value for the parameter hasn't reached the device
    /// yet.
    pub fn is_editing(&self, parameter: Parameter) -> bool {
        self.shared
            .lock()
            .parameters
            .get(&parameter)
            .map_or(false, |entry| entry.editing)
    }

    /// Read all values at once. Has no side effects, suitable for calling on
    /// every render tick.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        let level = |parameter: Parameter| {
            state
                .parameters
                .get(&parameter)
                .and_then(|entry| entry.visible().as_level())
        };
        Snapshot {
            brightness: level(Parameter::Brightness).unwrap_or(0),
            contrast: level(Parameter::Contrast),
            color_preset: state
                .parameters
                .get(&Parameter::ColorPreset)
                .and_then(|entry| entry.visible().as_preset().map(str::to_owned)),
            paused: state.paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// While paused, neither reads nor writes reach the device and requested
    /// values are only kept locally. Resuming queues a write of every
    /// parameter's local value.
    pub fn set_paused(&self, paused: bool) {
        let mut guard = self.shared.lock();
        if guard.paused == paused {
            return;
        }
        guard.paused = paused;
        if paused {
            log::info!("Device access paused");
            drop(guard);
            self.shared.settled.notify_waiters();
            return;
        }
        log::info!("Device access resumed, flushing local values");
        let state = &mut *guard;
        state.scroll_target = None;
        for (parameter, entry) in state.parameters.iter_mut() {
            let value = entry.visible().clone();
            if value.as_preset() == Some("") {
                log::debug!("No known {}, not flushing it", parameter);
                continue;
            }
            entry.touch();
            entry.pending = Some(value.clone());
            entry.editing = true;
            state.queue.enqueue(*parameter, value);
        }
        drop(guard);
        self.shared.work_available.notify_one();
    }

    /// Move the brightness by one configured step, as on a scroll-wheel
    /// event.
    ///
    /// On fast controllers the write is sent right away in a background
    /// task, without marking the brightness as edited. Steps arriving while
    /// that write runs replace each other, only the latest one is written
    /// next. Slow controllers, or a brightness which is already being edited,
    /// go through the queue like any other change.
    pub fn step(&self, direction: StepDirection) {
        if self.step_size == 0 {
            return;
        }
        let mut state = self.shared.lock();
        let paused = state.paused;
        let entry = match state.parameters.get_mut(&Parameter::Brightness) {
            Some(entry) => entry,
            None => return,
        };
        let current = entry.visible().as_level().unwrap_or(0) as i32;
        let target = match direction {
            StepDirection::Up => Value::level(current + self.step_size as i32),
            StepDirection::Down => Value::level(current - self.step_size as i32),
        };
        if !paused && (self.shared.kind == ControllerKind::Extended || entry.editing) {
            drop(state);
            self.request_change(Parameter::Brightness, target);
            return;
        }
        entry.touch();
        entry.current = target.clone();
        // A value staged before pausing must not hide or overwrite the step
        entry.pending = None;
        if paused {
            return;
        }
        state.scroll_target = Some(target);
        if state.scroll_writer_running {
            return;
        }
        state.scroll_writer_running = true;
        drop(state);
        self.runtime.spawn(worker::write_scroll_steps(self.shared.clone()));
    }

    /// Re-read the device right away instead of waiting for the next poll.
    pub async fn refresh(&self) {
        poller::poll_once(&self.shared, false).await;
    }

    /// Wait until every requested value has been written, or the engine is
    /// paused and nothing is being written.
    pub async fn settled(&self) {
        loop {
            let notified = self.shared.settled.notified();
            if self.shared.lock().is_settled() {
                return;
            }
            notified.await;
        }
    }

    /// Stop the background tasks, letting a write that's already running
    /// finish. Writes still waiting in the queue are dropped.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_sender.send(true);
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                log::error!("Engine task failed: {}", e);
            }
        }
        log::info!("Synchronization engine stopped");
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        let _ = self.shutdown_sender.send(true);
    }
}
