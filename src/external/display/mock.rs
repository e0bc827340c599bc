use std::{
    mem::{self, Discriminant},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;

use super::{ColorPreset, ControllerKind, DisplayController};

/// A call made to a [MockDisplayController], recorded in the order the calls
/// were started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetBrightness,
    SetBrightness(u8),
    GetContrast,
    SetContrast(u8),
    GetColorPreset,
    SetColorPreset(String),
    ListColorPresets,
}

impl MockCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            MockCall::SetBrightness(_) | MockCall::SetContrast(_) | MockCall::SetColorPreset(_)
        )
    }
}

#[derive(Debug)]
struct MockState {
    brightness: i32,
    contrast: i32,
    color_preset: String,
    presets: Vec<ColorPreset>,
    fail_reads: bool,
    fail_writes: bool,
    failing_calls: Vec<Discriminant<MockCall>>,
    latency: Duration,
    calls: Vec<MockCall>,
    concurrent_writes: usize,
    max_concurrent_writes: usize,
}

/// A mock [DisplayController], usable when testing the engine and shells
/// built on top of the trait.
///
/// Readings are stored as raw values, so tests can make the controller
/// report out of range brightness or an empty preset code.
#[derive(Debug, Clone)]
pub struct MockDisplayController {
    kind: ControllerKind,
    state: Arc<Mutex<MockState>>,
}

impl MockDisplayController {
    /// Create a new brightness-only controller, with the specified initial
    /// brightness
    pub fn new(initial_brightness: i32) -> MockDisplayController {
        MockDisplayController::with_kind(ControllerKind::Simple, initial_brightness)
    }

    /// Create a new controller which also supports contrast and color
    /// presets. Two presets, `05` and `08`, are available.
    pub fn extended(initial_brightness: i32, initial_contrast: i32) -> MockDisplayController {
        let controller =
            MockDisplayController::with_kind(ControllerKind::Extended, initial_brightness);
        {
            let mut state = controller.lock();
            state.contrast = initial_contrast;
            state.color_preset = "05".to_owned();
            state.presets = vec![
                ColorPreset::new("05", "6500 K"),
                ColorPreset::new("08", "9300 K"),
            ];
        }
        controller
    }

    fn with_kind(kind: ControllerKind, initial_brightness: i32) -> MockDisplayController {
        MockDisplayController {
            kind,
            state: Arc::new(Mutex::new(MockState {
                brightness: initial_brightness,
                contrast: 0,
                color_preset: String::new(),
                presets: vec![],
                fail_reads: false,
                fail_writes: false,
                failing_calls: vec![],
                latency: Duration::ZERO,
                calls: vec![],
                concurrent_writes: 0,
                max_concurrent_writes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Set whether reads from this controller should return an error or not
    pub fn set_read_failure_mode(&self, should_fail: bool) {
        self.lock().fail_reads = should_fail;
    }

    /// Set whether writes to this controller should return an error or not
    pub fn set_write_failure_mode(&self, should_fail: bool) {
        self.lock().fail_writes = should_fail;
    }

    /// Make only one kind of call fail, e.g. every `SetContrast` no matter
    /// the value. The argument's payload is ignored.
    pub fn set_call_failure_mode(&self, call: MockCall, should_fail: bool) {
        let kind = mem::discriminant(&call);
        let mut state = self.lock();
        state.failing_calls.retain(|failing| *failing != kind);
        if should_fail {
            state.failing_calls.push(kind);
        }
    }

    /// Delay every call by the given duration, simulating a slow device
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Change the device state behind the engine's back, as another program
    /// would.
    pub fn set_device_brightness(&self, raw: i32) {
        self.lock().brightness = raw;
    }

    pub fn set_device_contrast(&self, raw: i32) {
        self.lock().contrast = raw;
    }

    pub fn set_device_color_preset(&self, code: &str) {
        self.lock().color_preset = code.to_owned();
    }

    pub fn device_brightness(&self) -> i32 {
        self.lock().brightness
    }

    pub fn device_contrast(&self) -> i32 {
        self.lock().contrast
    }

    pub fn device_color_preset(&self) -> String {
        self.lock().color_preset.clone()
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Only the calls which would have changed the device
    pub fn writes(&self) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// The highest number of writes that were executing at the same time
    pub fn max_concurrent_writes(&self) -> usize {
        self.lock().max_concurrent_writes
    }

    async fn read<T>(&self, call: MockCall, read: impl FnOnce(&MockState) -> T) -> Result<T> {
        let kind = mem::discriminant(&call);
        let latency = {
            let mut state = self.lock();
            state.calls.push(call);
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let state = self.lock();
        if state.fail_reads || state.failing_calls.contains(&kind) {
            Err(anyhow::anyhow!("Mock DisplayController is failing"))
        } else {
            Ok(read(&state))
        }
    }

    async fn write(&self, call: MockCall, write: impl FnOnce(&mut MockState)) -> Result<()> {
        let kind = mem::discriminant(&call);
        let latency = {
            let mut state = self.lock();
            state.calls.push(call);
            state.concurrent_writes += 1;
            state.max_concurrent_writes = state.max_concurrent_writes.max(state.concurrent_writes);
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        state.concurrent_writes -= 1;
        if state.fail_writes || state.failing_calls.contains(&kind) {
            return Err(anyhow::anyhow!("Mock DisplayController is failing"));
        }
        write(&mut state);
        Ok(())
    }
}

#[async_trait]
impl DisplayController for MockDisplayController {
    fn kind(&self) -> ControllerKind {
        self.kind
    }

    async fn get_brightness(&self) -> Result<i32> {
        self.read(MockCall::GetBrightness, |s| s.brightness).await
    }

    async fn set_brightness(&self, percentage: u8) -> Result<()> {
        if percentage > 100 {
            return Err(anyhow::anyhow!("Cannot set brightness higher than 100%"));
        }
        self.write(MockCall::SetBrightness(percentage), |s| {
            s.brightness = percentage as i32
        })
        .await
    }

    async fn get_contrast(&self) -> Result<i32> {
        self.ensure_extended()?;
        self.read(MockCall::GetContrast, |s| s.contrast).await
    }

    async fn set_contrast(&self, percentage: u8) -> Result<()> {
        self.ensure_extended()?;
        self.write(MockCall::SetContrast(percentage), |s| {
            s.contrast = percentage as i32
        })
        .await
    }

    async fn get_color_preset(&self) -> Result<String> {
        self.ensure_extended()?;
        self.read(MockCall::GetColorPreset, |s| s.color_preset.clone())
            .await
    }

    async fn set_color_preset(&self, code: &str) -> Result<()> {
        self.ensure_extended()?;
        let code = code.to_owned();
        self.write(MockCall::SetColorPreset(code.clone()), move |s| {
            s.color_preset = code
        })
        .await
    }

    async fn list_color_presets(&self) -> Result<Vec<ColorPreset>> {
        self.read(MockCall::ListColorPresets, |s| s.presets.clone())
            .await
    }
}

impl MockDisplayController {
    fn ensure_extended(&self) -> Result<()> {
        if self.kind == ControllerKind::Extended {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Mock controller only supports brightness"))
        }
    }
}
