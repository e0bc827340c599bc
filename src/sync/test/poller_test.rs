use std::{sync::Arc, time::Duration};

use crate::{
    external::display::mock::{MockCall, MockDisplayController},
    sync::{EngineConfig, Parameter, SyncEngine, Value},
};

async fn start(controller: &MockDisplayController, poll_interval: Duration) -> SyncEngine {
    let engine = SyncEngine::start(
        Arc::new(controller.clone()),
        EngineConfig {
            poll_interval,
            step_size: 1,
            start_paused: false,
        },
    )
    .await
    .expect("Engine failed to start");
    controller.clear_calls();
    engine
}

#[tokio::test(start_paused = true)]
async fn test_external_changes_are_picked_up() {
    let controller = MockDisplayController::extended(30, 70);
    let engine = start(&controller, Duration::from_secs(1)).await;

    controller.set_device_brightness(77);
    controller.set_device_contrast(12);
    controller.set_device_color_preset("08");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.brightness, 77);
    assert_eq!(snapshot.contrast, Some(12));
    assert_eq!(snapshot.color_preset.as_deref(), Some("08"));
    assert_eq!(
        controller.calls(),
        vec![
            MockCall::GetBrightness,
            MockCall::GetContrast,
            MockCall::GetColorPreset
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_poll_does_not_clobber_edit() {
    let controller = MockDisplayController::new(30);
    controller.set_latency(Duration::from_millis(300));
    let engine = start(&controller, Duration::from_secs(3600)).await;

    engine.request_change(Parameter::Brightness, 80);
    controller.set_device_brightness(10);
    engine.refresh().await;
    assert!(engine.is_editing(Parameter::Brightness));
    assert_eq!(
        engine.current_value(Parameter::Brightness),
        Some(Value::Level(80))
    );
    assert!(!controller.calls().contains(&MockCall::GetBrightness));

    engine.settled().await;
    assert_eq!(controller.device_brightness(), 80);
    engine.refresh().await;
    assert_eq!(
        engine.current_value(Parameter::Brightness),
        Some(Value::Level(80))
    );

    controller.set_device_brightness(10);
    engine.refresh().await;
    assert_eq!(
        engine.current_value(Parameter::Brightness),
        Some(Value::Level(10))
    );
}

#[tokio::test(start_paused = true)]
async fn test_reading_racing_with_edit_is_discarded() {
    let controller = MockDisplayController::new(30);
    controller.set_latency(Duration::from_millis(100));
    let engine = start(&controller, Duration::from_secs(3600)).await;

    controller.set_device_brightness(10);
    tokio::join!(engine.refresh(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.request_change(Parameter::Brightness, 80);
    });
    assert_eq!(
        engine.current_value(Parameter::Brightness),
        Some(Value::Level(80))
    );
    engine.settled().await;
    assert_eq!(
        engine.current_value(Parameter::Brightness),
        Some(Value::Level(80))
    );
    assert_eq!(controller.device_brightness(), 80);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_readings_are_discarded() {
    let controller = MockDisplayController::extended(30, 70);
    let engine = start(&controller, Duration::from_secs(3600)).await;

    controller.set_device_brightness(-1);
    controller.set_device_contrast(250);
    controller.set_device_color_preset("");
    engine.refresh().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.brightness, 30);
    assert_eq!(snapshot.contrast, Some(70));
    assert_eq!(snapshot.color_preset.as_deref(), Some("05"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reads_keep_last_value() {
    let controller = MockDisplayController::new(30);
    let engine = start(&controller, Duration::from_secs(1)).await;

    controller.set_device_brightness(60);
    controller.set_read_failure_mode(true);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.snapshot().brightness, 30);

    controller.set_read_failure_mode(false);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.snapshot().brightness, 60);
}

#[tokio::test(start_paused = true)]
async fn test_polling_resumes_after_pause() {
    let controller = MockDisplayController::new(30);
    let engine = start(&controller, Duration::from_secs(1)).await;

    engine.set_paused(true);
    controller.set_device_brightness(60);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(controller.calls().is_empty());
    assert_eq!(engine.snapshot().brightness, 30);

    engine.set_paused(false);
    engine.settled().await;
    // Resuming writes the local value back before the next poll sees it
    assert_eq!(controller.writes(), vec![MockCall::SetBrightness(30)]);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(engine.snapshot().brightness, 30);
}
