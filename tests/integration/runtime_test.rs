use espmon::core::telemetry::fake::{ScriptedChunk, ScriptedSource};
use espmon::core::telemetry::{ConnectionStatus, MonitorAlert, MonitorRuntime, MonitorView, SortMode};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_for<F>(runtime: &MonitorRuntime, predicate: F) -> Arc<MonitorView>
where
    F: Fn(&MonitorView) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let view = runtime.latest_view();
        if predicate(&view) || Instant::now() > deadline {
            return view;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn next_alert(runtime: &mut MonitorRuntime) -> Option<MonitorAlert> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(alert) = runtime.try_next_alert() {
            return Some(alert);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    None
}

#[test]
fn test_session_lifecycle() {
    let source = ScriptedSource::with_script(vec![
        ScriptedChunk::from("{\"tasks\":[{\"task_name\":\"b\",\"run_time\":1,\"percentage\":1.0,\"core\":1},"),
        ScriptedChunk::from("{\"task_name\":\"a\",\"run_time\":1,\"percentage\":9.0,\"core\":0}]}\n"),
        ScriptedChunk::from("{\"error\":\"stats overflow\",\"code\":\"ESP_ERR_NO_MEM\"}\n"),
        ScriptedChunk::with_delay(Vec::<u8>::new(), Duration::from_millis(50)),
        ScriptedChunk::failure("device unplugged"),
    ])
    .idle_timeout(Duration::from_millis(5));

    let mut runtime = MonitorRuntime::with_source(source, SortMode::Name).unwrap();

    let view = wait_for(&runtime, |v| v.tasks.tasks.len() == 2);
    assert_eq!(view.tasks.tasks[0].task_name, "a");

    assert_eq!(
        next_alert(&mut runtime),
        Some(MonitorAlert::Protocol("stats overflow (code: ESP_ERR_NO_MEM)".into()))
    );

    let alert = next_alert(&mut runtime).unwrap();
    assert!(alert.is_terminal());
    assert!(alert.message().contains("device unplugged"));

    let view = wait_for(&runtime, |v| matches!(v.status, ConnectionStatus::Disconnected(_)));
    assert!(matches!(view.status, ConnectionStatus::Disconnected(_)));
    // Last good data stays on screen
    assert_eq!(view.tasks.tasks.len(), 2);

    runtime.set_sort_mode(SortMode::Percentage);
    let view = wait_for(&runtime, |v| v.tasks.sort_mode == SortMode::Percentage);
    assert_eq!(view.tasks.tasks[0].task_name, "a");
    assert_eq!(view.tasks.tasks[1].task_name, "b");

    // A scripted source cannot be reopened
    assert!(runtime.reconnect().is_err());
    runtime.shutdown().unwrap();
}
