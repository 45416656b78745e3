use espmon::core::telemetry::{
    classify, MemorySample, Message, MetricsAggregator, SortMode, TaskRecord, TaskSnapshot,
    TelemetrySample,
};

fn snapshot(line: &str) -> TaskSnapshot {
    match classify(line) {
        Some(Message::Telemetry(TelemetrySample::Tasks(snapshot))) => snapshot,
        other => panic!("expected task snapshot, got {:?}", other),
    }
}

fn names(aggregator: &MetricsAggregator) -> Vec<&str> {
    aggregator
        .task_view()
        .tasks
        .iter()
        .map(|t| t.task_name.as_str())
        .collect()
}

#[test]
fn test_core_totals_skip_idle_tasks() {
    let mut aggregator = MetricsAggregator::default();
    aggregator.on_task_snapshot(snapshot(
        r#"{"tasks":[
            {"task_name":"IDLE0","run_time":9000,"percentage":90.0,"core":0},
            {"task_name":"idle1","run_time":8000,"percentage":80.0,"core":1},
            {"task_name":"wifi","run_time":500,"percentage":5.0,"core":0},
            {"task_name":"app_main","run_time":2000,"percentage":20.0,"core":1},
            {"task_name":"ipc","run_time":10,"percentage":1.0}
        ]}"#,
    ));

    let view = aggregator.task_view();
    assert_eq!(view.core_percentage(0), Some(5.0));
    assert_eq!(view.core_percentage(1), Some(20.0));
    // Idle tasks still show in the table
    assert_eq!(view.tasks.len(), 5);
    assert_eq!(view.tasks[0].task_name, "IDLE0");
}

#[test]
fn test_sort_modes_over_one_snapshot() {
    let mut aggregator = MetricsAggregator::new(SortMode::Name);
    aggregator.on_task_snapshot(TaskSnapshot {
        tasks: vec![
            TaskRecord::new("beta", 10.0, Some(1)),
            TaskRecord::new("Alpha", 10.0, None),
            TaskRecord::new("gamma", 30.0, Some(0)),
        ],
    });
    assert_eq!(names(&aggregator), ["Alpha", "beta", "gamma"]);

    aggregator.set_sort_mode(SortMode::Percentage);
    // Ties keep device order
    assert_eq!(names(&aggregator), ["gamma", "beta", "Alpha"]);

    aggregator.set_sort_mode(SortMode::Core);
    assert_eq!(names(&aggregator), ["Alpha", "gamma", "beta"]);
}

#[test]
fn test_memory_percentages() {
    let mut aggregator = MetricsAggregator::default();
    let view = *aggregator.on_memory_sample(&MemorySample {
        heap_total: 1000,
        heap_free: 250,
        internal_total: 0,
        internal_free: 0,
    });

    assert_eq!(view.heap.used, 750);
    assert!((view.heap.percent_used - 75.0).abs() < 1e-9);
    assert_eq!(view.internal.used, 0);
    assert_eq!(view.internal.percent_used, 0.0);
}

#[test]
fn test_memory_and_tasks_are_independent() {
    let mut aggregator = MetricsAggregator::default();
    aggregator.apply(TelemetrySample::Tasks(TaskSnapshot {
        tasks: vec![TaskRecord::new("app", 12.5, Some(0))],
    }));
    assert!(aggregator.memory().is_none());

    aggregator.apply(TelemetrySample::Memory(MemorySample {
        heap_total: 10,
        heap_free: 5,
        ..Default::default()
    }));
    assert_eq!(aggregator.task_view().tasks.len(), 1);
    assert!(aggregator.memory().is_some());

    // An empty snapshot replaces the previous one
    aggregator.apply(TelemetrySample::Tasks(TaskSnapshot::default()));
    assert!(aggregator.task_view().tasks.is_empty());
    assert_eq!(aggregator.task_view().core_percentage(0), Some(0.0));
}
