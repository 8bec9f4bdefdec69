use json_rotating_log::console::ConsoleTarget;
use json_rotating_log::{init_json_logging, LoggerConfig, SetupError};
use serde_json::Value;
use tempfile::TempDir;

fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

// Only one global subscriber can exist per process, so this binary holds a
// single test.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn installs_global_subscriber_once() {
    let dir = TempDir::new().unwrap();
    let config = LoggerConfig {
        log_dir: dir.path().join("logs"),
        console: ConsoleTarget::Stdout,
        ..LoggerConfig::default()
    };

    let handle = init_json_logging(config.clone()).unwrap();
    assert_eq!(handle.log_path(), config.log_path().as_path());

    tracing::debug!("dropped at the default threshold");
    tracing::info!("service started");
    tracing::error!(exception = "Traceback: boom", "job failed");

    handle.flush().await.unwrap();
    let lines = read_lines(handle.log_path());
    assert_eq!(lines.len(), 2);

    let started: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(started["message"], "service started");
    assert_eq!(started.as_object().unwrap().len(), 5);

    let failed: Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(failed["level"], "ERROR");
    assert_eq!(failed["exception"], "Traceback: boom");

    let second = init_json_logging(config);
    assert!(matches!(second, Err(SetupError::SubscriberInstalled(_))));

    // A burst far larger than any fixed queue, followed straight away by
    // shutdown: every record must be on disk once shutdown returns.
    for i in 0..3000 {
        tracing::info!("burst record {}", i);
    }

    let log_path = handle.log_path().to_path_buf();
    let stats = handle.stats();
    handle.shutdown().await.unwrap();

    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 3002);
    let last: Value = serde_json::from_str(&lines[3001]).unwrap();
    assert_eq!(last["message"], "burst record 2999");

    assert_eq!(stats.filtered_events, 1);
    assert_eq!(stats.enqueued_events, 3002);
    assert_eq!(stats.dropped_events, 0);
}
