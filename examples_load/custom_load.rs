use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

use json_rotating_log::console::ConsoleTarget;
use json_rotating_log::init::init_json_logging;
use json_rotating_log::layer::QueuePolicy;
use json_rotating_log::rotating::RotationPolicy;
use json_rotating_log::{LoggerConfig, Severity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggerConfig {
        log_dir: PathBuf::from("./logs/custom_load"),
        rotation: RotationPolicy {
            max_bytes: 256 * 1024,
            backup_count: 3,
        },
        min_level: Severity::Warning,
        console: ConsoleTarget::Stdout,
        queue: QueuePolicy::DropWhenFull(50_000),
        ..LoggerConfig::default()
    };

    let handle = init_json_logging(config)?;

    let n: u64 = 20_000;
    let start = Instant::now();

    for i in 0..n {
        info!(iteration = i, "filtered by the WARNING threshold");
        let err = std::io::Error::new(std::io::ErrorKind::Other, format!("write {} failed", i));
        error!(error = &err as &(dyn std::error::Error + 'static), "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: emitted {} events in {:?} (~{:.0} ev/s)",
        n * 2,
        elapsed,
        (n * 2) as f64 / elapsed.as_secs_f64()
    );

    println!("stats: {:?}", handle.stats());
    handle.shutdown().await?;
    Ok(())
}
