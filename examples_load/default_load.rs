use std::time::Instant;
use tracing::{debug, info};

use json_rotating_log::init::init_default_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handle = init_default_logging()?;

    let n: u64 = 20_000;
    let start = Instant::now();

    for i in 0..n {
        debug!(iteration = i, "never written");
        info!("default load test record {}", i);
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    println!("stats: {:?}, log file: {}", handle.stats(), handle.log_path().display());
    handle.shutdown().await?;
    Ok(())
}
