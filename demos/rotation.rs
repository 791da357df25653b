//! Rotating file logger example.
//!
//! Records below error go to stdout, errors to stderr, and info and above is
//! written to a log file that rotates every kilobyte.

use ntnulog::{Level, RotatingLoggerBuilder, RotationPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let log_path = temp_dir.path().join("service.log");

    let policy = RotationPolicy::new(&log_path, 0, 3, 7).with_max_size_bytes(1024);
    let logger = RotatingLoggerBuilder::new(policy)
        .with_level(Level::INFO)
        .with_utc(true)
        .build()?;
    let guard = logger.try_init()?;

    let mut tasks = Vec::new();
    for worker in 0..4 {
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                tracing::info!(worker, i, "Log message");
            }
        }));
    }
    for task in tasks {
        task.await?;
    }
    tracing::error!("Done, this one also goes to stderr");

    // Flush the file writer before looking at the directory
    drop(guard);

    for entry in std::fs::read_dir(temp_dir.path())? {
        let entry = entry?;
        println!("{} ({} bytes)", entry.file_name().to_string_lossy(), entry.metadata()?.len());
    }

    Ok(())
}
