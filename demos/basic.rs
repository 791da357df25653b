//! Basic stderr logging example.
//!
//! This example builds the default logger, which writes JSON records to
//! stderr, and installs it as the global default.

use ntnulog::Level;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = ntnulog::build_logger(Vec::<String>::new(), Level::INFO, false, true)?;
    let _guard = logger.try_init()?;

    tracing::debug!("This is a debug message (filtered out)");
    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message, with a stack trace");

    Ok(())
}
