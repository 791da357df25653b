//! Example of loading logger and rotation configuration from TOML.
//!
//! Run with:
//! ```bash
//! cargo run --example config_toml
//! ```

use serde::Deserialize;

const CONFIG: &str = r#"
[rotation]
path = "logs/demo.log"
max_size = "64K"
max_backups = 3
max_age_days = 7

[log]
level = "info"
output_paths = ["stderr"]

[log.encoder]
time_key = "ts"
caller_key = "caller"
stacktrace_key = "stacktrace"
time_encoding = "utc"
"#;

#[derive(Deserialize)]
struct Config {
    log: ntnulog::LoggerConfig,
    rotation: ntnulog::RotationPolicy,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root: Config = toml::from_str(CONFIG)?;
    let temp_dir = tempfile::tempdir()?;
    let policy = ntnulog::RotationPolicy {
        path: temp_dir.path().join(&root.rotation.path),
        ..root.rotation
    };

    let logger = root.log.build()?;
    logger.in_scope(|| {
        tracing::info!(max_size = policy.max_size, "Loaded rotation policy");
        tracing::warn!(error_code = 404, path = "/api/users", "Resource not found");
    });

    let rotating = ntnulog::RotatingLoggerBuilder::new(policy)
        .with_utc(true)
        .with_console(false)
        .build()?;
    rotating.in_scope(|| tracing::info!("Written only to the rotating file"));
    rotating.shutdown();

    Ok(())
}
