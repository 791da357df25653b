//! Example of loading logger configuration from YAML.
//!
//! Run with:
//! ```bash
//! cargo run --example config_yaml
//! ```

use std::collections::HashMap;

const CONFIG: &str = r#"
log:
  level: debug
  development: true
  output_paths:
    - stdout
  encoder:
    time_encoding: utc
    level_encoding: lowercase
  directives: "hyper=warn"
  initial_fields:
    service: demo
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(CONFIG)?;
    let config: ntnulog::LoggerConfig = serde_yaml::from_value(root["log"].clone())?;

    let logger = config.build()?;
    let _guard = logger.try_init()?;

    tracing::trace!("This is a trace message (not visible)");
    tracing::debug!("This is a debug message");
    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message (development mode adds a stack trace)");
    tracing::info!(target: "hyper", "Filtered by the hyper=warn directive");

    tracing::info!(user = "alice", action = "login", "User performed an action");

    Ok(())
}
