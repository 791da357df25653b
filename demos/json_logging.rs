//! Example of JSON records with spans and fields shared by every record.

use ntnulog::{Encoding, KeyScheme, Level, LoggerConfig, encoder::EncoderConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let json = LoggerConfig::new(["stdout"], Level::DEBUG, false, true)
        .with_encoder(EncoderConfig::with_scheme(KeyScheme::Conventional, true))
        .with_initial_field("service", "checkout")
        .with_initial_field("version", 3)
        .build()?;

    json.in_scope(|| {
        let span = tracing::info_span!("request", method = "GET", path = "/cart");
        let _enter = span.enter();
        tracing::info!(items = 2, "Cart loaded");
        tracing::error!(error = "timeout", "Payment failed");
    });

    let console = LoggerConfig::new(["stdout"], Level::INFO, false, false)
        .with_encoding(Encoding::Console)
        .build()?;
    console.in_scope(|| tracing::info!("The same logger, human readable"));

    Ok(())
}
