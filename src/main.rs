//! Standalone CLI monitor for the upload page status feed
//!
//! Runs the page's connection status client natively and logs what the
//! status and info elements would show.
//!
//! Run with: cargo run --features cli --bin uplink-cli [ws-url]

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;
    use tracing::info;
    use tracing_subscriber::{fmt, EnvFilter};
    use uplink_ui::core::ConnectionConfig;
    use uplink_ui::websocket_native::NativeWsClient;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,uplink_ui=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let mut config = match std::env::var("UPLINK_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading config");
            ConnectionConfig::from_json(&std::fs::read_to_string(&path)?)?
        }
        Err(_) => ConnectionConfig::default(),
    };
    if let Some(url) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("UPLINK_WS").ok())
    {
        config.endpoint_url = url;
    }
    config.validate()?;

    info!(
        url = %config.endpoint_url,
        reconnect_ms = config.reconnect_delay_ms,
        error_report_ms = config.error_report_delay_ms,
        "Starting status monitor"
    );
    let client = NativeWsClient::spawn(config);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stats_interval = tokio::time::interval(Duration::from_secs(5));
    let mut last_info = String::new();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = stats_interval.tick() => {
                let info = client.elements.info.snapshot();
                if info.text != last_info {
                    info!(
                        bytes = info.text.len(),
                        class = %info.class_name,
                        "Info content changed"
                    );
                    last_info = info.text;
                }

                let status = client.status();
                info!(
                    state = status.state.label(),
                    degraded = status.degraded,
                    attempts = status.attempts,
                    outage_ms = ?status.outage_ms,
                    status_text = %client.elements.status.text(),
                    "status"
                );
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
