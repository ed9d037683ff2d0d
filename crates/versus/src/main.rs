use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use versus::prelude::*;

/// Reads a millisecond setting from the environment. Unset keeps the
/// default; unparsable values are logged and ignored.
fn duration_from_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "ignoring invalid duration");
                default
            }
        },
        Err(_) => default,
    }
}

fn room_config_from_env() -> RoomConfig {
    let defaults = RoomConfig::default();
    RoomConfig {
        voting_duration: duration_from_env("VERSUS_VOTING_MS", defaults.voting_duration),
        reveal_window: duration_from_env("VERSUS_REVEAL_MS", defaults.reveal_window),
        deadline_grace: duration_from_env("VERSUS_GRACE_MS", defaults.deadline_grace),
        ..defaults
    }
}

#[tokio::main]
async fn main() -> Result<(), VersusError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "versus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind = std::env::var("VERSUS_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let config = room_config_from_env();
    tracing::info!(
        %bind,
        voting_ms = config.voting_duration.as_millis() as u64,
        reveal_ms = config.reveal_window.as_millis() as u64,
        grace_ms = config.deadline_grace.as_millis() as u64,
        "starting Versus"
    );

    let server = VersusServer::builder()
        .bind(&bind)
        .room_config(config)
        .build()
        .await?;
    server.run().await
}
