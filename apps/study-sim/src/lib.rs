pub mod config;
pub mod simulate;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SimConfig;

pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = SimConfig::from_env()?;
    tracing::info!(
        seed = config.seed,
        true_theta = config.true_theta,
        pool_size = config.pool_size,
        days = config.days,
        "Starting simulation..."
    );

    let report = simulate::simulate(&config, chrono::Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
