//! Lead service binary entrypoint.
//! Boots the Axum HTTP server with the lead pipeline and Prometheus metrics.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lead_harvester::api::{self, AppState};
use lead_harvester::metrics::Metrics;

/// Compact logs, `RUST_LOG` wins over the default filter.
/// `try_init` because the hosting runtime may already own a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lead_harvester=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let pipeline = lead_harvester::pipeline_from_env().context("building lead pipeline")?;
    let metrics = Metrics::init(pipeline.config()).context("installing metrics recorder")?;

    let router = api::router(AppState::new(pipeline)).merge(metrics.router());
    Ok(router.into())
}
