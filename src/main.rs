//! streamable-rs demo
//!
//! Declares a small pipeline, prints its plan, then iterates it.
//! Pass a config file path as the first argument to override the engine
//! defaults. Set `STREAMABLE_LOG_DIR` to also write logs to a file there.

use anyhow::Context;
use std::sync::Arc;
use streamable_rs::{CatchSpec, EngineConfig, Stream, TracingReporter};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
#[error("cannot divide {0} by zero")]
struct DivideByZero(u64);

fn divide(x: u64) -> Result<f64, DivideByZero> {
    let divisor = x % 5;
    if divisor == 0 {
        return Err(DivideByZero(x));
    }
    Ok(x as f64 / divisor as f64)
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let (file_layer, _guard) = match std::env::var_os("STREAMABLE_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "streamable.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,streamable_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("Failed to load engine config from {}", path))?,
        None => EngineConfig::load_or_default(),
    };
    tracing::info!(ordered = config.concurrency.ordered, "Starting streamable demo");

    let stream = Stream::new(1..=40u64)
        .with_config(config)?
        .try_par_map(4, divide)?
        .catch_with(CatchSpec::kind::<DivideByZero>().replacement(0.0))
        .group_by_size(5)?
        .throttle_per_second(10)?
        .observe_with("batches", Default::default(), Arc::new(TracingReporter))?;

    println!("{}", stream.explain());
    println!(
        "{}",
        serde_json::to_string_pretty(&stream.plan()).context("Failed to serialize plan")?
    );

    for batch in &stream {
        let batch = batch?;
        println!("{:?}", batch);
    }

    tracing::info!("Done");
    Ok(())
}
