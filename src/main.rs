/// Main entry point for the tick-to-bar aggregator
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use klinestream::{
    config::load_config,
    data::{read_ticks, JsonlBarSink},
    error::Result,
    Config, Pipeline,
};

/// Logs go to stderr so stdout stays free for bar output
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("klinestream={},info", config.log_level)));

    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "config.toml".to_string());

    let config = load_config(&config_path)?;
    init_logging(&config);

    info!("Starting klinestream (config: {})", config_path);

    let (pipeline, bars) = Pipeline::start(&config);

    let sink_task = match &config.output_path {
        Some(path) => {
            let sink = JsonlBarSink::open(path).await?;
            info!("Writing bars to {}", path.display());
            tokio::spawn(sink.run(bars))
        }
        None => tokio::spawn(JsonlBarSink::new(tokio::io::stdout()).run(bars)),
    };

    let mut reader_task = tokio::spawn(read_ticks(
        BufReader::new(tokio::io::stdin()),
        pipeline.tick_sender(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received - initiating graceful shutdown");
        }
        result = &mut reader_task => match result {
            Ok(Ok(count)) => info!("Tick input exhausted after {} ticks", count),
            Ok(Err(e)) => error!("Tick reader failed: {} ({})", e, e.error_code()),
            Err(e) => error!("Tick reader task failed: {}", e),
        },
    }

    let report = pipeline.shutdown().await?;
    reader_task.abort();

    let written = sink_task.await??;

    info!(
        "Shutdown complete - {} bars written, report: {}",
        written,
        serde_json::to_string(&report)?
    );

    Ok(())
}
