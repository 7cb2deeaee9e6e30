/// Process wiring: raw ticks -> filter -> aggregator -> bar conduit
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::data::{AggregatorStats, BarAggregator, FilterStats, TickFilter};
use crate::error::Result;
use crate::types::{Bar, Config, Tick};

/// Counters collected when the pipeline stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub filter: FilterStats,
    pub aggregator: AggregatorStats,
    pub flushed_bars: usize,
}

/// Running pipeline: the filter, ingestion and cadence tasks.
pub struct Pipeline {
    tick_tx: mpsc::Sender<Tick>,
    filter: Arc<TickFilter>,
    aggregator: Arc<BarAggregator>,
    shutdown_tx: watch::Sender<bool>,
    filter_task: JoinHandle<()>,
    ingest_task: JoinHandle<()>,
    cadence_task: JoinHandle<()>,
}

impl Pipeline {
    /// Spawn all tasks; returns the pipeline and the receiving end of the bar conduit
    pub fn start(config: &Config) -> (Self, mpsc::Receiver<Bar>) {
        let (tick_tx, raw_rx) = mpsc::channel(config.tick_buffer);
        let (clean_tx, clean_rx) = mpsc::channel(config.tick_buffer);
        let (bar_tx, bar_rx) = mpsc::channel(config.bar_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let filter = Arc::new(TickFilter::new());
        let aggregator = Arc::new(BarAggregator::new(
            config.interval,
            config.window_end,
            bar_tx,
            config.overflow,
        ));

        let filter_task = {
            let filter = Arc::clone(&filter);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move { filter.run(raw_rx, clean_tx, shutdown_rx).await })
        };

        let ingest_task = {
            let aggregator = Arc::clone(&aggregator);
            tokio::spawn(async move { aggregator.run(clean_rx).await })
        };

        let cadence_task = {
            let aggregator = Arc::clone(&aggregator);
            let align = config.align_to_boundary;
            tokio::spawn(async move { aggregator.run_cadence(align, shutdown_rx).await })
        };

        info!(
            "🚀 Pipeline started - interval: {}, window end: {}, overflow: {}, tick buffer: {}, bar buffer: {}",
            config.interval,
            config.window_end.as_str(),
            config.overflow.as_str(),
            config.tick_buffer,
            config.bar_buffer
        );

        (
            Pipeline {
                tick_tx,
                filter,
                aggregator,
                shutdown_tx,
                filter_task,
                ingest_task,
                cadence_task,
            },
            bar_rx,
        )
    }

    /// Producer handle for raw ticks
    pub fn tick_sender(&self) -> mpsc::Sender<Tick> {
        self.tick_tx.clone()
    }

    pub fn aggregator(&self) -> Arc<BarAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Clean stop.
    ///
    /// Stops the cadence, lets every already queued tick reach the
    /// aggregator, performs one final rotation and closes the bar conduit.
    pub async fn shutdown(self) -> Result<PipelineReport> {
        info!("🛑 Pipeline shutting down...");

        let Pipeline {
            tick_tx,
            filter,
            aggregator,
            shutdown_tx,
            filter_task,
            ingest_task,
            cadence_task,
        } = self;

        drop(tick_tx);
        // Receivers may already be gone if a task ended early
        let _ = shutdown_tx.send(true);

        cadence_task.await?;
        filter_task.await?;
        ingest_task.await?;

        let flushed_bars = aggregator.close().await;

        let report = PipelineReport {
            filter: filter.stats(),
            aggregator: aggregator.stats(),
            flushed_bars,
        };

        info!(
            "✅ Pipeline stopped - ticks accepted: {}, dropped: {}, bars emitted: {}, rejected: {}",
            report.filter.accepted,
            report.filter.dropped,
            report.aggregator.bars_emitted,
            report.aggregator.bars_rejected
        );

        Ok(report)
    }
}
