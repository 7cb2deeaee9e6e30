/// Structural validation of raw ticks before aggregation
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::types::Tick;

/// Counters exposed by [`TickFilter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub accepted: u64,
    pub dropped: u64,
}

/// Drops ticks with a non-positive price or a negative volume.
///
/// Forwarded ticks keep their relative order; the filter never reorders.
#[derive(Debug, Default)]
pub struct TickFilter {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl TickFilter {
    pub fn new() -> Self {
        TickFilter::default()
    }

    /// Validate tick data
    pub fn validate(tick: &Tick) -> bool {
        tick.price.is_finite() && tick.volume.is_finite() && tick.price > 0.0 && tick.volume >= 0.0
    }

    /// Pass a valid tick through unchanged, or drop it with a diagnostic
    pub fn process(&self, tick: Tick) -> Option<Tick> {
        if Self::validate(&tick) {
            self.accepted.fetch_add(1, Ordering::Relaxed);
            Some(tick)
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Invalid tick dropped: {} price={} volume={} @ {}",
                tick.symbol, tick.price, tick.volume, tick.timestamp
            );
            None
        }
    }

    pub fn stats(&self) -> FilterStats {
        FilterStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Forward clean ticks from `input` to `output` until shutdown.
    ///
    /// On shutdown the input is closed and whatever was already queued is
    /// still forwarded. Returning drops `output`, which tells the
    /// aggregator that no more ticks will come.
    pub async fn run(
        &self,
        mut input: mpsc::Receiver<Tick>,
        output: mpsc::Sender<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("🧹 Tick filter started");

        loop {
            tokio::select! {
                maybe_tick = input.recv() => {
                    match maybe_tick {
                        Some(tick) => {
                            if !self.forward(tick, &output).await {
                                break;
                            }
                        }
                        None => {
                            debug!("Tick input closed by all producers");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        input.close();
                        while let Some(tick) = input.recv().await {
                            if !self.forward(tick, &output).await {
                                break;
                            }
                        }
                        break;
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            "🧹 Tick filter stopped - accepted: {}, dropped: {}",
            stats.accepted, stats.dropped
        );
    }

    /// Returns false once the downstream side is gone
    async fn forward(&self, tick: Tick, output: &mpsc::Sender<Tick>) -> bool {
        if let Some(clean) = self.process(tick) {
            if output.send(clean).await.is_err() {
                warn!("Aggregator input closed - stopping tick filter");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tick(price: f64, volume: f64) -> Tick {
        Tick::trade("AAPL", price, volume, Utc::now())
    }

    #[test]
    fn test_invalid_ticks_dropped() {
        let filter = TickFilter::new();

        assert!(filter.process(tick(0.0, 10.0)).is_none());
        assert!(filter.process(tick(-5.0, 10.0)).is_none());
        assert!(filter.process(tick(100.0, -1.0)).is_none());
        assert!(filter.process(tick(f64::NAN, 1.0)).is_none());
        assert!(filter.process(tick(100.0, f64::INFINITY)).is_none());

        assert_eq!(filter.stats(), FilterStats { accepted: 0, dropped: 5 });
    }

    #[test]
    fn test_zero_volume_passes_unchanged() {
        let filter = TickFilter::new();
        let original = tick(100.0, 0.0);

        let passed = filter.process(original.clone()).unwrap();
        assert_eq!(passed, original);
        assert_eq!(filter.stats().accepted, 1);
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let filter = TickFilter::new();
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (clean_tx, mut clean_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        for price in [1.0, -1.0, 2.0, 0.0, 3.0] {
            raw_tx.send(tick(price, 1.0)).await.unwrap();
        }
        drop(raw_tx);

        filter.run(raw_rx, clean_tx, shutdown_rx).await;

        let mut prices = Vec::new();
        while let Some(t) = clean_rx.recv().await {
            prices.push(t.price);
        }
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
        assert_eq!(filter.stats(), FilterStats { accepted: 3, dropped: 2 });
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_ticks() {
        let filter = TickFilter::new();
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (clean_tx, mut clean_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        raw_tx.send(tick(10.0, 1.0)).await.unwrap();
        raw_tx.send(tick(11.0, 1.0)).await.unwrap();
        shutdown_tx.send(true).unwrap();

        // raw_tx is still alive: only the shutdown signal can end the loop
        filter.run(raw_rx, clean_tx, shutdown_rx).await;

        assert!(raw_tx.send(tick(12.0, 1.0)).await.is_err());
        assert_eq!(clean_rx.recv().await.unwrap().price, 10.0);
        assert_eq!(clean_rx.recv().await.unwrap().price, 11.0);
        assert!(clean_rx.recv().await.is_none());
    }
}
