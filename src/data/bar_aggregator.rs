/// Windowed bar aggregation from live ticks
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::data::Interval;
use crate::error::KlineError;
use crate::types::{Bar, OverflowPolicy, Tick, WindowEndPolicy};

/// Bar in progress (not yet complete)
#[derive(Debug, Clone)]
struct PartialBar {
    start_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    tick_count: u64,
}

impl PartialBar {
    fn new(start_time: DateTime<Utc>, price: f64, volume: f64) -> Self {
        PartialBar {
            start_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            tick_count: 1,
        }
    }

    fn update(&mut self, price: f64, volume: f64) {
        self.close = price;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.volume += volume;
        self.tick_count += 1;
    }

    fn to_bar(&self, symbol: String, interval: &str, end_time: Option<DateTime<Utc>>) -> Bar {
        Bar {
            symbol,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            tick_count: self.tick_count,
            start_time: self.start_time,
            end_time,
            interval: interval.to_string(),
        }
    }
}

/// Outcome of handing one closed bar to downstream
enum Delivery {
    Sent,
    Full,
    Closed,
}

/// Sending half of the bar conduit together with its overflow policy
struct BarOutput {
    tx: mpsc::Sender<Bar>,
    policy: OverflowPolicy,
}

impl BarOutput {
    async fn deliver(&self, bar: Bar) -> Delivery {
        match self.policy {
            OverflowPolicy::Block => match self.tx.send(bar).await {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::Closed,
            },
            OverflowPolicy::Reject => match self.tx.try_send(bar) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(_)) => Delivery::Full,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            },
        }
    }
}

/// Counters exposed by [`BarAggregator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub ticks_applied: u64,
    pub bars_emitted: u64,
    pub bars_rejected: u64,
    pub rotations: u64,
}

/// Multi-symbol aggregator for a single interval.
///
/// Holds at most one in-progress bar per symbol. Ticks update the table
/// under a single mutex; a rotation drains the whole table under that
/// same mutex and only then hands the closed bars to downstream, so a
/// tick lands either in the bar being closed or in a fresh bar for the
/// next window.
///
/// Rotations are serialized by the lock around the output conduit, which
/// is held from the drain until the last bar of that rotation is handed
/// off.
pub struct BarAggregator {
    interval: Interval,
    label: String,
    window_end: WindowEndPolicy,
    table: Mutex<HashMap<String, PartialBar>>,
    output: Mutex<Option<BarOutput>>,
    ticks_applied: AtomicU64,
    bars_emitted: AtomicU64,
    bars_rejected: AtomicU64,
    rotations: AtomicU64,
}

impl BarAggregator {
    pub fn new(
        interval: Interval,
        window_end: WindowEndPolicy,
        output: mpsc::Sender<Bar>,
        overflow: OverflowPolicy,
    ) -> Self {
        BarAggregator {
            interval,
            label: interval.label(),
            window_end,
            table: Mutex::new(HashMap::new()),
            output: Mutex::new(Some(BarOutput {
                tx: output,
                policy: overflow,
            })),
            ticks_applied: AtomicU64::new(0),
            bars_emitted: AtomicU64::new(0),
            bars_rejected: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    /// Create or update the in-progress bar for the tick's symbol
    pub async fn on_tick(&self, tick: Tick) {
        let mut table = self.table.lock().await;

        match table.entry(tick.symbol) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().update(tick.price, tick.volume);
            }
            Entry::Vacant(entry) => {
                let start_time = self.interval.window_start(tick.timestamp);
                debug!(
                    "🆕 Started new bar: {} {} @ {}",
                    entry.key(),
                    self.label,
                    start_time
                );
                entry.insert(PartialBar::new(start_time, tick.price, tick.volume));
            }
        }

        self.ticks_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Close and emit every in-progress bar, stamped with the current time
    pub async fn on_timer_tick(&self) -> usize {
        self.rotate_at(Utc::now()).await
    }

    /// Close and emit every in-progress bar as of `now`.
    ///
    /// Returns the number of bars handed to downstream.
    pub async fn rotate_at(&self, now: DateTime<Utc>) -> usize {
        let output = self.output.lock().await;
        self.rotate_locked(output.as_ref(), now).await
    }

    /// Final rotation followed by closing the output conduit.
    ///
    /// Downstream sees the end of the bar stream once this returns. Later
    /// rotations still drain the table but have nowhere to send.
    pub async fn close(&self) -> usize {
        let mut output = self.output.lock().await;
        let flushed = self.rotate_locked(output.as_ref(), Utc::now()).await;

        if output.take().is_some() {
            info!("🔒 Bar output closed after flushing {} bars", flushed);
        }
        flushed
    }

    async fn rotate_locked(&self, output: Option<&BarOutput>, now: DateTime<Utc>) -> usize {
        let drained = {
            let mut table = self.table.lock().await;
            std::mem::take(&mut *table)
        };
        self.rotations.fetch_add(1, Ordering::Relaxed);

        if drained.is_empty() {
            debug!("Rotation at {} - no open bars", now);
            return 0;
        }

        let mut bars: Vec<Bar> = drained
            .into_iter()
            .map(|(symbol, partial)| {
                let end_time = match self.window_end {
                    WindowEndPolicy::Nominal => self.interval.window_end(partial.start_time),
                    WindowEndPolicy::WallClock => now.max(partial.start_time),
                };
                partial.to_bar(symbol, &self.label, Some(end_time))
            })
            .collect();
        bars.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let total = bars.len();
        let mut emitted = 0;
        let mut rejected = 0;

        for bar in bars {
            debug!(
                "📊 Bar completed: {} {} @ {} - O:{:.2} H:{:.2} L:{:.2} C:{:.2} V:{}",
                bar.symbol, bar.interval, bar.start_time, bar.open, bar.high, bar.low, bar.close, bar.volume
            );

            let symbol = bar.symbol.clone();
            let delivery = match output {
                Some(output) => output.deliver(bar).await,
                None => Delivery::Closed,
            };

            match delivery {
                Delivery::Sent => emitted += 1,
                Delivery::Full => {
                    warn!("Bar conduit full - rejected bar for {}", symbol);
                    rejected += 1;
                }
                Delivery::Closed => {
                    let err = KlineError::ChannelClosed(format!("bar output for {}", symbol));
                    warn!("Discarding bar: {} ({})", err, err.error_code());
                    rejected += 1;
                }
            }
        }

        self.bars_emitted.fetch_add(emitted as u64, Ordering::Relaxed);
        self.bars_rejected.fetch_add(rejected, Ordering::Relaxed);

        info!(
            "⏱️ Rotated {} bars ({}) - emitted: {}, rejected: {}",
            total, self.label, emitted, rejected
        );
        emitted
    }

    /// Current partial bar for a symbol (for monitoring)
    pub async fn current_bar(&self, symbol: &str) -> Option<Bar> {
        let table = self.table.lock().await;
        table
            .get(symbol)
            .map(|partial| partial.to_bar(symbol.to_string(), &self.label, None))
    }

    /// Symbols with an open bar in the current window
    pub async fn open_symbols(&self) -> Vec<String> {
        let table = self.table.lock().await;
        let mut symbols: Vec<String> = table.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            ticks_applied: self.ticks_applied.load(Ordering::Relaxed),
            bars_emitted: self.bars_emitted.load(Ordering::Relaxed),
            bars_rejected: self.bars_rejected.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }

    /// Apply clean ticks until every sender of `input` is gone
    pub async fn run(&self, mut input: mpsc::Receiver<Tick>) {
        info!("📥 Bar aggregator ingesting ({})", self.label);

        while let Some(tick) = input.recv().await {
            self.on_tick(tick).await;
        }

        debug!("Aggregator input drained");
    }

    /// Fire a rotation once per interval until shutdown.
    ///
    /// Fires are never skipped or coalesced: if a rotation overruns, the
    /// missed fires run back to back once it completes.
    pub async fn run_cadence(&self, align_to_boundary: bool, mut shutdown: watch::Receiver<bool>) {
        let period = self.interval.duration();
        let first_fire = if align_to_boundary {
            let now = Utc::now();
            let until_boundary = (self.interval.next_boundary(now) - now)
                .to_std()
                .unwrap_or(period);
            Instant::now() + until_boundary
        } else {
            Instant::now() + period
        };

        let mut timer = interval_at(first_fire, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Burst);

        info!(
            "⏰ Rotation cadence started (interval: {}, aligned: {})",
            self.label, align_to_boundary
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    self.on_timer_tick().await;
                }
            }
        }

        info!("⏰ Rotation cadence stopped");
    }
}
