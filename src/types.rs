/// Core type definitions for the tick-to-bar pipeline
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Interval;

/// Live market tick from the upstream feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub bid_volume: f64,
    #[serde(default)]
    pub ask_volume: f64,
}

impl Tick {
    /// Trade-only tick with an empty book side
    pub fn trade(symbol: impl Into<String>, price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Tick {
            symbol: symbol.into(),
            price,
            volume,
            timestamp,
            bid: 0.0,
            ask: 0.0,
            bid_volume: 0.0,
            ask_volume: 0.0,
        }
    }
}

/// OHLCV bar for one symbol and one window.
///
/// `end_time` is only set once the window has been closed; snapshots of
/// in-progress bars carry `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub tick_count: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub interval: String,
}

impl Bar {
    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}

/// How the end timestamp of a closed bar is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEndPolicy {
    /// `start_time + interval`, every bar has the exact interval width
    #[default]
    Nominal,
    /// The wall-clock time at which the rotation ran
    WallClock,
}

impl WindowEndPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            WindowEndPolicy::Nominal => "nominal",
            WindowEndPolicy::WallClock => "wall_clock",
        }
    }
}

/// What a rotation does with a bar when the output conduit is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for downstream capacity (the table lock is not held while waiting)
    #[default]
    Block,
    /// Drop the bar and count it
    Reject,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            OverflowPolicy::Block => "block",
            OverflowPolicy::Reject => "reject",
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // Aggregation
    pub interval: Interval,
    pub window_end: WindowEndPolicy,
    pub align_to_boundary: bool,

    // Conduits
    pub tick_buffer: usize,
    pub bar_buffer: usize,
    pub overflow: OverflowPolicy,

    // Logging
    pub log_level: String,
    pub log_json: bool,

    // Output
    pub output_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval: Interval::ONE_MINUTE,
            window_end: WindowEndPolicy::Nominal,
            align_to_boundary: true,
            tick_buffer: 1000,
            bar_buffer: 100,
            overflow: OverflowPolicy::Block,
            log_level: "info".to_string(),
            log_json: false,
            output_path: None,
        }
    }
}
