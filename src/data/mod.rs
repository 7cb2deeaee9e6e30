pub mod bar_aggregator;
pub mod bar_sink;
pub mod interval;
pub mod tick_filter;
pub mod tick_source;

pub use bar_aggregator::{AggregatorStats, BarAggregator};
pub use bar_sink::JsonlBarSink;
pub use interval::Interval;
pub use tick_filter::{FilterStats, TickFilter};
pub use tick_source::read_ticks;
