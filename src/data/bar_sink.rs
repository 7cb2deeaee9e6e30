/// Downstream bar consumer writing JSONL
use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::Bar;

/// Appends every completed bar as one JSON line
pub struct JsonlBarSink<W> {
    writer: W,
    written: u64,
}

impl JsonlBarSink<tokio::fs::File> {
    /// Open (or create) a file in append mode
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;

        debug!("Bar sink opened: {}", path.as_ref().display());
        Ok(JsonlBarSink::new(file))
    }
}

impl<W: AsyncWrite + Unpin> JsonlBarSink<W> {
    pub fn new(writer: W) -> Self {
        JsonlBarSink { writer, written: 0 }
    }

    /// Write one bar and flush it
    pub async fn write_bar(&mut self, bar: &Bar) -> Result<()> {
        let json_line = serde_json::to_string(bar)?;
        self.writer.write_all(format!("{}\n", json_line).as_bytes()).await?;
        self.writer.flush().await?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Consume the bar conduit until the aggregator closes it
    pub async fn run(mut self, mut bars: mpsc::Receiver<Bar>) -> Result<u64> {
        while let Some(bar) = bars.recv().await {
            self.write_bar(&bar).await?;
        }

        self.writer.shutdown().await?;
        info!("💾 Bar sink finished - {} bars written", self.written);
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(symbol: &str, close: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Bar {
            symbol: symbol.to_string(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 42.0,
            tick_count: 3,
            start_time: start,
            end_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap()),
            interval: "1m".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sink_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.jsonl");

        let (tx, rx) = mpsc::channel(4);
        tx.send(bar("AAPL", 105.0)).await.unwrap();
        tx.send(bar("MSFT", 95.0)).await.unwrap();
        drop(tx);

        let sink = JsonlBarSink::open(&path).await.unwrap();
        assert_eq!(sink.run(rx).await.unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let bars: Vec<Bar> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(bars, vec![bar("AAPL", 105.0), bar("MSFT", 95.0)]);
    }

    #[tokio::test]
    async fn test_sink_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.jsonl");

        let mut first = JsonlBarSink::open(&path).await.unwrap();
        first.write_bar(&bar("AAPL", 101.0)).await.unwrap();
        drop(first);

        let mut second = JsonlBarSink::open(&path).await.unwrap();
        second.write_bar(&bar("AAPL", 102.0)).await.unwrap();
        assert_eq!(second.written(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
