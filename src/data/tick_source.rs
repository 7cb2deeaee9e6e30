/// Newline-delimited JSON tick reader
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::Tick;

/// Read one JSON tick per line and push it into the pipeline.
///
/// Malformed lines are skipped. Stops at end of input or when the
/// pipeline no longer accepts ticks; returns the number of ticks sent.
pub async fn read_ticks<R>(reader: R, output: mpsc::Sender<Tick>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0u64;
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tick = match serde_json::from_str::<Tick>(line) {
            Ok(tick) => tick,
            Err(e) => {
                warn!("Skipping malformed tick on line {}: {}", line_no, e);
                continue;
            }
        };

        if output.send(tick).await.is_err() {
            info!("Pipeline input closed - stopping tick reader");
            break;
        }
        sent += 1;
    }

    debug!("Tick reader finished after {} lines, {} ticks sent", line_no, sent);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_valid_lines_and_skips_garbage() {
        let input = concat!(
            r#"{"symbol":"AAPL","price":100.0,"volume":1.0,"timestamp":"2024-01-01T12:00:00Z"}"#,
            "\n",
            "\n",
            "not json\n",
            r#"{"symbol":"MSFT","price":300.0,"volume":2.0,"timestamp":"2024-01-01T12:00:01Z","bid":299.5,"ask":300.5}"#,
            "\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        let sent = read_ticks(input.as_bytes(), tx).await.unwrap();
        assert_eq!(sent, 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.symbol, "AAPL");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.symbol, "MSFT");
        assert_eq!(second.ask, 300.5);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stops_when_pipeline_closed() {
        let input = concat!(
            r#"{"symbol":"AAPL","price":100.0,"volume":1.0,"timestamp":"2024-01-01T12:00:00Z"}"#,
            "\n",
        );
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert_eq!(read_ticks(input.as_bytes(), tx).await.unwrap(), 0);
    }
}
