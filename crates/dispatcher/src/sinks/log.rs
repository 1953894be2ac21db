//! LogSink - pair summaries via tracing

use contracts::{ContractError, PairSink, SyncQuality, SynchronizedPair};
use tracing::{debug, info, instrument};

/// Logs every pair; poor pairs at info, the rest at debug
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_pair(&self, pair: &SynchronizedPair) {
        let diff_ms = pair.time_difference * 1000.0;
        if pair.quality == SyncQuality::Poor {
            info!(
                sink = %self.name,
                pair_id = pair.pair_id,
                diff_ms,
                quality = %pair.quality,
                "Poorly synchronized pair"
            );
        } else {
            debug!(
                sink = %self.name,
                pair_id = pair.pair_id,
                pts = pair.presentation_timestamp,
                diff_ms,
                quality = %pair.quality,
                "Pair received"
            );
        }
    }
}

impl PairSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, pair),
        fields(sink = %self.name, pair_id = pair.pair_id)
    )]
    async fn write(&mut self, pair: &SynchronizedPair) -> Result<(), ContractError> {
        self.log_pair(pair);
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, pairs = self.written, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_pair;

    #[tokio::test]
    async fn counts_written_pairs() {
        let mut sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
        for i in 0..3 {
            sink.write(&sample_pair(i, i as f64)).await.unwrap();
        }
        assert_eq!(sink.written, 3);
        sink.close().await.unwrap();
    }
}
