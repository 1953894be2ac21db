//! FileSink - JSON-lines debug journal
//!
//! One metadata line per pair (ids, timestamps, quality); frame payloads are
//! never written. Meant for inspecting a run, not as a recording format.

use contracts::{ContractError, PairSink, SynchronizedPair};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, instrument};

use crate::record::PairRecord;

#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Journal file; parent directories are created
    pub path: PathBuf,
    /// Append instead of truncating an existing journal
    pub append: bool,
}

impl FileSinkConfig {
    /// `path` (default `./output/pairs.jsonl`) and `append` (default false)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output/pairs.jsonl"));
        let append = match params.get("append").map(String::as_str) {
            None => false,
            Some(value) => value
                .parse()
                .map_err(|_| format!("invalid 'append' value '{value}'"))?,
        };
        Ok(Self { path, append })
    }
}

/// Appends one [`PairRecord`] per line
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append_record(&mut self, pair: &SynchronizedPair) -> std::io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("journal closed"))?;
        serde_json::to_writer(&mut *writer, &PairRecord::from(pair))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }
}

impl PairSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, pair),
        fields(sink = %self.name, pair_id = pair.pair_id)
    )]
    async fn write(&mut self, pair: &SynchronizedPair) -> Result<(), ContractError> {
        self.append_record(pair)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.writer = None;
        debug!(sink = %self.name, path = %self.path.display(), "FileSink closed");
        Ok(())
    }
}
