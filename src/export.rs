//! Ratio filtering and JSON output.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::extract::CryptoRecord;

/// Keeps records whose ratio is present and `<= threshold`, in input order.
pub fn filter_by_ratio(records: Vec<CryptoRecord>, threshold: f64) -> Vec<CryptoRecord> {
    records
        .into_iter()
        .filter(|r| r.ratio.is_some_and(|ratio| ratio <= threshold))
        .collect()
}

/// File name used for the filtered export, e.g. `cryptomonnaie_ratio_0.3.json`.
pub fn ratio_file_name(threshold: f64) -> String {
    format!("cryptomonnaie_ratio_{threshold}.json")
}

/// Streams a pretty-printed JSON array to disk one element at a time.
///
/// The array is closed and the buffer flushed when the writer is finished or
/// dropped, so an interrupted run still leaves a well-formed file.
pub struct JsonArrayWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    written: usize,
}

impl JsonArrayWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            out: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn push<T: Serialize>(&mut self, item: &T) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        let body = serde_json::to_string_pretty(item)?;
        out.write_all(if self.written == 0 { b"[\n" } else { b",\n" })?;
        for (i, line) in body.lines().enumerate() {
            if i > 0 {
                out.write_all(b"\n")?;
            }
            out.write_all(b"  ")?;
            out.write_all(line.as_bytes())?;
        }
        out.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Closes the array and returns the written path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.close()?;
        Ok(self.path.clone())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.write_all(if self.written == 0 { b"[]\n" } else { b"\n]\n" })?;
            out.flush()?;
            debug!(path = %self.path.display(), items = self.written, "closed json array");
        }
        Ok(())
    }
}

impl Drop for JsonArrayWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path.display(), error = %err, "failed to close json array");
        }
    }
}

/// Writes `records` as one JSON array file.
pub fn write_json(path: impl AsRef<Path>, records: &[CryptoRecord]) -> Result<PathBuf> {
    let mut writer = JsonArrayWriter::create(path)?;
    for record in records {
        writer.push(record)?;
    }
    writer.finish()
}

/// Reads a previously exported record array.
pub fn read_json(path: impl AsRef<Path>) -> Result<Vec<CryptoRecord>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
