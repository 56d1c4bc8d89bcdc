use crate::domain::model::{TimingEvent, LOG_HEADER};
use crate::utils::error::{MeasureError, Result};
use csv::{Writer, WriterBuilder};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Append-only CSV timing log shared by every concurrently running branch.
///
/// Each `record` call writes and flushes one complete row while holding the
/// lock, so rows from concurrent writers never interleave. Any write failure
/// is returned as `LogWriteError`.
pub struct TimingRecorder {
    destination: String,
    writer: Mutex<Writer<Box<dyn Write + Send>>>,
}

impl TimingRecorder {
    /// Opens `path` for appending. The header row is written only when the
    /// file is new or empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let destination = path.display().to_string();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MeasureError::LogWriteError {
                destination: destination.clone(),
                message: e.to_string(),
            })?;
        let is_empty = file
            .metadata()
            .map(|metadata| metadata.len() == 0)
            .map_err(|e| MeasureError::LogWriteError {
                destination: destination.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Opened timing log {} (new: {})", destination, is_empty);
        Self::build(destination, Box::new(file), is_empty)
    }

    /// Wraps an arbitrary destination; the header is always written first.
    pub fn from_writer<W: Write + Send + 'static>(destination: &str, writer: W) -> Result<Self> {
        Self::build(destination.to_string(), Box::new(writer), true)
    }

    fn build(destination: String, sink: Box<dyn Write + Send>, write_header: bool) -> Result<Self> {
        let writer = WriterBuilder::new().has_headers(false).from_writer(sink);
        let recorder = Self {
            destination,
            writer: Mutex::new(writer),
        };
        if write_header {
            recorder.write_row(&LOG_HEADER)?;
        }
        Ok(recorder)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn record(&self, event: &TimingEvent) -> Result<()> {
        self.write_row(&event.to_row())
    }

    fn write_row<T: AsRef<[u8]>>(&self, row: &[T]) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| MeasureError::LogWriteError {
            destination: self.destination.clone(),
            message: "recorder lock poisoned".to_string(),
        })?;

        writer
            .write_record(row)
            .map_err(|e| self.write_error(e.to_string()))?;
        writer.flush().map_err(|e| self.write_error(e.to_string()))
    }

    fn write_error(&self, message: String) -> MeasureError {
        MeasureError::LogWriteError {
            destination: self.destination.clone(),
            message,
        }
    }
}
