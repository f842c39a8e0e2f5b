//! Record sinks: JSON lines for operators, in-memory for tests.

use crate::domain::{LocatorError, OperationRecord};
use crate::ports::outbound::RecordSink;
use std::io::Write;

/// Writes each record as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write any serializable value as a line (used for the summary).
    pub fn write_line<T: serde::Serialize>(&mut self, value: &T) -> Result<(), LocatorError> {
        serde_json::to_writer(&mut self.writer, value).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn emit(&mut self, record: &OperationRecord) -> Result<(), LocatorError> {
        self.write_line(record)
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    records: Vec<OperationRecord>,
}

impl MemoryRecordSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted so far.
    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }
}

impl RecordSink for MemoryRecordSink {
    fn emit(&mut self, record: &OperationRecord) -> Result<(), LocatorError> {
        self.records.push(record.clone());
        Ok(())
    }
}
