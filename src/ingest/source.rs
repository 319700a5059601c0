//! Readers turning recorded files into normalized events
//!
//! A reader yields one `Result<Event>` per row. A row that fails validation
//! comes back as a recoverable [`CubeError::MalformedEvent`] and the reader
//! moves on; I/O failures are fatal and end the stream.

use super::config::SourceFormat;
use crate::error::{CubeError, Result};
use crate::event::{Event, RawEvent};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

type RawRows = Box<dyn Iterator<Item = Result<RawEvent>> + Send>;

/// Iterator over the events of one source
pub struct EventReader {
    rows: RawRows,
}

impl EventReader {
    /// Read events in `format` from any byte stream
    pub fn from_reader<R: Read + Send + 'static>(reader: R, format: SourceFormat) -> Self {
        let rows: RawRows = match format {
            SourceFormat::Csv => Box::new(csv_rows(reader)),
            SourceFormat::Jsonl => Box::new(jsonl_rows(reader)),
        };
        Self { rows }
    }
}

impl Iterator for EventReader {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|row| row.and_then(Event::try_from))
    }
}

/// Open a file as an event source
pub fn open(path: impl AsRef<Path>, format: SourceFormat) -> Result<EventReader> {
    let file = File::open(path.as_ref())?;
    Ok(EventReader::from_reader(BufReader::new(file), format))
}

fn csv_rows<R: Read + Send + 'static>(reader: R) -> impl Iterator<Item = Result<RawEvent>> + Send {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize::<RawEvent>()
        .map(|row| {
            row.map_err(|e| {
                if e.is_io_error() {
                    CubeError::Csv(e)
                } else {
                    CubeError::MalformedEvent(e.to_string())
                }
            })
        })
}

fn jsonl_rows<R: Read + Send + 'static>(reader: R) -> impl Iterator<Item = Result<RawEvent>> + Send {
    BufReader::new(reader)
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(parse_json_line(idx + 1, &line)),
            Err(e) => Some(Err(CubeError::Io(e))),
        })
}

fn parse_json_line(line_no: usize, line: &str) -> Result<RawEvent> {
    let value: JsonValue = serde_json::from_str(line)
        .map_err(|e| CubeError::MalformedEvent(format!("line {}: {}", line_no, e)))?;
    RawEvent::from_json(value)
}
