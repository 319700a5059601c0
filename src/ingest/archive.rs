//! JSON Lines sink for applied events
//!
//! Lines use the same column names as the sources, so an archive can be
//! replayed as a `jsonl` source.

use crate::error::Result;
use crate::event::Event;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Append-only event archive
#[derive(Debug)]
pub struct ArchiveSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    written: AtomicU64,
}

impl ArchiveSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Archiving applied events");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            written: AtomicU64::new(0),
        })
    }

    /// Append one event as a JSON line
    pub fn append(&self, event: &Event) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush buffered lines to disk
    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    /// Lines written since opening
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Archive file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use crate::ingest::source::EventReader;
    use crate::ingest::SourceFormat;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_archive_replays_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.jsonl");

        let event = EventBuilder::new()
            .timestamp(Utc.with_ymd_and_hms(2019, 11, 1, 0, 0, 7).unwrap())
            .event_type("purchase")
            .category("electronics.smartphone")
            .brand("apple")
            .product(1004237)
            .price(1081.98)
            .user(535871217)
            .build()
            .unwrap();

        let sink = ArchiveSink::open(&path).unwrap();
        sink.append(&event).unwrap();
        sink.append(&event).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.written(), 2);

        let file = File::open(&path).unwrap();
        let replayed: Vec<Event> = EventReader::from_reader(file, SourceFormat::Jsonl)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(replayed, vec![event.clone(), event]);
    }
}
