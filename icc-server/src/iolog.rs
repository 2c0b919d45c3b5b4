//! Persisted I/O-set event log (`iosets_out.csv`).

use icc_core::ioset::{IoEvent, IoEventSink};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

const CSV_HEADER: &str = "\"appid\",witer,waitstart,iostart,ioend,nbytes";

/// Appends one CSV row per `hint_io_begin`/`hint_io_end` pair, matching the
/// original's `fputs`-based event trail.
pub struct CsvEventSink {
    file: Mutex<File>,
}

impl CsvEventSink {
    /// Open (creating if absent) the CSV log at `path`, writing the header
    /// if the file is new.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if is_new {
            writeln!(file, "{CSV_HEADER}")?;
        }
        Ok(CsvEventSink { file: Mutex::new(file) })
    }
}

impl IoEventSink for CsvEventSink {
    fn record(&self, event: IoEvent) {
        let mut file = self.file.lock();
        let _ = writeln!(file, "\"{}\",{},{},{},{},0", event.client_id, event.witer_ms, 0, event.wait_ms, event.wait_ms + event.io_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_once() {
        let path = std::env::temp_dir().join(format!("icc-iolog-test-{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);

        {
            let sink = CsvEventSink::open(&path).unwrap();
            sink.record(IoEvent { client_id: "a".into(), witer_ms: 1000, wait_ms: 5, io_ms: 10 });
        }
        {
            let sink = CsvEventSink::open(&path).unwrap();
            sink.record(IoEvent { client_id: "b".into(), witer_ms: 2000, wait_ms: 1, io_ms: 2 });
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("\"appid\"")).count(), 1);
        assert_eq!(content.lines().count(), 3);
        std::fs::remove_file(&path).unwrap();
    }
}
