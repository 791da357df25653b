//! Helpers shared by the unit tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures output for verification
#[derive(Clone, Debug, Default)]
pub(crate) struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn output(&self) -> String {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).to_string()
    }

    /// Every captured line parsed as JSON.
    pub(crate) fn records(&self) -> Vec<Value> {
        self.output()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::other("Mutex poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmm` followed by `Z` or `+hhmm`/`-hhmm`.
pub(crate) fn is_iso8601_millis(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 24 {
        return false;
    }
    let (stamp, zone) = bytes.split_at(23);
    let shape_ok = stamp.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        19 => *b == b'.',
        _ => b.is_ascii_digit(),
    });
    let zone_ok = zone == b"Z"
        || (zone.len() == 5
            && (zone[0] == b'+' || zone[0] == b'-')
            && zone[1..].iter().all(u8::is_ascii_digit));
    shape_ok && zone_ok
}
