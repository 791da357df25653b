#![allow(dead_code)]

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory writer standing in for stdout or stderr.
#[derive(Clone, Debug, Default)]
pub struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Value> {
        let buffer = self.buffer.lock().unwrap();
        parse_lines(&String::from_utf8_lossy(&buffer))
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
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

pub fn parse_lines(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("record is JSON"))
        .collect()
}

pub fn read_records(path: &Path) -> Vec<Value> {
    parse_lines(&std::fs::read_to_string(path).expect("read log file"))
}

pub fn messages(records: &[Value]) -> Vec<&str> {
    records.iter().map(|r| r["msg"].as_str().unwrap()).collect()
}
