use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only log of a session's `events.jsonl`.
///
/// Each line holds `type`, `session_id`, a per-writer `seq` and `ts`, then the
/// caller payload. The file is opened lazily on the first event and kept open.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    seq: AtomicU64,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            seq: AtomicU64::new(0),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of events written so far.
    pub fn emitted(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log for {} is poisoned", self.session_id))?;

        let seq = self.seq.load(Ordering::SeqCst) + 1;
        let mut event: Map<String, Value> = [
            ("type", Value::from(event_type)),
            ("session_id", Value::from(self.session_id.as_str())),
            ("seq", Value::from(seq)),
            ("ts", Value::from(now_utc_iso())),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        event.extend(payload);
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        if slot.is_none() {
            *slot = Some(open_append(&self.path)?);
        }
        if let Some(file) = slot.as_mut() {
            file.write_all(&line)
                .with_context(|| format!("failed appending to {}", self.path.display()))?;
        }
        self.seq.store(seq, Ordering::SeqCst);
        Ok(Value::Object(event))
    }
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed opening event log {}", path.display()))
}

/// Reads every event back, skipping lines that are not JSON objects.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.as_object().cloned())
        .collect())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
