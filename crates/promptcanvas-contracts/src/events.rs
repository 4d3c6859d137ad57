use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL diagnostics for one session.
///
/// Every line carries `type`, `session_id` and `ts`; payload keys are applied
/// afterwards and win on collision. A disabled log still builds and returns
/// the event but writes nothing.
#[derive(Debug, Clone)]
pub struct EventLog {
    session_id: String,
    sink: Option<Arc<FileSink>>,
}

#[derive(Debug)]
struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn to_file(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sink: Some(Arc::new(FileSink {
                path: path.into(),
                lock: Mutex::new(()),
            })),
        }
    }

    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sink: None,
        }
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(sink) = self.sink.as_deref() {
            sink.append(&event)?;
        }
        Ok(Value::Object(event))
    }
}

impl FileSink {
    fn append(&self, event: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn event_line_round_trips_through_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let log = EventLog::to_file(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("provider".to_string(), Value::String("native".to_string()));
        let emitted = log.emit("generation_requested", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(
            parsed["type"],
            Value::String("generation_requested".to_string())
        );
        assert_eq!(parsed["session_id"], Value::String("session-1".to_string()));
        assert_eq!(parsed["provider"], Value::String("native".to_string()));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_keys_win_over_defaults() -> anyhow::Result<()> {
        let log = EventLog::disabled("session-1");
        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        let emitted = log.emit("ledger_cleared", payload)?;
        assert_eq!(emitted["session_id"], Value::String("other".to_string()));
        assert_eq!(emitted["type"], Value::String("ledger_cleared".to_string()));
        Ok(())
    }

    #[test]
    fn events_accumulate_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::to_file(&path, "session-1");

        log.emit("one", EventPayload::new())?;
        log.emit("two", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let types: Vec<Value> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .map(|row| row["type"].clone())
            .collect();
        assert_eq!(types, vec![Value::from("one"), Value::from("two")]);
        Ok(())
    }

    #[test]
    fn disabled_log_touches_nothing() -> anyhow::Result<()> {
        let log = EventLog::disabled("session-1");
        let event = log.emit("generation_finished", EventPayload::new())?;
        assert_eq!(event["session_id"], Value::from("session-1"));
        Ok(())
    }
}
