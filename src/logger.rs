use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::diff::diff_json;

const REDACTED_FIELDS: &[&str] = &["password", "token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLogMode {
    Full,
    Diffed,
}

pub(crate) type SharedLogger = Arc<Mutex<MessageLogger>>;

/// NDJSON record of portal traffic.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_status: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_status: None,
        })
    }

    pub fn shared(self) -> SharedLogger {
        Arc::new(Mutex::new(self))
    }

    pub fn log_request(&mut self, method: &str, path: &str, form: &[(&str, &str)]) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "form": redact(form),
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, status: u16, form: &[(&str, &str)]) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "status": status,
            "form": redact(form),
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, status: u16, body: &Value) {
        match (self.mode, self.previous_status.as_ref()) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, body, "", &mut changes);
                let change_entries: Vec<Value> = changes
                    .iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "status": status,
                    "changes": change_entries,
                });
                self.write_line(&entry);
            }
            (MessageLogMode::Diffed, None) => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "status": status,
                    "full": true,
                    "body": body,
                });
                self.write_line(&entry);
            }
            (MessageLogMode::Full, _) => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "status": status,
                    "body": body,
                });
                self.write_line(&entry);
            }
        }
        if body.is_object() {
            self.previous_status = Some(body.clone());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

/// Run `f` against the logger if one is configured. A poisoned lock skips the entry.
pub(crate) fn with_logger(logger: &Option<SharedLogger>, f: impl FnOnce(&mut MessageLogger)) {
    if let Some(shared) = logger
        && let Ok(mut guard) = shared.lock()
    {
        f(&mut guard);
    }
}

fn redact(form: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = form
        .iter()
        .map(|(k, v)| {
            let value = if REDACTED_FIELDS.contains(k) { "***" } else { *v };
            (k.to_string(), Value::String(value.to_string()))
        })
        .collect();
    Value::Object(map)
}
