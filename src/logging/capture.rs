//! Scoped per-invocation logger with capture.
//!
//! Every invocation gets its own logger whose entries are formatted and
//! retained in memory so they can travel back to the host inside the
//! outbound envelope. Locally the entries are also mirrored to the
//! process logger; deployed, the capture is the only sink.

use crate::runtime::Environment;
use chrono::{Local, SecondsFormat};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Severity levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the lines captured during one invocation.
pub struct LogCapture {
    entries: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Drain the captured lines, in emission order.
    pub fn take(&self) -> Vec<String> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *entries)
    }
}

/// Logger bound to a single invocation.
///
/// Cheap to clone; clones and field-derived children share the same
/// capture sink, so a handler can log across tasks and still have every
/// line land in its own envelope.
#[derive(Clone)]
pub struct FunctionLogger {
    level: LogLevel,
    environment: Environment,
    fields: BTreeMap<String, String>,
    entries: Arc<Mutex<Vec<String>>>,
}

impl FunctionLogger {
    /// Create a logger for one invocation together with the capture
    /// that will own its lines.
    pub fn create(
        level: LogLevel,
        function_name: impl Into<String>,
        environment: Environment,
    ) -> (FunctionLogger, LogCapture) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let mut fields = BTreeMap::new();
        fields.insert("function".to_string(), function_name.into());
        let logger = FunctionLogger {
            level,
            environment,
            fields,
            entries: entries.clone(),
        };
        (logger, LogCapture { entries })
    }

    /// Derive a child logger with an extra key=value field, sharing the
    /// same capture sink.
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<String>) -> FunctionLogger {
        let mut child = self.clone();
        child.fields.insert(key.into(), value.into());
        child
    }

    pub fn trace(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Trace, msg.as_ref());
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Debug, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Info, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Warn, msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Error, msg.as_ref());
    }

    fn log(&self, level: LogLevel, msg: &str) {
        // Entries below the bound level are dropped entirely, neither
        // captured nor mirrored.
        if level < self.level {
            return;
        }

        let time = Local::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = match self.environment {
            Environment::Local => self.format_text(level, msg, &time),
            Environment::Deployed => self.format_json(level, msg, &time),
        };

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);

        if self.environment.is_local() {
            self.mirror(level, msg);
        }
    }

    /// logrus-style key=value line: time, level and msg first, then the
    /// remaining fields in sorted order.
    fn format_text(&self, level: LogLevel, msg: &str, time: &str) -> String {
        let mut line = String::with_capacity(64 + msg.len());
        line.push_str("time=");
        append_value(&mut line, time);
        line.push_str(" level=");
        line.push_str(level.as_str());
        line.push_str(" msg=");
        append_value(&mut line, msg);
        for (key, value) in &self.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            append_value(&mut line, value);
        }
        line
    }

    /// One JSON object per line with alphabetically ordered keys.
    fn format_json(&self, level: LogLevel, msg: &str, time: &str) -> String {
        let mut object = serde_json::Map::new();
        for (key, value) in &self.fields {
            object.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        object.insert(
            "level".to_string(),
            serde_json::Value::String(level.as_str().to_string()),
        );
        object.insert("msg".to_string(), serde_json::Value::String(msg.to_string()));
        object.insert("time".to_string(), serde_json::Value::String(time.to_string()));
        serde_json::Value::Object(object).to_string()
    }

    fn mirror(&self, level: LogLevel, msg: &str) {
        let function = self
            .fields
            .get("function")
            .map(String::as_str)
            .unwrap_or_default();
        match level {
            LogLevel::Trace => tracing::trace!(target: "function", function, "{}", msg),
            LogLevel::Debug => tracing::debug!(target: "function", function, "{}", msg),
            LogLevel::Info => tracing::info!(target: "function", function, "{}", msg),
            LogLevel::Warn => tracing::warn!(target: "function", function, "{}", msg),
            LogLevel::Error => tracing::error!(target: "function", function, "{}", msg),
        }
    }
}

/// Append a value, quoting it the way logrus does: bare when it only
/// contains unambiguous characters, quoted with escapes otherwise.
fn append_value(line: &mut String, value: &str) {
    if !needs_quoting(value) {
        line.push_str(value);
        return;
    }
    line.push('"');
    for c in value.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            '\t' => line.push_str("\\t"),
            _ => line.push(c),
        }
    }
    line.push('"');
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || !value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_logger() -> (FunctionLogger, LogCapture) {
        FunctionLogger::create(LogLevel::Trace, "demo", Environment::Local)
    }

    #[test]
    fn test_capture_preserves_emission_order() {
        let (logger, capture) = local_logger();
        logger.info("first");
        logger.warn("second");
        logger.error("third");

        let lines = capture.take();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("msg=first"));
        assert!(lines[1].contains("msg=second"));
        assert!(lines[2].contains("msg=third"));
    }

    #[test]
    fn test_take_drains_the_capture() {
        let (logger, capture) = local_logger();
        logger.info("only");
        assert_eq!(capture.take().len(), 1);
        assert!(capture.take().is_empty());
    }

    #[test]
    fn test_entries_below_level_are_dropped() {
        let (logger, capture) =
            FunctionLogger::create(LogLevel::Warn, "demo", Environment::Local);
        logger.trace("dropped");
        logger.debug("dropped");
        logger.info("dropped");
        logger.warn("kept");
        logger.error("kept");

        assert_eq!(capture.take().len(), 2);
    }

    #[test]
    fn test_with_field_shares_the_sink() {
        let (logger, capture) = local_logger();
        logger.with_field("status", "Not Found").error("Handler failed");
        logger.info("plain");

        let lines = capture.take();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("status=\"Not Found\""));
        assert!(!lines[1].contains("status="));
    }

    #[test]
    fn test_text_format_layout() {
        let (logger, _capture) = local_logger();
        let line = logger.with_field("reason", "missing item").format_text(
            LogLevel::Error,
            "Handler failed",
            "2026-08-23T10:15:30Z",
        );
        assert_eq!(
            line,
            r#"time="2026-08-23T10:15:30Z" level=error msg="Handler failed" function=demo reason="missing item""#
        );
    }

    #[test]
    fn test_text_format_bare_values_stay_unquoted() {
        let (logger, _capture) = local_logger();
        let line = logger.format_text(LogLevel::Info, "ready", "2026-08-23T10:15:30Z");
        assert_eq!(
            line,
            r#"time="2026-08-23T10:15:30Z" level=info msg=ready function=demo"#
        );
    }

    #[test]
    fn test_text_format_escapes_quotes() {
        let mut line = String::new();
        append_value(&mut line, r#"say "hi""#);
        assert_eq!(line, r#""say \"hi\"""#);
    }

    #[test]
    fn test_json_format_sorted_keys() {
        let (logger, _capture) =
            FunctionLogger::create(LogLevel::Trace, "demo", Environment::Deployed);
        let line = logger.with_field("reason", "missing").format_json(
            LogLevel::Error,
            "Handler failed",
            "2026-08-23T10:15:30Z",
        );
        assert_eq!(
            line,
            r#"{"function":"demo","level":"error","msg":"Handler failed","reason":"missing","time":"2026-08-23T10:15:30Z"}"#
        );
    }

    #[test]
    fn test_deployed_entries_are_json_lines() {
        let (logger, capture) =
            FunctionLogger::create(LogLevel::Info, "demo", Environment::Deployed);
        logger.info("deployed entry");

        let lines = capture.take();
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["level"], "info");
        assert_eq!(value["msg"], "deployed entry");
        assert_eq!(value["function"], "demo");
    }

    #[test]
    fn test_warn_level_wire_name() {
        assert_eq!(LogLevel::Warn.as_str(), "warning");
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
