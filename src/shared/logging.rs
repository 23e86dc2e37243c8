use super::state_paths::StatePaths;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

pub fn append_runtime_log(paths: &StatePaths, level: LogLevel, event: &str, message: &str) {
    append_runtime_log_fields(paths, level, event, message, &[]);
}

pub fn append_runtime_log_fields(
    paths: &StatePaths,
    level: LogLevel,
    event: &str,
    message: &str,
    fields: &[(&str, &str)],
) {
    let mut payload = Map::new();
    payload.insert(
        "timestamp".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    payload.insert("level".to_string(), Value::String(level.as_str().to_string()));
    payload.insert("event".to_string(), Value::String(event.to_string()));
    payload.insert("message".to_string(), Value::String(message.to_string()));
    for (key, value) in fields {
        payload.insert((*key).to_string(), Value::String((*value).to_string()));
    }

    let Ok(line) = serde_json::to_string(&Value::Object(payload)) else {
        return;
    };

    let path = paths.runtime_log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_lines_are_json_objects_with_extra_fields() {
        let dir = tempdir().expect("tempdir");
        let paths = StatePaths::new(dir.path());
        append_runtime_log(&paths, LogLevel::Info, "startup", "ready");
        append_runtime_log_fields(
            &paths,
            LogLevel::Warn,
            "massban.candidate_failed",
            "ban failed",
            &[("job_id", "00112233aabbccdd"), ("cause", "not_found")],
        );

        let raw = fs::read_to_string(paths.runtime_log_path()).expect("log");
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "startup");
        assert_eq!(lines[1]["level"], "warn");
        assert_eq!(lines[1]["cause"], "not_found");
    }
}
