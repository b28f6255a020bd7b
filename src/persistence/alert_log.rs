// src/persistence/alert_log.rs
//
// Append-only alert log: a pretty-printed JSON array of entries, the
// format served to the dashboard. All writes go through one task, so
// concurrent clip workers can never interleave their read-modify-write
// cycles and lose entries.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::pipeline::PipelineMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub camera: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u32>,
}

/// Read the existing log. A missing file is an empty log; an unreadable or
/// corrupt one is replaced rather than blocking new entries.
pub fn read_entries(path: &Path) -> Vec<LogEntry> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Alert log {} unreadable ({}), starting fresh", path.display(), e);
            return Vec::new();
        }
    };
    if contents.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("Alert log {} is corrupt ({}), starting fresh", path.display(), e);
        Vec::new()
    })
}

/// Append one entry and rewrite the file through a temp file + rename so a
/// crash mid-write never leaves a truncated log behind.
pub fn append_entry(path: &Path, entry: LogEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }

    let mut entries = read_entries(path);
    entries.push(entry);

    let json = serde_json::to_string_pretty(&entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Handle for submitting entries to the log writer task.
#[derive(Debug, Clone)]
pub struct AlertLogHandle {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl AlertLogHandle {
    pub fn append(&self, entry: LogEntry) {
        if self.tx.send(entry).is_err() {
            error!("Alert log writer has stopped, entry dropped");
        }
    }
}

pub struct AlertLogWriter;

impl AlertLogWriter {
    /// Start the single writer task. It runs until every handle is dropped.
    pub fn spawn(path: PathBuf, metrics: PipelineMetrics) -> (AlertLogHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogEntry>();

        let task = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let path = path.clone();
                let file = entry.file.clone();
                let result = tokio::task::spawn_blocking(move || append_entry(&path, entry)).await;
                match result {
                    Ok(Ok(())) => debug!("Logged alert {}", file),
                    Ok(Err(e)) => {
                        metrics.inc(&metrics.log_failures);
                        error!("Failed to append alert log: {:#}", e);
                    }
                    Err(e) => {
                        metrics.inc(&metrics.log_failures);
                        error!("Alert log write panicked: {}", e);
                    }
                }
            }
            debug!("Alert log writer stopped");
        });

        (AlertLogHandle { tx }, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u32) -> LogEntry {
        LogEntry {
            camera: "cam".to_string(),
            timestamp: "20240101_120000".to_string(),
            kind: "Pacing".to_string(),
            file: format!("clips/{}.mp4", n),
            track_id: Some(n),
        }
    }

    #[test]
    fn test_append_creates_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/detections_log.json");
        append_entry(&path, entry(1)).unwrap();
        append_entry(&path, entry(2)).unwrap();
        let entries = read_entries(&path);
        assert_eq!(entries, vec![entry(1), entry(2)]);
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(json["type"], "Pacing");
        assert_eq!(json["camera"], "cam");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_corrupt_log_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, "{not json").unwrap();
        append_entry(&path, entry(5)).unwrap();
        assert_eq!(read_entries(&path), vec![entry(5)]);
    }

    #[test]
    fn test_reads_entries_without_track_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(
            &path,
            r#"[{"camera":"c","timestamp":"t","type":"Pacing","file":"f.mp4"}]"#,
        )
        .unwrap();
        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track_id, None);
    }

    #[tokio::test]
    async fn test_writer_keeps_every_concurrent_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let (handle, task) = AlertLogWriter::spawn(path.clone(), PipelineMetrics::new());

        let mut senders = Vec::new();
        for n in 0..20 {
            let h = handle.clone();
            senders.push(tokio::spawn(async move { h.append(entry(n)) }));
        }
        for s in senders {
            s.await.unwrap();
        }
        drop(handle);
        task.await.unwrap();

        assert_eq!(read_entries(&path).len(), 20);
    }
}
