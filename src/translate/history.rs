use chrono::Local;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::utils::app_config_dir;

pub const HISTORY_FILENAME: &str = "lookup_history.yaml";
pub const MAX_HISTORY_ENTRIES: usize = 50;

static HISTORY_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// One completed lookup, newest entries last on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupHistoryEntry {
    pub timestamp: String,
    pub original: String,
    pub translation: String,
    pub source_language: String,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct HistoryFile {
    #[serde(default)]
    entries: Vec<LookupHistoryEntry>,
}

pub fn history_file_path() -> PathBuf {
    app_config_dir().join(HISTORY_FILENAME)
}

pub fn record_entry(
    original: &str,
    translation: &str,
    source_language: &str,
    latency_ms: u128,
) -> anyhow::Result<usize> {
    record_entry_at(
        &history_file_path(),
        original,
        translation,
        source_language,
        latency_ms,
    )
}

pub fn load_entries() -> anyhow::Result<Vec<LookupHistoryEntry>> {
    load_entries_at(&history_file_path())
}

fn record_entry_at(
    path: &Path,
    original: &str,
    translation: &str,
    source_language: &str,
    latency_ms: u128,
) -> anyhow::Result<usize> {
    let _guard = HISTORY_LOCK.lock().unwrap();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let existing = if path.exists() {
        let yaml = fs::read_to_string(path)?;
        serde_yaml::from_str::<HistoryFile>(&yaml).unwrap_or_default()
    } else {
        HistoryFile::default()
    };

    let mut entries = existing.entries;
    entries.push(LookupHistoryEntry {
        timestamp: Local::now().to_rfc3339(),
        original: original.to_string(),
        translation: translation.to_string(),
        source_language: source_language.to_string(),
        latency_ms: latency_ms.min(u64::MAX as u128) as u64,
    });
    if entries.len() > MAX_HISTORY_ENTRIES {
        let remove_count = entries.len() - MAX_HISTORY_ENTRIES;
        entries.drain(0..remove_count);
    }
    let total = entries.len();

    let file = HistoryFile { entries };
    let yaml = serde_yaml::to_string(&file)?;
    let tmp_path = path.with_extension("yaml.tmp");
    let mut fh = fs::File::create(&tmp_path)?;
    fh.write_all(yaml.as_bytes())?;
    fh.flush()?;
    fs::rename(tmp_path, path)?;
    Ok(total)
}

fn load_entries_at(path: &Path) -> anyhow::Result<Vec<LookupHistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let yaml = fs::read_to_string(path)?;
    let file = serde_yaml::from_str::<HistoryFile>(&yaml).unwrap_or_default();
    Ok(file.entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_history_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "hoverlens-history-{}-{}.yaml",
            tag,
            std::process::id()
        ))
    }

    #[test]
    fn record_and_load_round_trip() {
        let path = temp_history_path("roundtrip");
        let _ = fs::remove_file(&path);

        record_entry_at(&path, "こんにちは", "你好", "ja", 340).unwrap();
        let entries = load_entries_at(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].original, "こんにちは");
        assert_eq!(entries[0].latency_ms, 340);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn history_is_capped_at_newest_entries() {
        let path = temp_history_path("cap");
        let _ = fs::remove_file(&path);

        for i in 0..(MAX_HISTORY_ENTRIES + 5) {
            record_entry_at(&path, &format!("word{}", i), "译文", "ja", 1).unwrap();
        }
        let entries = load_entries_at(&path).unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries.last().unwrap().original, format!("word{}", MAX_HISTORY_ENTRIES + 4));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = temp_history_path("missing");
        let _ = fs::remove_file(&path);
        assert!(load_entries_at(&path).unwrap().is_empty());
    }
}
