/// JSON file persistence for history files and `live.json`.
///
/// Files are pretty-printed and replaced through a sibling temporary file,
/// so a crash mid-write never leaves a truncated history behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{DamHistory, LiveSnapshot, StoreError};

/// File-name-safe form of a display name: ASCII letters, digits, `-` and
/// `_` are kept, everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Location of a dam's history file.
pub fn history_path(history_dir: &Path, dam_name: &str) -> PathBuf {
    history_dir.join(format!("{}.json", sanitize_file_name(dam_name)))
}

/// Creates the history folder if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

/// Reads a history file. `Ok(None)` when it does not exist yet.
pub fn load_history(path: &Path) -> Result<Option<DamHistory>, StoreError> {
    read_json(path)
}

/// Reads `live.json`, or an empty snapshot when there is none.
pub fn load_snapshot(path: &Path) -> Result<LiveSnapshot, StoreError> {
    Ok(read_json(path)?.unwrap_or_default())
}

pub fn save_history(path: &Path, history: &DamHistory) -> Result<(), StoreError> {
    write_json(path, history)
}

pub fn save_snapshot(path: &Path, snapshot: &LiveSnapshot) -> Result<(), StoreError> {
    write_json(path, snapshot)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut body = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    body.push('\n');

    let tmp = tmp_path(path);
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    fs::write(&tmp, body).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        write_err(source)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::fixture_norfork_spec;
    use crate::model::DamRecord;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("damwatch-store-{}-{}", label, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Norfork"), "Norfork");
        assert_eq!(sanitize_file_name("Table Rock"), "Table_Rock");
        assert_eq!(sanitize_file_name("Bull Shoals/Lake.v2"), "Bull_Shoals_Lake_v2");
        assert_eq!(sanitize_file_name("Greers-Ferry_1"), "Greers-Ferry_1");
    }

    #[test]
    fn test_history_path_uses_sanitized_name() {
        let path = history_path(Path::new("history"), "Table Rock");
        assert_eq!(path, PathBuf::from("history").join("Table_Rock.json"));
    }

    #[test]
    fn test_missing_history_is_none() {
        let dir = scratch_dir("missing");
        let loaded = load_history(&dir.join("Nowhere.json")).unwrap();
        assert!(loaded.is_none());
        let snapshot = load_snapshot(&dir.join("live.json")).unwrap();
        assert!(snapshot.dams.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_history_is_an_error() {
        let dir = scratch_dir("corrupt");
        let path = dir.join("Norfork.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_history(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {:?}", err);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_saved_history_reloads_and_is_stable() {
        let dir = scratch_dir("save");
        let path = history_path(&dir, "Norfork");

        let mut history = DamHistory::from(&fixture_norfork_spec());
        history.data.push(DamRecord {
            water_level: Some("554.21".to_string()),
            source_timestamp: Some("2025-06-10T15:00:00Z".to_string()),
            ..Default::default()
        });

        save_history(&path, &history).unwrap();
        let first = fs::read(&path).unwrap();
        let reloaded = load_history(&path).unwrap().unwrap();
        assert_eq!(reloaded, history);

        save_history(&path, &reloaded).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first, "re-saving must be byte-identical");
        assert!(!tmp_path(&path).exists(), "temporary file must be gone");
        let _ = fs::remove_dir_all(&dir);
    }
}
