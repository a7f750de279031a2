use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize as _;
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::debug;

use crate::{StoreError, TriggerTables};

/// Load/save pair for the table set, backed by one JSON document.
///
/// Holds nothing but the target path; every call reads or writes the file in
/// full.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next document is staged in before it replaces the
    /// real one.
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Reads the table set. A missing file is an empty table set.
    ///
    /// # Errors
    ///
    /// [`StoreError::Format`] when the file is not a valid table set,
    /// [`StoreError::Io`] when it exists but cannot be read.
    pub async fn load(&self) -> Result<TriggerTables, StoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No trigger file yet; starting empty");
                return Ok(TriggerTables::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes the full table set, replacing the previous document atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when staging or renaming fails; the previous
    /// document is left in place.
    pub async fn save(&self, tables: &TriggerTables) -> Result<(), StoreError> {
        let staging = self.staging_path();
        let result = self.write_staged(tables, &staging).await;
        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }
        result.map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Directory holding the file; `.` for a bare file name.
    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    async fn write_staged(&self, tables: &TriggerTables, staging: &Path) -> io::Result<()> {
        let bytes = encode(tables)?;
        let dir = self.parent_dir();
        fs::create_dir_all(dir).await?;
        let mut file = fs::File::create(staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(staging, &self.path).await?;
        // The rename is only durable once the directory entry is flushed.
        #[cfg(unix)]
        fs::File::open(dir).await?.sync_all().await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Saved trigger file");
        Ok(())
    }
}

// Four-space indentation, matching files written by earlier deployments.
fn encode(tables: &TriggerTables) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    tables.serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoleId;

    fn sample() -> TriggerTables {
        TriggerTables::default()
            .with_responder("hello", "Hi!")
            .and_then(|t| t.with_responder("bye", "See you"))
            .and_then(|t| t.with_role_word("verify", RoleId::from("member")))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("data.json"));
        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested").join("data.json"));
        let tables = sample();
        file.save(&tables).await.unwrap();

        let loaded = file.load().await.unwrap();
        assert_eq!(loaded, tables);
        let keys: Vec<&str> = loaded.responders().keys().map(|w| w.as_str()).collect();
        assert_eq!(keys, ["hello", "bye"]);
        assert!(!file.staging_path().exists());
    }

    #[test]
    fn parent_dir_falls_back_to_current_dir() {
        assert_eq!(JsonFile::new("data.json").parent_dir(), Path::new("."));
        assert_eq!(
            JsonFile::new("state/data.json").parent_dir(),
            Path::new("state")
        );
    }

    #[tokio::test]
    async fn save_replaces_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("data.json"));
        file.save(&sample()).await.unwrap();
        file.save(&TriggerTables::default()).await.unwrap();

        assert!(file.load().await.unwrap().is_empty());
        assert!(!file.staging_path().exists());
    }

    #[tokio::test]
    async fn writes_four_space_indented_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("data.json"));
        file.save(&sample()).await.unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("{\n    \"responders\": {\n        \"hello\": \"Hi!\""));
    }

    #[tokio::test]
    async fn malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"responders\": [").unwrap();
        let err = JsonFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Format { .. }));
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("data.json"));
        file.save(&sample()).await.unwrap();

        // A directory squatting on the staging path makes the write fail.
        std::fs::create_dir(file.staging_path()).unwrap();
        let err = file.save(&TriggerTables::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(file.load().await.unwrap(), sample());
    }
}
