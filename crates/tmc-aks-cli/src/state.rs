//! Configuration and state files.
//!
//! Both are JSON renderings of [`ClusterResourceData`]. The state file is
//! replaced atomically: the new content is written to a temporary file in
//! the same directory and renamed over the old one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tmc_aks_control::ClusterResourceData;

/// Errors reading or writing configuration and state files.
#[derive(Debug, Error)]
pub enum StateError {
    /// File could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// File content is not a valid cluster snapshot.
    #[error("{path}: invalid cluster JSON: {source}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

type Result<T> = std::result::Result<T, StateError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StateError + '_ {
    move |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a cluster configuration file.
pub fn load_config(path: &Path) -> Result<ClusterResourceData> {
    let raw = fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&raw).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The local state of one managed cluster.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored snapshot, `None` if the file does not exist.
    pub fn load(&self) -> Result<Option<ClusterResourceData>> {
        match fs::metadata(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&self.path)(e)),
            Ok(_) => load_config(&self.path).map(Some),
        }
    }

    /// Replace the stored snapshot.
    pub fn save(&self, data: &ClusterResourceData) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let json = serde_json::to_vec_pretty(data).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(&self.path))?;
        tmp.write_all(&json).map_err(io_error(&self.path))?;
        tmp.write_all(b"\n").map_err(io_error(&self.path))?;
        tmp.persist(&self.path)
            .map_err(|e| io_error(&self.path)(e.error))?;
        Ok(())
    }

    /// Delete the state file; a missing file is fine.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(io_error(&self.path)(e)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmc_aks_control::ClusterFullName;

    fn snapshot() -> ClusterResourceData {
        let mut data = ClusterResourceData::new(&ClusterFullName::new(
            "test-cred",
            "sub-id",
            "resource-group",
            "test-cluster",
        ));
        data.id = Some("test-uid".into());
        data
    }

    #[test]
    fn missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));
        assert!(state.load().unwrap().is_none());
        state.remove().unwrap();
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::new(dir.path().join("state.json"));

        state.save(&snapshot()).unwrap();
        assert_eq!(state.load().unwrap(), Some(snapshot()));

        let mut changed = snapshot();
        changed.ready_wait_timeout = "45m".into();
        state.save(&changed).unwrap();
        assert_eq!(state.load().unwrap().unwrap().ready_wait_timeout, "45m");

        state.remove().unwrap();
        assert!(!state.path().exists());
    }

    #[test]
    fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, StateError::Parse { .. }));
        assert!(err.to_string().contains("cluster.json"));
    }
}
