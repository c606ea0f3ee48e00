use crate::preprocess::PreprocessingConfig;
use crate::window::{AbsoluteWindow, ViewWindow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Saved position of one file, restored verbatim when it is reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub chunk_start: usize,
    pub chunk_size_seconds: f64,
    pub window: ViewWindow,
    pub absolute_window: AbsoluteWindow,
    pub zoom_scalar: f64,
    #[serde(default)]
    pub preprocessing_options: PreprocessingConfig,
    #[serde(default)]
    pub selected_channels: Vec<String>,
}

pub trait ViewStateStore {
    fn load(&self, file_path: &str) -> Result<Option<ViewState>>;
    fn save(&mut self, file_path: &str, state: &ViewState) -> Result<()>;
}

/// Session-scoped store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: HashMap<String, ViewState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStateStore for MemoryStore {
    fn load(&self, file_path: &str) -> Result<Option<ViewState>> {
        Ok(self.states.get(file_path).cloned())
    }

    fn save(&mut self, file_path: &str, state: &ViewState) -> Result<()> {
        self.states.insert(file_path.to_string(), state.clone());
        Ok(())
    }
}

/// All view states in one JSON document, keyed by file path.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, ViewState>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("reading view state {}", self.path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("parsing view state {}", self.path.display()))
    }
}

impl ViewStateStore for JsonFileStore {
    fn load(&self, file_path: &str) -> Result<Option<ViewState>> {
        Ok(self.read_all()?.remove(file_path))
    }

    fn save(&mut self, file_path: &str, state: &ViewState) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(file_path.to_string(), state.clone());
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &all)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("writing view state {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowLimits;
    use tempfile::tempdir;

    fn state(start: usize) -> ViewState {
        let window = ViewWindow::new(1.0, 3.0, 10.0, &WindowLimits::default()).unwrap();
        ViewState {
            chunk_start: start,
            chunk_size_seconds: 10.0,
            window,
            absolute_window: window.absolute(start as f64 / 256.0),
            zoom_scalar: window.zoom_scalar(10.0),
            preprocessing_options: PreprocessingConfig::default(),
            selected_channels: vec!["Fz".into()],
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        assert!(store.load("a.edf").unwrap().is_none());
        store.save("a.edf", &state(2560)).unwrap();
        assert_eq!(store.load("a.edf").unwrap(), Some(state(2560)));
    }

    #[test]
    fn json_store_keeps_each_file() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("views.json"));
        store.save("a.edf", &state(0)).unwrap();
        store.save("b.edf", &state(5120)).unwrap();
        store.save("a.edf", &state(2560)).unwrap();
        let reopened = JsonFileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load("a.edf").unwrap(), Some(state(2560)));
        assert_eq!(reopened.load("b.edf").unwrap(), Some(state(5120)));
    }

    #[test]
    fn json_layout_uses_wire_names() {
        let json = serde_json::to_value(state(0)).unwrap();
        assert!(json.get("absoluteWindow").is_some());
        assert!(json.get("chunkSizeSeconds").is_some());
        assert_eq!(json["window"]["start"], 1.0);
    }
}
