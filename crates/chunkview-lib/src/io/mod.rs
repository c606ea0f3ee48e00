pub mod csv;
pub mod edf;
pub mod events;
pub mod text;
pub mod wfdb;

use crate::annotations::Annotation;
use crate::signal::Recording;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// A recording read fully into memory, one row per channel.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub recording: Recording,
    pub data: Vec<Vec<f64>>,
}

impl LoadedRecording {
    pub fn new(
        file_path: impl Into<String>,
        channel_labels: Vec<String>,
        sample_rate: f64,
        data: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if data.len() != channel_labels.len() {
            bail!(
                "{} channel labels for {} data rows",
                channel_labels.len(),
                data.len()
            );
        }
        let total_samples = data.first().map(Vec::len).unwrap_or(0);
        if let Some((idx, row)) = data
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != total_samples)
        {
            bail!(
                "channel {} has {} samples, expected {}",
                channel_labels[idx],
                row.len(),
                total_samples
            );
        }
        let recording = Recording::new(file_path, channel_labels, sample_rate, total_samples)?;
        Ok(Self { recording, data })
    }

    /// Copy `len` samples of every channel from `start`, truncated at the end.
    pub fn slice(&self, start: usize, len: usize) -> Vec<Vec<f64>> {
        let end = start.saturating_add(len).min(self.recording.total_samples);
        let start = start.min(end);
        self.data.iter().map(|row| row[start..end].to_vec()).collect()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Load a recording by extension. `fs` is required for headerless text and
/// for CSV files without a time column.
pub fn load_recording(path: &Path, fs: Option<f64>) -> Result<LoadedRecording> {
    let loaded = match extension(path).as_str() {
        "edf" => edf::load_edf(path)?,
        "csv" => csv::load_csv(path, fs)?,
        "txt" | "dat" => {
            let fs = fs.context("headerless text needs an explicit sample rate (--fs)")?;
            text::load_text(path, fs)?
        }
        other => bail!("unsupported recording format '.{other}' ({})", path.display()),
    };
    log::info!(
        "loaded {} channel(s) x {} samples from {}",
        loaded.recording.channel_count(),
        loaded.recording.total_samples,
        path.display()
    );
    Ok(loaded)
}

/// Load annotations for `recording` from a sidecar file.
///
/// `.tsv` is read as BIDS events, `.atr` as a WFDB annotation stream, `.json`
/// as a list of annotations and `.txt` as one sample index per line.
pub fn load_annotations(path: &Path, recording: &Recording) -> Result<Vec<Annotation>> {
    let file_path = recording.file_path.as_str();
    match extension(path).as_str() {
        "tsv" => events::load_events_annotations(path, file_path, recording.sample_rate),
        "atr" => wfdb::load_wfdb_annotations(path, file_path),
        "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut annotations: Vec<Annotation> = serde_json::from_str(&text)
                .with_context(|| format!("parsing annotations {}", path.display()))?;
            for annotation in &mut annotations {
                annotation.file_path = file_path.to_string();
            }
            Ok(annotations)
        }
        "txt" => Ok(text::read_event_indices(path)?
            .into_iter()
            .enumerate()
            .map(|(n, sample)| Annotation {
                id: format!("idx-{}", n + 1),
                file_path: file_path.to_string(),
                start_time: sample,
                end_time: None,
                text: "event".into(),
                channel: None,
            })
            .collect()),
        other => bail!("unsupported annotation format '.{other}' ({})", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slice_truncates_at_end() {
        let loaded = LoadedRecording::new(
            "mem",
            vec!["a".into(), "b".into()],
            10.0,
            vec![(0..10).map(f64::from).collect(), vec![1.0; 10]],
        )
        .unwrap();
        let rows = loaded.slice(8, 5);
        assert_eq!(rows[0], vec![8.0, 9.0]);
        assert_eq!(rows[1].len(), 2);
        assert!(loaded.slice(20, 5)[0].is_empty());
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = LoadedRecording::new(
            "mem",
            vec!["a".into(), "b".into()],
            10.0,
            vec![vec![0.0; 3], vec![0.0; 2]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("channel b"));
    }

    #[test]
    fn dispatches_on_extension() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("trace.txt");
        std::fs::write(&txt, "1.0\n2.0\n3.0\n").unwrap();
        assert!(load_recording(&txt, None).is_err());
        let loaded = load_recording(&txt, Some(100.0)).unwrap();
        assert_eq!(loaded.recording.total_samples, 3);

        let bogus = dir.path().join("trace.xyz");
        std::fs::write(&bogus, "").unwrap();
        assert!(load_recording(&bogus, Some(1.0)).is_err());
    }

    #[test]
    fn json_annotations_take_the_recording_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(
            &path,
            r#"[{"id":"n1","filePath":"elsewhere","startTime":12,"text":"blink"}]"#,
        )
        .unwrap();
        let recording = Recording::new("rec.csv", vec!["a".into()], 10.0, 100).unwrap();
        let annotations = load_annotations(&path, &recording).unwrap();
        assert_eq!(annotations[0].file_path, "rec.csv");
        assert_eq!(annotations[0].start_time, 12);
    }
}
