use crate::annotations::Annotation;
use crate::error::FetchError;
use crate::io::{self, LoadedRecording};
use crate::signal::Recording;
use crate::source::{DataSource, FetchRequest, FetchResponse};
use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// Serves chunks from recordings held in memory, reading files on first use.
#[derive(Debug, Default)]
pub struct LocalSource {
    recordings: HashMap<String, LoadedRecording>,
    annotations: HashMap<String, Vec<Annotation>>,
    /// Rate for formats that do not carry one.
    fs_hint: Option<f64>,
}

impl LocalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(fs: Option<f64>) -> Self {
        Self {
            fs_hint: fs,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, loaded: LoadedRecording) -> Recording {
        let recording = loaded.recording.clone();
        self.recordings.insert(recording.file_path.clone(), loaded);
        recording
    }

    /// Read a recording from disk and serve it under its path.
    pub fn open(&mut self, path: &Path, fs: Option<f64>) -> Result<Recording> {
        Ok(self.insert(io::load_recording(path, fs)?))
    }

    pub fn set_annotations(&mut self, file_path: &str, annotations: Vec<Annotation>) {
        self.annotations.insert(file_path.to_string(), annotations);
    }

    pub fn annotations(&self, file_path: &str) -> &[Annotation] {
        self.annotations
            .get(file_path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn loaded(&mut self, file_path: &str) -> Result<&LoadedRecording, FetchError> {
        if !self.recordings.contains_key(file_path) {
            let loaded = io::load_recording(Path::new(file_path), self.fs_hint)
                .map_err(|err| FetchError::Source(format!("{err:#}")))?;
            self.recordings.insert(file_path.to_string(), loaded);
        }
        self.recordings
            .get(file_path)
            .ok_or_else(|| FetchError::Source(format!("unknown recording {file_path}")))
    }
}

impl DataSource for LocalSource {
    fn describe(&mut self, file_path: &str) -> Result<Recording, FetchError> {
        Ok(self.loaded(file_path)?.recording.clone())
    }

    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let annotations = request
            .include_navigation_info
            .then(|| self.annotations(&request.filename).to_vec());
        let loaded = self.loaded(&request.filename)?;
        let recording = &loaded.recording;
        if request.chunk_start >= recording.total_samples {
            return Err(FetchError::OutOfRange {
                start: request.chunk_start,
                end: request.chunk_start.saturating_add(request.chunk_size),
                total: recording.total_samples,
            });
        }
        let mut data = loaded.slice(request.chunk_start, request.chunk_size);
        if let Some(options) = &request.preprocessing_options {
            for row in &mut data {
                *row = options.apply(row, recording.sample_rate);
            }
        }
        let len = data.first().map(Vec::len).unwrap_or(0);
        debug!(
            "serving {} @ {} ({len} of {} samples)",
            request.filename, request.chunk_start, request.chunk_size
        );
        Ok(FetchResponse {
            data,
            channel_labels: recording.channel_labels.clone(),
            sampling_frequency: recording.sample_rate,
            chunk_size: len,
            chunk_start: request.chunk_start,
            total_samples: recording.total_samples,
            annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{Normalization, PreprocessingConfig};

    fn source() -> (LocalSource, Recording) {
        let mut source = LocalSource::new();
        let loaded = LoadedRecording::new(
            "mem.csv",
            vec!["a".into(), "b".into()],
            10.0,
            vec![
                (0..25).map(f64::from).collect(),
                (0..25).map(|i| f64::from(i) * 2.0).collect(),
            ],
        )
        .unwrap();
        let recording = source.insert(loaded);
        (source, recording)
    }

    fn request(start: usize) -> FetchRequest {
        FetchRequest {
            filename: "mem.csv".into(),
            chunk_start: start,
            chunk_size: 10,
            preprocessing_options: None,
            include_navigation_info: false,
        }
    }

    #[test]
    fn last_chunk_is_short() {
        let (mut source, recording) = source();
        let response = source.fetch(&request(20)).unwrap();
        assert_eq!(response.chunk_size, 5);
        let validated = response.into_chunk(&recording, &request(20)).unwrap();
        assert_eq!(validated.chunk.len(), 5);
        assert_eq!(validated.chunk.chunk_size, 10);
        assert_eq!(validated.chunk.channel("b").unwrap()[0], 40.0);
    }

    #[test]
    fn start_past_end_is_out_of_range() {
        let (mut source, _) = source();
        assert!(matches!(
            source.fetch(&request(25)),
            Err(FetchError::OutOfRange { total: 25, .. })
        ));
        assert!(matches!(
            source.describe("other.csv"),
            Err(FetchError::Source(_))
        ));
    }

    #[test]
    fn reads_files_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        std::fs::write(&path, "1\n2\n3\n").unwrap();
        let file_path = path.display().to_string();
        let mut source = LocalSource::with_sample_rate(Some(2.0));
        let recording = source.describe(&file_path).unwrap();
        assert_eq!(recording.total_samples, 3);
        assert_eq!(recording.sample_rate, 2.0);
        let mut req = request(0);
        req.filename = file_path;
        assert_eq!(source.fetch(&req).unwrap().data[0], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn applies_preprocessing_per_channel() {
        let (mut source, _) = source();
        let mut req = request(0);
        req.preprocessing_options = Some(PreprocessingConfig {
            normalization: Normalization::Minmax,
            ..Default::default()
        });
        let response = source.fetch(&req).unwrap();
        assert_eq!(response.data[0][0], 0.0);
        assert_eq!(response.data[0][9], 1.0);
        assert_eq!(response.data[1][9], 1.0);
    }

    #[test]
    fn navigation_info_carries_annotations() {
        let (mut source, _) = source();
        source.set_annotations(
            "mem.csv",
            vec![Annotation {
                id: "a1".into(),
                file_path: "mem.csv".into(),
                start_time: 3,
                end_time: None,
                text: "x".into(),
                channel: None,
            }],
        );
        assert!(source.fetch(&request(0)).unwrap().annotations.is_none());
        let mut req = request(0);
        req.include_navigation_info = true;
        assert_eq!(source.fetch(&req).unwrap().annotations.unwrap().len(), 1);
    }
}
