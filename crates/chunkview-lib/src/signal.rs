use crate::error::{ConversionError, RecordingError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Metadata of an opened multichannel recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub file_path: String,
    pub channel_labels: Vec<String>,
    pub sample_rate: f64,
    pub total_samples: usize,
}

impl Recording {
    pub fn new(
        file_path: impl Into<String>,
        channel_labels: Vec<String>,
        sample_rate: f64,
        total_samples: usize,
    ) -> Result<Self, RecordingError> {
        let recording = Self {
            file_path: file_path.into(),
            channel_labels,
            sample_rate,
            total_samples,
        };
        recording.validate()?;
        Ok(recording)
    }

    pub fn validate(&self) -> Result<(), RecordingError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(RecordingError::InvalidSampleRate(self.sample_rate));
        }
        let mut seen = HashSet::new();
        for label in &self.channel_labels {
            if !seen.insert(label.as_str()) {
                return Err(RecordingError::DuplicateChannel(label.clone()));
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.total_samples as f64 / self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channel_labels.len()
    }
}

/// A contiguous, validated slice of a recording. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub chunk_start: usize,
    /// Requested size; `len()` is shorter only at the end of the recording.
    pub chunk_size: usize,
    pub sampling_frequency: f64,
    pub channel_labels: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

impl Chunk {
    /// Samples per channel actually present.
    pub fn len(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sampling_frequency
    }

    /// Absolute time of the first sample, in seconds.
    pub fn origin_seconds(&self) -> f64 {
        self.chunk_start as f64 / self.sampling_frequency
    }

    pub fn channel(&self, label: &str) -> Option<&[f64]> {
        self.channel_labels
            .iter()
            .position(|candidate| candidate == label)
            .and_then(|idx| self.data.get(idx))
            .map(Vec::as_slice)
    }

    /// Adapt the chunk into the per-channel traces a renderer draws.
    ///
    /// An empty selection means every channel.
    pub fn to_traces(&self, selected: &[String]) -> Result<Vec<ChannelTrace>, ConversionError> {
        if self.channel_labels.is_empty() {
            return Err(ConversionError::NoChannels);
        }
        let labels: Vec<&String> = if selected.is_empty() {
            self.channel_labels.iter().collect()
        } else {
            selected.iter().collect()
        };
        labels
            .into_iter()
            .map(|label| {
                let data = self
                    .channel(label)
                    .ok_or_else(|| ConversionError::UnknownChannel(label.clone()))?;
                Ok(ChannelTrace {
                    label: label.clone(),
                    series: TimeSeries {
                        fs: self.sampling_frequency,
                        data: data.to_vec(),
                    },
                })
            })
            .collect()
    }
}

/// One labelled channel of a chunk, in renderer shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTrace {
    pub label: String,
    pub series: TimeSeries,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Chunk {
        Chunk {
            chunk_start: 512,
            chunk_size: 4,
            sampling_frequency: 256.0,
            channel_labels: vec!["Fp1".into(), "Fp2".into()],
            data: vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
        }
    }

    #[test]
    fn recording_rejects_duplicate_labels() {
        let err = Recording::new("a.edf", vec!["C3".into(), "C3".into()], 256.0, 10).unwrap_err();
        assert!(matches!(err, RecordingError::DuplicateChannel(label) if label == "C3"));
    }

    #[test]
    fn recording_rejects_non_positive_rate() {
        assert!(Recording::new("a.edf", vec![], 0.0, 10).is_err());
        assert!(Recording::new("a.edf", vec![], f64::NAN, 10).is_err());
    }

    #[test]
    fn chunk_timing() {
        let chunk = chunk();
        assert_eq!(chunk.len(), 4);
        assert!((chunk.origin_seconds() - 2.0).abs() < 1e-12);
        assert!((chunk.duration() - 4.0 / 256.0).abs() < 1e-12);
    }

    #[test]
    fn traces_follow_selection_order() {
        let traces = chunk().to_traces(&["Fp2".into(), "Fp1".into()]).unwrap();
        assert_eq!(traces[0].label, "Fp2");
        assert_eq!(traces[0].series.data, vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(traces[1].series.fs, 256.0);
    }

    #[test]
    fn unknown_selected_channel_is_unusable() {
        let err = chunk().to_traces(&["O1".into()]).unwrap_err();
        assert!(matches!(err, ConversionError::UnknownChannel(label) if label == "O1"));
    }
}
