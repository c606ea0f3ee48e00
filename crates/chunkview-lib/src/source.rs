use crate::annotations::Annotation;
use crate::error::FetchError;
use crate::preprocess::PreprocessingConfig;
use crate::signal::{Chunk, Recording};
use log::warn;
use serde::{Deserialize, Serialize};

/// What the navigator asks a data source for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub filename: String,
    pub chunk_start: usize,
    pub chunk_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing_options: Option<PreprocessingConfig>,
    pub include_navigation_info: bool,
}

/// Raw chunk payload as returned by a data source, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    #[serde(default)]
    pub data: Vec<Vec<f64>>,
    pub channel_labels: Vec<String>,
    pub sampling_frequency: f64,
    /// Samples actually returned, shorter than requested at end of file.
    pub chunk_size: usize,
    pub chunk_start: usize,
    pub total_samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

/// Serves recordings and chunks. Implementations own their own I/O, timeouts and retries.
pub trait DataSource {
    fn describe(&mut self, file_path: &str) -> Result<Recording, FetchError>;
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// A validated response: the chunk plus any annotations that came with it.
#[derive(Debug, Clone)]
pub struct ValidatedChunk {
    pub chunk: Chunk,
    pub annotations: Option<Vec<Annotation>>,
}

impl FetchResponse {
    /// Check the payload against the recording and request. Inconsistent
    /// payloads are rejected whole; no sample is coerced.
    pub fn into_chunk(
        self,
        recording: &Recording,
        request: &FetchRequest,
    ) -> Result<ValidatedChunk, FetchError> {
        if self.data.is_empty() {
            return Err(FetchError::MissingData);
        }
        if self.data.len() != self.channel_labels.len() {
            return Err(FetchError::ChannelMismatch {
                data: self.data.len(),
                labels: self.channel_labels.len(),
            });
        }
        let expected = self.data[0].len();
        for (channel, row) in self.data.iter().enumerate() {
            if row.len() != expected {
                return Err(FetchError::RaggedChannels {
                    channel,
                    len: row.len(),
                    expected,
                });
            }
            if let Some(index) = row.iter().position(|value| !value.is_finite()) {
                return Err(FetchError::NonFiniteSample { channel, index });
            }
        }
        if expected == 0 {
            return Err(FetchError::EmptyChunk);
        }
        let rate_error = (self.sampling_frequency - recording.sample_rate).abs();
        if !self.sampling_frequency.is_finite() || rate_error > 1e-9 * recording.sample_rate {
            return Err(FetchError::SampleRateMismatch {
                expected: recording.sample_rate,
                actual: self.sampling_frequency,
            });
        }
        if self.chunk_start != request.chunk_start {
            return Err(FetchError::StartMismatch {
                requested: request.chunk_start,
                actual: self.chunk_start,
            });
        }
        if self.chunk_size != expected {
            return Err(FetchError::LengthMismatch {
                declared: self.chunk_size,
                actual: expected,
            });
        }
        if expected > request.chunk_size {
            return Err(FetchError::Oversized {
                len: expected,
                requested: request.chunk_size,
            });
        }
        let end = self.chunk_start + expected;
        if end > recording.total_samples {
            return Err(FetchError::OutOfRange {
                start: self.chunk_start,
                end,
                total: recording.total_samples,
            });
        }
        // Only the final chunk may come back short.
        if expected < request.chunk_size && end != recording.total_samples {
            return Err(FetchError::Truncated {
                len: expected,
                requested: request.chunk_size,
            });
        }
        if self.total_samples != recording.total_samples {
            warn!(
                "{} reports {} samples, recording has {}",
                request.filename, self.total_samples, recording.total_samples
            );
        }
        Ok(ValidatedChunk {
            chunk: Chunk {
                chunk_start: self.chunk_start,
                chunk_size: request.chunk_size,
                sampling_frequency: self.sampling_frequency,
                channel_labels: self.channel_labels,
                data: self.data,
            },
            annotations: self.annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> Recording {
        Recording::new("rec.csv", vec!["A".into(), "B".into()], 100.0, 1000).unwrap()
    }

    fn request(start: usize) -> FetchRequest {
        FetchRequest {
            filename: "rec.csv".into(),
            chunk_start: start,
            chunk_size: 4,
            preprocessing_options: None,
            include_navigation_info: false,
        }
    }

    fn response(data: Vec<Vec<f64>>) -> FetchResponse {
        FetchResponse {
            chunk_size: data.first().map(Vec::len).unwrap_or(0),
            data,
            channel_labels: vec!["A".into(), "B".into()],
            sampling_frequency: 100.0,
            chunk_start: 8,
            total_samples: 1000,
            annotations: None,
        }
    }

    #[test]
    fn accepts_consistent_payload() {
        let validated = response(vec![vec![1.0; 4], vec![2.0; 4]])
            .into_chunk(&recording(), &request(8))
            .unwrap();
        assert_eq!(validated.chunk.len(), 4);
        assert_eq!(validated.chunk.chunk_size, 4);
    }

    #[test]
    fn missing_data_is_failure() {
        let json = r#"{"channelLabels":["A","B"],"samplingFrequency":100.0,"chunkSize":0,"chunkStart":8,"totalSamples":1000}"#;
        let parsed: FetchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.into_chunk(&recording(), &request(8)).unwrap_err(),
            FetchError::MissingData
        );
    }

    #[test]
    fn label_mismatch_is_failure() {
        let err = response(vec![vec![1.0; 4]])
            .into_chunk(&recording(), &request(8))
            .unwrap_err();
        assert_eq!(err, FetchError::ChannelMismatch { data: 1, labels: 2 });
    }

    #[test]
    fn non_finite_samples_are_not_coerced() {
        let err = response(vec![vec![1.0; 4], vec![1.0, f64::NAN, 1.0, 1.0]])
            .into_chunk(&recording(), &request(8))
            .unwrap_err();
        assert_eq!(err, FetchError::NonFiniteSample { channel: 1, index: 1 });
    }

    #[test]
    fn ragged_rows_are_failure() {
        let err = response(vec![vec![1.0; 4], vec![1.0; 3]])
            .into_chunk(&recording(), &request(8))
            .unwrap_err();
        assert!(matches!(err, FetchError::RaggedChannels { channel: 1, .. }));
    }

    #[test]
    fn short_chunk_only_at_end_of_file() {
        let err = response(vec![vec![1.0; 3], vec![1.0; 3]])
            .into_chunk(&recording(), &request(8))
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::Truncated {
                len: 3,
                requested: 4
            }
        );

        let mut last = response(vec![vec![1.0; 3], vec![1.0; 3]]);
        last.chunk_start = 997;
        let validated = last.into_chunk(&recording(), &request(997)).unwrap();
        assert_eq!(validated.chunk.len(), 3);
        assert_eq!(validated.chunk.chunk_size, 4);
    }

    #[test]
    fn declared_length_must_match_data() {
        let mut lying = response(vec![vec![1.0; 4], vec![1.0; 4]]);
        lying.chunk_size = 2560;
        assert_eq!(
            lying.into_chunk(&recording(), &request(8)).unwrap_err(),
            FetchError::LengthMismatch {
                declared: 2560,
                actual: 4
            }
        );
    }

    #[test]
    fn wrong_rate_or_start_is_failure() {
        let mut wrong_rate = response(vec![vec![1.0; 4], vec![1.0; 4]]);
        wrong_rate.sampling_frequency = 128.0;
        assert!(matches!(
            wrong_rate.into_chunk(&recording(), &request(8)),
            Err(FetchError::SampleRateMismatch { .. })
        ));
        let err = response(vec![vec![1.0; 4], vec![1.0; 4]])
            .into_chunk(&recording(), &request(12))
            .unwrap_err();
        assert_eq!(err, FetchError::StartMismatch { requested: 12, actual: 8 });
    }

    #[test]
    fn request_omits_default_preprocessing() {
        let json = serde_json::to_value(request(0)).unwrap();
        assert!(json.get("preprocessingOptions").is_none());
        assert_eq!(json["includeNavigationInfo"], false);
    }
}
