use crate::annotations::Annotation;
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;

/// Simple BIDS event descriptor extracted from an `events.tsv` file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BidsEvent {
    pub onset: f64,
    pub duration: Option<f64>,
    pub trial_type: Option<String>,
}

impl BidsEvent {
    fn from_record(
        record: &StringRecord,
        onset_idx: usize,
        duration_idx: Option<usize>,
        trial_idx: Option<usize>,
    ) -> Result<Self> {
        let onset = record
            .get(onset_idx)
            .ok_or_else(|| anyhow!("missing onset column"))?
            .parse::<f64>()
            .context("parsing onset")?;
        let duration = duration_idx
            .and_then(|idx| record.get(idx))
            .and_then(|value| value.parse::<f64>().ok());
        let trial_type = trial_idx
            .and_then(|idx| record.get(idx))
            .filter(|value| !value.trim().is_empty() && value.trim() != "n/a")
            .map(|value| value.to_string());
        Ok(Self {
            onset,
            duration,
            trial_type,
        })
    }

    /// Convert to an annotation on a recording sampled at `fs`.
    pub fn to_annotation(&self, id: String, file_path: &str, fs: f64) -> Annotation {
        let start_time = (self.onset.max(0.0) * fs).round() as usize;
        let end_time = self
            .duration
            .filter(|duration| duration.is_finite() && *duration > 0.0)
            .map(|duration| ((self.onset + duration).max(0.0) * fs).round() as usize);
        Annotation {
            id,
            file_path: file_path.to_string(),
            start_time,
            end_time,
            text: self.trial_type.clone().unwrap_or_else(|| "event".into()),
            channel: None,
        }
    }
}

/// Load BIDS `events.tsv` into structured `BidsEvent` rows.
pub fn load_bids_events(path: &Path) -> Result<Vec<BidsEvent>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let onset_idx = headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case("onset"))
        .ok_or_else(|| anyhow!("events.tsv must include an onset column"))?;
    let duration_idx = headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case("duration"));
    let trial_idx = headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case("trial_type"));
    let mut out = Vec::new();
    for result in reader.records() {
        let record = result.context("reading events record")?;
        out.push(BidsEvent::from_record(
            &record,
            onset_idx,
            duration_idx,
            trial_idx,
        )?);
    }
    Ok(out)
}

/// BIDS events as annotations on `file_path`, with ids `event-1`, `event-2`, ...
pub fn load_events_annotations(path: &Path, file_path: &str, fs: f64) -> Result<Vec<Annotation>> {
    Ok(load_bids_events(path)?
        .iter()
        .enumerate()
        .map(|(n, event)| event.to_annotation(format!("event-{}", n + 1), file_path, fs))
        .collect())
}
