use super::LoadedRecording;
use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use std::path::Path;

fn is_time_column(header: &str) -> bool {
    matches!(
        header.trim().to_ascii_lowercase().as_str(),
        "time" | "t" | "timestamp" | "seconds"
    )
}

/// Rate implied by an evenly sampled time column.
fn rate_from_times(times: &[f64]) -> Option<f64> {
    let (first, last) = (times.first()?, times.last()?);
    let span = last - first;
    if times.len() < 2 || !span.is_finite() || span <= 0.0 {
        return None;
    }
    Some((times.len() - 1) as f64 / span)
}

/// Load a multichannel CSV: header row of channel labels, one sample per row.
///
/// A leading time column (`time`, `t`, `timestamp`, `seconds`) is not a
/// channel; when present it supplies the sample rate unless `fs` is given.
pub fn load_csv(path: &Path, fs: Option<f64>) -> Result<LoadedRecording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let time_column = headers.get(0).is_some_and(is_time_column);
    let skip = usize::from(time_column);
    let labels: Vec<String> = headers.iter().skip(skip).map(str::to_string).collect();
    if labels.is_empty() {
        bail!("{} has no channel columns", path.display());
    }

    let mut times = Vec::new();
    let mut data = vec![Vec::new(); labels.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 2))?;
        if record.len() != headers.len() {
            bail!(
                "row {} has {} fields, header has {}",
                row + 2,
                record.len(),
                headers.len()
            );
        }
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().with_context(|| {
                format!("row {} column {} is not numeric: {field}", row + 2, col + 1)
            })?;
            if !value.is_finite() {
                bail!("row {} column {} is not finite", row + 2, col + 1);
            }
            if col < skip {
                times.push(value);
            } else {
                data[col - skip].push(value);
            }
        }
    }

    let fs = match fs {
        Some(fs) => fs,
        None => rate_from_times(&times).ok_or_else(|| {
            anyhow!(
                "{}: pass --fs or add an evenly spaced time column",
                path.display()
            )
        })?,
    };
    LoadedRecording::new(path.display().to_string(), labels, fs, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn time_column_sets_rate() {
        let (_dir, path) = write("time,Fz,Cz\n0.00,1,2\n0.01,3,4\n0.02,5,6\n");
        let loaded = load_csv(&path, None).unwrap();
        assert_eq!(loaded.recording.channel_labels, vec!["Fz", "Cz"]);
        assert!((loaded.recording.sample_rate - 100.0).abs() < 1e-6);
        assert_eq!(loaded.data[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn explicit_rate_without_time_column() {
        let (_dir, path) = write("a,b\n1,2\n3,4\n");
        assert!(load_csv(&path, None).is_err());
        let loaded = load_csv(&path, Some(50.0)).unwrap();
        assert_eq!(loaded.recording.total_samples, 2);
        assert_eq!(loaded.recording.sample_rate, 50.0);
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let (_dir, path) = write("a,b\n1,x\n");
        let err = load_csv(&path, Some(1.0)).unwrap_err();
        assert!(format!("{err:#}").contains("not numeric"));
    }
}
