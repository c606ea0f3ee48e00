use super::LoadedRecording;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        if !val.is_finite() {
            anyhow::bail!("line {} is not a finite sample: {}", idx + 1, trimmed);
        }
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Single-channel recording from a headerless series; the channel is named after the file.
pub fn load_text(path: &Path, fs: f64) -> Result<LoadedRecording> {
    let data = read_f64_series(path)?;
    let label = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("signal")
        .to_string();
    LoadedRecording::new(path.display().to_string(), vec![label], fs, vec![data])
}

/// Parse newline-delimited sample indices.
pub fn parse_event_indices(text: &str) -> Result<Vec<usize>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: usize = trimmed
            .parse()
            .with_context(|| format!("line {} is not an integer index: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no annotation indices found");
    }
    Ok(out)
}

/// Read event indices from a file.
pub fn read_event_indices(path: &Path) -> Result<Vec<usize>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_event_indices(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let series = parse_f64_series("# header\n1.5\n\n-2\n").unwrap();
        assert_eq!(series, vec![1.5, -2.0]);
    }

    #[test]
    fn rejects_garbage_and_nan() {
        assert!(parse_f64_series("1.0\nabc\n").is_err());
        assert!(parse_f64_series("1.0\nNaN\n").is_err());
        assert!(parse_f64_series("# only a comment\n").is_err());
    }

    #[test]
    fn channel_takes_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecg.txt");
        std::fs::write(&path, "0.1\n0.2\n").unwrap();
        let loaded = load_text(&path, 250.0).unwrap();
        assert_eq!(loaded.recording.channel_labels, vec!["ecg".to_string()]);
        assert_eq!(loaded.recording.sample_rate, 250.0);
    }

    #[test]
    fn parses_indices() {
        assert_eq!(parse_event_indices("10\n# x\n20\n").unwrap(), vec![10, 20]);
        assert!(parse_event_indices("1.5\n").is_err());
    }
}
