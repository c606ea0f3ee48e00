use super::LoadedRecording;
use anyhow::{anyhow, bail, Result};
use edf_reader::file_reader::SyncFileReader;
use edf_reader::sync_reader::SyncEDFReader;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Helper implementing the EDF reader trait for on-disk files.
struct DiskFileReader {
    path: PathBuf,
}

impl DiskFileReader {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SyncFileReader for DiskFileReader {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Sample rate shared by every signal, from samples per record and record length in ms.
fn common_rate(samples_per_record: &[u64], block_duration_ms: u64) -> Result<f64> {
    if block_duration_ms == 0 {
        bail!("EDF data record duration is zero");
    }
    let first = *samples_per_record
        .first()
        .ok_or_else(|| anyhow!("EDF file declares no signals"))?;
    if let Some(other) = samples_per_record.iter().find(|&&n| n != first) {
        bail!("mixed sample rates are not supported ({first} vs {other} samples per record)");
    }
    Ok(first as f64 * 1000.0 / block_duration_ms as f64)
}

/// Load every EDF signal into memory. Signals must share one sample rate.
pub fn load_edf(path: &Path) -> Result<LoadedRecording> {
    let reader = SyncEDFReader::init_with_file_reader(DiskFileReader::new(path))?;
    let header = &reader.edf_header;
    let counts: Vec<u64> = header
        .channels
        .iter()
        .map(|channel| channel.number_of_samples_in_data_record as u64)
        .collect();
    let fs = common_rate(&counts, header.block_duration as u64)?;
    let labels: Vec<String> = header
        .channels
        .iter()
        .enumerate()
        .map(|(idx, channel)| {
            let label = channel.label.trim();
            if label.is_empty() {
                format!("ch{}", idx + 1)
            } else {
                label.to_string()
            }
        })
        .collect();
    let total_duration = header.block_duration * header.number_of_blocks;
    let data_matrix = reader.read_data_window(0, total_duration)?;
    if data_matrix.len() != labels.len() {
        bail!(
            "EDF header lists {} signals but {} were read",
            labels.len(),
            data_matrix.len()
        );
    }
    let data = data_matrix
        .into_iter()
        .map(|row| row.into_iter().map(f64::from).collect())
        .collect();
    LoadedRecording::new(path.display().to_string(), labels, fs, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_from_record_layout() {
        assert_eq!(common_rate(&[256, 256], 1000).unwrap(), 256.0);
        assert_eq!(common_rate(&[125], 500).unwrap(), 250.0);
    }

    #[test]
    fn mixed_rates_are_rejected() {
        let err = common_rate(&[256, 128], 1000).unwrap_err();
        assert!(err.to_string().contains("mixed sample rates"));
        assert!(common_rate(&[], 1000).is_err());
        assert!(common_rate(&[256], 0).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_edf(Path::new("/nonexistent/recording.edf")).is_err());
    }
}
