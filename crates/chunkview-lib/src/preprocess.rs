use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

const OUTLIER_SD: f64 = 3.0;
const NOTCH_Q: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    None,
    Zscore,
    Minmax,
}

/// Signal conditioning applied by the data source before a chunk is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessingConfig {
    pub remove_outliers: bool,
    pub smoothing: bool,
    /// Moving-average length in samples; ignored unless `smoothing` is set.
    pub smoothing_window: usize,
    pub normalization: Normalization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notch: Option<f64>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            remove_outliers: false,
            smoothing: false,
            smoothing_window: 3,
            normalization: Normalization::None,
            highpass: None,
            lowpass: None,
            notch: None,
        }
    }
}

/// Only the options that change the returned samples.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_outliers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    smoothing_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalization: Option<Normalization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lowpass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notch: Option<f64>,
}

impl ActiveOptions {
    fn is_empty(&self) -> bool {
        self.remove_outliers.is_none()
            && self.smoothing_window.is_none()
            && self.normalization.is_none()
            && self.highpass.is_none()
            && self.lowpass.is_none()
            && self.notch.is_none()
    }
}

impl PreprocessingConfig {
    fn active(&self) -> ActiveOptions {
        ActiveOptions {
            remove_outliers: self.remove_outliers.then_some(true),
            smoothing_window: self.smoothing.then_some(self.smoothing_window),
            normalization: (self.normalization != Normalization::None)
                .then_some(self.normalization),
            highpass: self.highpass,
            lowpass: self.lowpass,
            notch: self.notch,
        }
    }

    /// Stable fingerprint of the active options; `None` means "no preprocessing".
    pub fn canonical(&self) -> Option<String> {
        let active = self.active();
        if active.is_empty() {
            return None;
        }
        serde_json::to_string(&active).ok()
    }

    pub fn is_default(&self) -> bool {
        self.active().is_empty()
    }

    /// Same output samples, regardless of inert fields.
    pub fn equivalent(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }

    /// Options to put on the wire; omitted when nothing is active.
    pub fn for_request(&self) -> Option<Self> {
        (!self.is_default()).then(|| self.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("highpass", self.highpass),
            ("lowpass", self.lowpass),
            ("notch", self.notch),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::InvalidCutoff { field, value });
                }
            }
        }
        if self.smoothing && self.smoothing_window == 0 {
            return Err(ConfigError::ZeroSmoothingWindow);
        }
        Ok(())
    }

    /// Condition one channel sampled at `fs`.
    pub fn apply(&self, data: &[f64], fs: f64) -> Vec<f64> {
        let mut out = data.to_vec();
        if let Some(cutoff) = self.highpass {
            out = single_pole_highpass(&out, fs, cutoff);
        }
        if let Some(cutoff) = self.lowpass {
            if cutoff < fs * 0.5 {
                out = single_pole_lowpass(&out, fs, cutoff);
            }
        }
        if let Some(freq) = self.notch {
            if freq < fs * 0.5 {
                out = notch(&out, fs, freq);
            }
        }
        if self.remove_outliers {
            clip_outliers(&mut out);
        }
        if self.smoothing {
            out = centered_moving_average(&out, self.smoothing_window);
        }
        match self.normalization {
            Normalization::None => {}
            Normalization::Zscore => zscore(&mut out),
            Normalization::Minmax => minmax(&mut out),
        }
        out
    }
}

fn mean_sd(data: &[f64]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    for &x in data {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

fn single_pole_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(0.01));
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = data[0];
    for &x in data {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}

/// Second-order IIR notch (RBJ cookbook form).
fn notch(data: &[f64], fs: f64, freq: f64) -> Vec<f64> {
    let w0 = 2.0 * std::f64::consts::PI * freq / fs;
    let alpha = w0.sin() / (2.0 * NOTCH_Q);
    let cos_w0 = w0.cos();
    let a0 = 1.0 + alpha;
    let b = [1.0 / a0, -2.0 * cos_w0 / a0, 1.0 / a0];
    let a = [-2.0 * cos_w0 / a0, (1.0 - alpha) / a0];
    let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
    data.iter()
        .map(|&x| {
            let y = b[0] * x + b[1] * x1 + b[2] * x2 - a[0] * y1 - a[1] * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            y
        })
        .collect()
}

fn clip_outliers(data: &mut [f64]) {
    let (mean, sd) = mean_sd(data);
    if sd == 0.0 {
        return;
    }
    let (lo, hi) = (mean - OUTLIER_SD * sd, mean + OUTLIER_SD * sd);
    for value in data.iter_mut() {
        *value = value.clamp(lo, hi);
    }
}

fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let before = win / 2;
    let after = (win - 1) / 2;
    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(data.len() - 1);
            let slice = &data[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn zscore(data: &mut [f64]) {
    let (mean, sd) = mean_sd(data);
    for value in data.iter_mut() {
        *value = if sd == 0.0 { 0.0 } else { (*value - mean) / sd };
    }
}

fn minmax(data: &mut [f64]) {
    let lo = data.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    for value in data.iter_mut() {
        *value = if range > 0.0 { (*value - lo) / range } else { 0.0 };
    }
}
