//! Zoom/pan window over the loaded chunk.
//!
//! Windows are expressed in seconds relative to the chunk origin. At a
//! boundary the window is shifted to sit flush against it; its width is never
//! truncated to make it fit.

use serde::{Deserialize, Serialize};

pub const MIN_WINDOW_SECONDS: f64 = 0.1;
pub const DEFAULT_RESET_SECONDS: f64 = 10.0;
pub const STEP_ZOOM_RATIO: f64 = 1.5;

/// Tunables shared by every window operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLimits {
    pub min_width: f64,
    pub reset_span: f64,
    pub step_ratio: f64,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            min_width: MIN_WINDOW_SECONDS,
            reset_span: DEFAULT_RESET_SECONDS,
            step_ratio: STEP_ZOOM_RATIO,
        }
    }
}

impl WindowLimits {
    /// A chunk shorter than the minimum can only be shown whole.
    fn min_width_for(&self, duration: f64) -> f64 {
        self.min_width.min(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewWindow {
    start: f64,
    end: f64,
}

/// A view window shifted onto the recording's absolute timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteWindow {
    pub start: f64,
    pub end: f64,
}

fn valid_duration(duration: f64) -> bool {
    duration.is_finite() && duration > 0.0
}

/// Put a window of `width` at `start`, shifting it back inside `[0, duration]`.
fn place(start: f64, width: f64, duration: f64) -> ViewWindow {
    let width = width.min(duration);
    let start = start.clamp(0.0, duration - width);
    ViewWindow {
        start,
        end: (start + width).min(duration),
    }
}

impl ViewWindow {
    /// Build a window from raw bounds, fitted to the chunk.
    pub fn new(start: f64, end: f64, duration: f64, limits: &WindowLimits) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || end <= start || !valid_duration(duration) {
            return None;
        }
        let width = (end - start).max(limits.min_width_for(duration));
        Some(place(start, width, duration))
    }

    pub fn full(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: duration.max(0.0),
        }
    }

    pub fn reset(duration: f64, limits: &WindowLimits) -> Self {
        let span = limits
            .reset_span
            .min(duration)
            .max(limits.min_width_for(duration));
        place(0.0, span, duration)
    }

    /// Translate a window onto a chunk with a different origin.
    pub fn from_absolute(
        absolute: &AbsoluteWindow,
        origin: f64,
        duration: f64,
        limits: &WindowLimits,
    ) -> Option<Self> {
        Self::new(
            absolute.start - origin,
            absolute.end - origin,
            duration,
            limits,
        )
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) * 0.5
    }

    pub fn absolute(&self, origin: f64) -> AbsoluteWindow {
        AbsoluteWindow {
            start: origin + self.start,
            end: origin + self.end,
        }
    }

    /// Display multiplier: 1.0 when the whole chunk is visible.
    pub fn zoom_scalar(&self, duration: f64) -> f64 {
        if self.width() <= 0.0 || !valid_duration(duration) {
            return 1.0;
        }
        duration / self.width()
    }

    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.start && seconds < self.end
    }

    /// Keep this window when the chunk underneath changes length. Bounds
    /// that cannot describe a window (inverted, non-finite) fall back to the
    /// whole chunk.
    pub fn fit_within(&self, duration: f64, limits: &WindowLimits) -> Self {
        Self::new(self.start, self.end, duration, limits)
            .unwrap_or_else(|| Self::full(duration))
    }

    /// Scale the window around `focus`; `factor < 1` zooms in.
    pub fn zoom(
        &self,
        factor: f64,
        focus: f64,
        duration: f64,
        limits: &WindowLimits,
    ) -> Option<Self> {
        if !factor.is_finite() || factor <= 0.0 || !focus.is_finite() || !valid_duration(duration) {
            return None;
        }
        let focus = focus.clamp(0.0, duration);
        let mut start = focus - (focus - self.start) * factor;
        let end = focus + (self.end - focus) * factor;
        let mut width = end - start;
        let min_width = limits.min_width_for(duration);
        if width < min_width {
            width = min_width;
            start = self.center() - min_width * 0.5;
        }
        if width >= duration {
            return Some(Self::full(duration));
        }
        Some(place(start, width, duration))
    }

    pub fn pan(&self, delta: f64, duration: f64) -> Option<Self> {
        if !delta.is_finite() || !valid_duration(duration) {
            return None;
        }
        Some(place(self.start + delta, self.width(), duration))
    }

    pub fn step_zoom_in(&self, duration: f64, limits: &WindowLimits) -> Option<Self> {
        self.zoom(1.0 / limits.step_ratio, self.center(), duration, limits)
    }

    pub fn step_zoom_out(&self, duration: f64, limits: &WindowLimits) -> Option<Self> {
        self.zoom(limits.step_ratio, self.center(), duration, limits)
    }
}

/// Linear time→pixel projection of a window onto a plot of `width_px`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapping {
    pub window: ViewWindow,
    pub width_px: f64,
}

impl PixelMapping {
    pub fn new(window: ViewWindow, width_px: f64) -> Self {
        Self { window, width_px }
    }

    pub fn time_to_px(&self, seconds: f64) -> f64 {
        (seconds - self.window.start) / self.window.width() * self.width_px
    }

    pub fn px_to_time(&self, px: f64) -> f64 {
        self.window.start + px / self.width_px * self.window.width()
    }
}
