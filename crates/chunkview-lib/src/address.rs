//! Sample/time/chunk arithmetic for a recording of known length.
//!
//! Chunk indices are 0-based here; the 1-based numbers shown to users go
//! through [`ChunkAddressSpace::start_for_display_index`] and
//! [`ChunkAddressSpace::display_index_of`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkAddressSpace {
    sample_rate: f64,
    total_samples: usize,
    chunk_size: usize,
}

/// Convert a chunk length in seconds to whole samples (at least one).
pub fn chunk_size_for_seconds(sample_rate: f64, seconds: f64) -> usize {
    let samples = (seconds * sample_rate).round();
    if samples.is_finite() && samples >= 1.0 {
        samples as usize
    } else {
        1
    }
}

impl ChunkAddressSpace {
    pub fn new(sample_rate: f64, total_samples: usize, chunk_size: usize) -> Self {
        Self {
            sample_rate,
            total_samples,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn with_chunk_seconds(sample_rate: f64, total_samples: usize, seconds: f64) -> Self {
        Self::new(
            sample_rate,
            total_samples,
            chunk_size_for_seconds(sample_rate, seconds),
        )
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_size as f64 / self.sample_rate
    }

    pub fn chunk_index_of(&self, sample: usize) -> usize {
        sample / self.chunk_size
    }

    /// Highest start that still yields a full-size chunk (0 for short recordings).
    pub fn last_start(&self) -> usize {
        self.total_samples.saturating_sub(self.chunk_size)
    }

    pub fn start_of_chunk(&self, index: usize) -> usize {
        index.saturating_mul(self.chunk_size).min(self.last_start())
    }

    pub fn total_chunks(&self) -> usize {
        self.total_samples.div_ceil(self.chunk_size)
    }

    pub fn has_next(&self, start: usize) -> bool {
        start.saturating_add(self.chunk_size) < self.total_samples
    }

    pub fn has_prev(&self, start: usize) -> bool {
        start > 0
    }

    pub fn next_start(&self, start: usize) -> Option<usize> {
        if !self.has_next(start) {
            return None;
        }
        Some((start + self.chunk_size).min(self.last_start()))
    }

    pub fn prev_start(&self, start: usize) -> Option<usize> {
        if !self.has_prev(start) {
            return None;
        }
        Some(start.saturating_sub(self.chunk_size).min(self.last_start()))
    }

    /// Resolve a 1-based chunk number. Zero is rejected; numbers past the end
    /// land on the last valid chunk.
    pub fn start_for_display_index(&self, display: usize) -> Option<usize> {
        if display == 0 || self.total_samples == 0 {
            return None;
        }
        Some(self.start_of_chunk(display - 1))
    }

    pub fn display_index_of(&self, start: usize) -> usize {
        if self.total_samples == 0 {
            return 0;
        }
        if !self.has_next(start) {
            return self.total_chunks();
        }
        self.chunk_index_of(start) + 1
    }

    /// Samples actually available from `start` (shorter only at the end).
    pub fn chunk_len_at(&self, start: usize) -> usize {
        self.chunk_size.min(self.total_samples.saturating_sub(start))
    }

    pub fn time_of_sample(&self, sample: usize) -> f64 {
        sample as f64 / self.sample_rate
    }

    /// Sample containing absolute time `seconds`, clamped into the recording.
    pub fn sample_at_time(&self, seconds: f64) -> Option<usize> {
        if !seconds.is_finite() || self.total_samples == 0 {
            return None;
        }
        let sample = (seconds.max(0.0) * self.sample_rate).floor();
        let last = (self.total_samples - 1) as f64;
        Some(sample.min(last) as usize)
    }

    /// Chunk start whose grid cell contains absolute time `seconds`.
    pub fn start_covering_time(&self, seconds: f64) -> Option<usize> {
        self.sample_at_time(seconds)
            .map(|sample| self.start_of_chunk(self.chunk_index_of(sample)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn jump_past_end_clamps_to_last_full_chunk() {
        let space = ChunkAddressSpace::new(256.0, 10_000, 2560);
        assert_eq!(space.total_chunks(), 4);
        assert_eq!(space.start_for_display_index(5), Some(7440));
        assert_eq!(space.start_for_display_index(4), Some(7440));
        assert_eq!(space.start_for_display_index(2), Some(2560));
    }

    #[test]
    fn chunk_zero_is_rejected() {
        let space = ChunkAddressSpace::new(256.0, 10_000, 2560);
        assert_eq!(space.start_for_display_index(0), None);
        let empty = ChunkAddressSpace::new(256.0, 0, 2560);
        assert_eq!(empty.start_for_display_index(1), None);
        assert_eq!(empty.total_chunks(), 0);
    }

    #[test]
    fn next_and_prev_respect_bounds() {
        let space = ChunkAddressSpace::new(256.0, 10_000, 2560);
        assert!(space.has_next(0));
        assert_eq!(space.next_start(0), Some(2560));
        assert_eq!(space.next_start(5120), Some(7440));
        assert_eq!(space.next_start(7440), None);
        assert!(!space.has_prev(0));
        assert_eq!(space.prev_start(0), None);
        assert_eq!(space.prev_start(7440), Some(4880));
        assert_eq!(space.prev_start(1000), Some(0));
    }

    #[test]
    fn short_recording_has_single_partial_chunk() {
        let space = ChunkAddressSpace::new(100.0, 300, 1000);
        assert_eq!(space.total_chunks(), 1);
        assert_eq!(space.start_of_chunk(3), 0);
        assert_eq!(space.chunk_len_at(0), 300);
        assert!(!space.has_next(0));
        assert_eq!(space.display_index_of(0), 1);
    }

    #[test]
    fn display_index_marks_clamped_tail_as_last() {
        let space = ChunkAddressSpace::new(256.0, 10_000, 2560);
        assert_eq!(space.display_index_of(0), 1);
        assert_eq!(space.display_index_of(5120), 3);
        assert_eq!(space.display_index_of(7440), 4);
    }

    #[test]
    fn start_of_chunk_contains_sample() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let total = rng.gen_range(1..200_000usize);
            let size = rng.gen_range(1..20_000usize);
            let space = ChunkAddressSpace::new(256.0, total, size);
            let sample = rng.gen_range(0..total);
            let index = space.chunk_index_of(sample);
            let start = space.start_of_chunk(index);
            if start == space.last_start() && index * size > start {
                // clamped tail chunk, shifted left to stay full-size
                assert!(start <= sample);
                assert!(sample < total);
                continue;
            }
            assert!(start <= sample, "start {start} > sample {sample}");
            assert!(sample < start + size);
        }
    }

    #[test]
    fn time_lookup_covers_same_position() {
        let space = ChunkAddressSpace::with_chunk_seconds(256.0, 256 * 120, 10.0);
        assert_eq!(space.chunk_size(), 2560);
        assert_eq!(space.start_covering_time(25.0), Some(5120));
        assert_eq!(space.start_covering_time(-3.0), Some(0));
        assert_eq!(space.start_covering_time(f64::INFINITY), None);
        assert_eq!(space.sample_at_time(10_000.0), Some(256 * 120 - 1));
    }

    #[test]
    fn seconds_to_samples_never_zero() {
        assert_eq!(chunk_size_for_seconds(256.0, 0.0), 1);
        assert_eq!(chunk_size_for_seconds(256.0, f64::NAN), 1);
        assert_eq!(chunk_size_for_seconds(250.0, 2.0), 500);
    }
}
