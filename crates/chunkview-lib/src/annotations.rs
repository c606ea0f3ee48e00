//! Time-anchored markers and the chunk/pixel lookups over them.

use crate::signal::Chunk;
use crate::window::PixelMapping;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HIT_TOLERANCE_PX: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub file_path: String,
    /// Absolute sample index.
    pub start_time: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<usize>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Annotation {
    /// Membership rule: owned by the chunk whose half-open range holds `start_time`.
    pub fn owned_by(&self, chunk_start: usize, chunk_size: usize) -> bool {
        self.start_time >= chunk_start && self.start_time < chunk_start.saturating_add(chunk_size)
    }

    /// Offset from the chunk origin, in seconds.
    pub fn seconds_into(&self, chunk: &Chunk) -> f64 {
        (self.start_time as f64 - chunk.chunk_start as f64) / chunk.sampling_frequency
    }
}

/// Where an annotation lands on a plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationMarker {
    pub id: String,
    pub seconds: f64,
    pub x_px: f64,
    pub text: String,
}

/// Read-only view over a recording's annotations.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationIndex<'a> {
    annotations: &'a [Annotation],
}

impl<'a> AnnotationIndex<'a> {
    pub fn new(annotations: &'a [Annotation]) -> Self {
        Self { annotations }
    }

    /// Annotations owned by `[chunk_start, chunk_start + chunk_size)`, in time order.
    pub fn visible_in(&self, chunk_start: usize, chunk_size: usize) -> Vec<&'a Annotation> {
        let mut visible: Vec<&Annotation> = self
            .annotations
            .iter()
            .filter(|annotation| annotation.owned_by(chunk_start, chunk_size))
            .collect();
        visible.sort_by_key(|annotation| annotation.start_time);
        visible
    }

    pub fn visible_in_chunk(&self, chunk: &Chunk) -> Vec<&'a Annotation> {
        self.visible_in(chunk.chunk_start, chunk.chunk_size)
    }

    /// Nearest annotation within `tolerance_px` of a pointer; ties go to the earlier one.
    pub fn hit_test(
        &self,
        chunk: &Chunk,
        mapping: &PixelMapping,
        pointer_px: f64,
        tolerance_px: f64,
    ) -> Option<&'a Annotation> {
        if !pointer_px.is_finite() {
            return None;
        }
        let mut best: Option<(&Annotation, f64)> = None;
        for annotation in self.visible_in_chunk(chunk) {
            let x = mapping.time_to_px(annotation.seconds_into(chunk));
            let distance = (x - pointer_px).abs();
            if distance > tolerance_px {
                continue;
            }
            match best {
                Some((_, nearest)) if distance >= nearest => {}
                _ => best = Some((annotation, distance)),
            }
        }
        best.map(|(annotation, _)| annotation)
    }

    /// Same as [`hit_test`](Self::hit_test) for a pointer given in chunk seconds.
    pub fn hit_test_time(
        &self,
        chunk: &Chunk,
        mapping: &PixelMapping,
        seconds: f64,
        tolerance_px: f64,
    ) -> Option<&'a Annotation> {
        self.hit_test(chunk, mapping, mapping.time_to_px(seconds), tolerance_px)
    }

    /// Markers for annotations inside the mapped window.
    pub fn markers(&self, chunk: &Chunk, mapping: &PixelMapping) -> Vec<AnnotationMarker> {
        self.visible_in_chunk(chunk)
            .into_iter()
            .filter_map(|annotation| {
                let seconds = annotation.seconds_into(chunk);
                mapping.window.contains(seconds).then(|| AnnotationMarker {
                    id: annotation.id.clone(),
                    seconds,
                    x_px: mapping.time_to_px(seconds),
                    text: annotation.text.clone(),
                })
            })
            .collect()
    }
}

/// Fields an edit may change.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPatch {
    pub text: Option<String>,
    pub end_time: Option<Option<usize>>,
    pub channel: Option<Option<String>>,
}

/// The annotation list owned by one recording.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    items: Vec<Annotation>,
    next_id: u64,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Annotation>) -> Self {
        Self {
            next_id: items.len() as u64,
            items,
        }
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> AnnotationIndex<'_> {
        AnnotationIndex::new(&self.items)
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|annotation| annotation.id == id)
    }

    pub fn add(
        &mut self,
        file_path: &str,
        start_time: usize,
        end_time: Option<usize>,
        text: impl Into<String>,
        channel: Option<String>,
    ) -> &Annotation {
        let id = self.fresh_id();
        self.items.push(Annotation {
            id,
            file_path: file_path.to_string(),
            start_time,
            end_time,
            text: text.into(),
            channel,
        });
        &self.items[self.items.len() - 1]
    }

    /// Insert a stored annotation, replacing one with the same id.
    pub fn upsert(&mut self, annotation: Annotation) {
        match self.items.iter_mut().find(|item| item.id == annotation.id) {
            Some(existing) => *existing = annotation,
            None => self.items.push(annotation),
        }
    }

    pub fn update(&mut self, id: &str, patch: AnnotationPatch) -> bool {
        let Some(annotation) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        if let Some(text) = patch.text {
            annotation.text = text;
        }
        if let Some(end_time) = patch.end_time {
            annotation.end_time = end_time;
        }
        if let Some(channel) = patch.channel {
            annotation.channel = channel;
        }
        true
    }

    pub fn delete(&mut self, id: &str) -> Option<Annotation> {
        let idx = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(idx))
    }

    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("ann-{}", self.next_id);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{ViewWindow, WindowLimits};

    fn annotation(id: &str, start: usize) -> Annotation {
        Annotation {
            id: id.into(),
            file_path: "rec.edf".into(),
            start_time: start,
            end_time: None,
            text: id.into(),
            channel: None,
        }
    }

    fn chunk(start: usize, size: usize) -> Chunk {
        Chunk {
            chunk_start: start,
            chunk_size: size,
            sampling_frequency: 256.0,
            channel_labels: vec!["Cz".into()],
            data: vec![vec![0.0; size]],
        }
    }

    #[test]
    fn membership_is_half_open() {
        let list = vec![
            annotation("inside", 3000),
            annotation("before", 2559),
            annotation("after", 5120),
            annotation("first", 2560),
        ];
        let index = AnnotationIndex::new(&list);
        let visible: Vec<&str> = index
            .visible_in(2560, 2560)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(visible, vec!["first", "inside"]);
    }

    #[test]
    fn hit_test_finds_nearest_within_tolerance() {
        let list = vec![annotation("a", 256), annotation("b", 512)];
        let index = AnnotationIndex::new(&list);
        let chunk = chunk(0, 2560);
        let window = ViewWindow::new(0.0, 10.0, 10.0, &WindowLimits::default()).unwrap();
        // 100 px per second
        let mapping = PixelMapping::new(window, 1000.0);
        let hit = index.hit_test(&chunk, &mapping, 197.0, 5.0).unwrap();
        assert_eq!(hit.id, "b");
        assert!(index.hit_test(&chunk, &mapping, 150.0, 5.0).is_none());
        let by_time = index.hit_test_time(&chunk, &mapping, 1.02, 5.0).unwrap();
        assert_eq!(by_time.id, "a");
    }

    #[test]
    fn hit_test_tie_prefers_earlier_annotation() {
        let list = vec![annotation("late", 300), annotation("early", 200)];
        let index = AnnotationIndex::new(&list);
        let chunk = chunk(0, 2560);
        let window = ViewWindow::full(10.0);
        let mapping = PixelMapping::new(window, 2560.0);
        // pixels equal samples here, pointer halfway between the two
        let hit = index.hit_test(&chunk, &mapping, 250.0, 60.0).unwrap();
        assert_eq!(hit.id, "early");
    }

    #[test]
    fn markers_only_cover_window() {
        let list = vec![annotation("a", 256), annotation("b", 2048)];
        let index = AnnotationIndex::new(&list);
        let chunk = chunk(0, 2560);
        let window = ViewWindow::new(0.0, 2.0, 10.0, &WindowLimits::default()).unwrap();
        let markers = index.markers(&chunk, &PixelMapping::new(window, 200.0));
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, "a");
        assert!((markers[0].x_px - 100.0).abs() < 1e-9);
    }

    #[test]
    fn set_edits_pass_through() {
        let mut set = AnnotationSet::from_vec(vec![annotation("ann-2", 10)]);
        let id = set.add("rec.edf", 40, Some(60), "spike", None).id.clone();
        assert_ne!(id, "ann-2");
        assert!(set.update(
            &id,
            AnnotationPatch {
                text: Some("sharp wave".into()),
                ..Default::default()
            }
        ));
        assert_eq!(set.get(&id).map(|a| a.text.as_str()), Some("sharp wave"));
        assert!(set.delete("ann-2").is_some());
        assert!(!set.update("missing", AnnotationPatch::default()));
        assert_eq!(set.len(), 1);
    }
}
