//! Single owner of the navigation state for the open recording.
//!
//! The controller performs no I/O. Chunk-level commands either resolve from
//! the cache or hand back a [`FetchTicket`]; the caller runs the request and
//! reports the result through [`NavigationController::complete_fetch`] with
//! the ticket's token. Only the latest token is ever applied. Window
//! commands never produce a ticket.

use crate::address::ChunkAddressSpace;
use crate::annotations::{Annotation, AnnotationMarker, AnnotationPatch, AnnotationSet};
use crate::cache::{requires_fetch, CacheKey, CacheStats, ChunkCache};
use crate::config::NavigatorConfig;
use crate::debounce::Debouncer;
use crate::error::{ConversionError, FetchError};
use crate::preprocess::PreprocessingConfig;
use crate::settings::ViewState;
use crate::signal::{ChannelTrace, Chunk, Recording};
use crate::source::{FetchRequest, FetchResponse};
use crate::window::{AbsoluteWindow, PixelMapping, ViewWindow, WindowLimits};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum NavCommand {
    NextChunk,
    PrevChunk,
    /// 1-based chunk number.
    JumpToChunk(usize),
    /// Absolute position in seconds.
    JumpToTime(f64),
    Zoom { factor: f64, focus: f64 },
    Pan(f64),
    ZoomIn,
    ZoomOut,
    ResetView,
    SetWindow { start: f64, end: f64 },
    SetChunkSeconds(f64),
    SetPreprocessing(PreprocessingConfig),
    ResetPreprocessing,
    SelectChannels(Vec<String>),
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Transport or payload problem; retrying may help.
    Fetch,
    /// Payload arrived but cannot be rendered; retrying will not help.
    Unusable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl NavFailure {
    fn fetch(err: &FetchError) -> Self {
        Self {
            kind: FailureKind::Fetch,
            message: err.to_string(),
        }
    }

    fn unusable(err: &ConversionError) -> Self {
        Self {
            kind: FailureKind::Unusable,
            message: format!("data received but unusable: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    FetchingChunk { token: u64 },
    Ready,
    Error(NavFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    Idle,
    FetchingChunk,
    Ready,
    Error,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::FetchingChunk { .. } => PhaseKind::FetchingChunk,
            Phase::Ready => PhaseKind::Ready,
            Phase::Error(_) => PhaseKind::Error,
        }
    }
}

/// A request the caller must hand to the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub token: u64,
    pub request: FetchRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoRecording,
    EmptyRecording,
    NoChunk,
    InvalidInput,
    OutOfRange,
    NothingToRetry,
    RetryPointless,
}

/// Result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Only the window moved.
    ViewChanged,
    /// Swapped to a cached chunk without a round trip.
    CacheHit,
    Fetch(FetchTicket),
    Unusable(ConversionError),
    Unchanged,
    Rejected(Rejection),
}

/// Result of reporting a fetch back.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    /// Superseded by a newer request and dropped.
    Stale,
    Failed(FetchError),
    Unusable(ConversionError),
}

/// View state ready to hand to a [`ViewStateStore`](crate::settings::ViewStateStore).
#[derive(Debug, Clone, PartialEq)]
pub struct PersistRequest {
    pub file_path: String,
    pub state: ViewState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowPlan {
    Full,
    Keep(ViewWindow),
    Absolute(AbsoluteWindow),
}

#[derive(Debug, Clone)]
struct PendingFetch {
    token: u64,
    key: CacheKey,
    request: FetchRequest,
    plan: WindowPlan,
}

#[derive(Debug, Clone)]
struct Displayed {
    key: CacheKey,
    chunk: Arc<Chunk>,
    window: ViewWindow,
}

#[derive(Debug)]
struct FileSession {
    recording: Recording,
    address: ChunkAddressSpace,
    chunk_seconds: f64,
    preprocessing: PreprocessingConfig,
    selected_channels: Vec<String>,
    annotations: AnnotationSet,
    displayed: Option<Displayed>,
}

/// What the renderer gets for the chunk on screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkView {
    pub chunk_start: usize,
    pub chunk_len: usize,
    pub chunk_index: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub window: ViewWindow,
    pub absolute_window: AbsoluteWindow,
    pub zoom_scalar: f64,
    pub selected_channels: Vec<String>,
    pub annotations: Vec<Annotation>,
    #[serde(skip)]
    pub chunk: Arc<Chunk>,
}

impl ChunkView {
    pub fn traces(&self) -> Result<Vec<ChannelTrace>, ConversionError> {
        self.chunk.to_traces(&self.selected_channels)
    }

    pub fn pixel_mapping(&self, width_px: f64) -> PixelMapping {
        PixelMapping::new(self.window, width_px)
    }

    pub fn markers(&self, width_px: f64) -> Vec<AnnotationMarker> {
        crate::annotations::AnnotationIndex::new(&self.annotations)
            .markers(&self.chunk, &self.pixel_mapping(width_px))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub phase: PhaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NavFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_token: Option<u64>,
    pub total_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ChunkView>,
}

pub struct NavigationController {
    config: NavigatorConfig,
    limits: WindowLimits,
    cache: ChunkCache,
    session: Option<FileSession>,
    phase: Phase,
    last_token: u64,
    pending: Option<PendingFetch>,
    last_failed: Option<PendingFetch>,
    persist: Debouncer<PersistRequest>,
    ready_persist: Vec<PersistRequest>,
}

impl NavigationController {
    pub fn new(config: NavigatorConfig) -> Self {
        let cache = match config.cache_capacity_per_file {
            Some(capacity) => ChunkCache::with_capacity_per_file(capacity),
            None => ChunkCache::new(),
        };
        Self {
            limits: config.limits(),
            persist: Debouncer::new(config.persist_debounce()),
            config,
            cache,
            session: None,
            phase: Phase::Idle,
            last_token: 0,
            pending: None,
            last_failed: None,
            ready_persist: Vec::new(),
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.session.as_ref().map(|session| &session.recording)
    }

    pub fn address(&self) -> Option<&ChunkAddressSpace> {
        self.session.as_ref().map(|session| &session.address)
    }

    pub fn preprocessing(&self) -> Option<&PreprocessingConfig> {
        self.session.as_ref().map(|session| &session.preprocessing)
    }

    pub fn current_key(&self) -> Option<&CacheKey> {
        self.displayed().map(|displayed| &displayed.key)
    }

    pub fn window(&self) -> Option<ViewWindow> {
        self.displayed().map(|displayed| displayed.window)
    }

    pub fn pending_token(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.token)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn displayed(&self) -> Option<&Displayed> {
        self.session.as_ref()?.displayed.as_ref()
    }

    pub fn open_file(
        &mut self,
        recording: Recording,
        annotations: Vec<Annotation>,
        saved: Option<ViewState>,
    ) -> Outcome {
        self.open_file_at(recording, annotations, saved, Instant::now())
    }

    /// Replace the open recording wholesale, restoring `saved` when given.
    pub fn open_file_at(
        &mut self,
        recording: Recording,
        annotations: Vec<Annotation>,
        saved: Option<ViewState>,
        now: Instant,
    ) -> Outcome {
        if let Some(previous) = self.persist.flush() {
            self.ready_persist.push(previous);
        }
        self.pending = None;
        self.last_failed = None;
        self.cache.pin(None);
        self.phase = Phase::Idle;

        let chunk_seconds = saved
            .as_ref()
            .map(|state| state.chunk_size_seconds)
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .unwrap_or(self.config.chunk_size_seconds);
        let address = ChunkAddressSpace::with_chunk_seconds(
            recording.sample_rate,
            recording.total_samples,
            chunk_seconds,
        );
        let (start, plan, preprocessing, selected) = match saved {
            Some(state) => (
                state.chunk_start.min(address.last_start()),
                WindowPlan::Keep(state.window),
                state.preprocessing_options,
                state.selected_channels,
            ),
            None => (
                0,
                WindowPlan::Full,
                PreprocessingConfig::default(),
                Vec::new(),
            ),
        };
        let preprocessing = if preprocessing.validate().is_ok() {
            preprocessing
        } else {
            PreprocessingConfig::default()
        };
        let selected_channels = selected
            .into_iter()
            .filter(|label| recording.channel_labels.contains(label))
            .collect();
        info!(
            "opened {} ({} channels, {} samples @ {} Hz)",
            recording.file_path,
            recording.channel_count(),
            recording.total_samples,
            recording.sample_rate
        );
        let empty = recording.total_samples == 0;
        let annotations = annotations
            .into_iter()
            .filter(|annotation| annotation.file_path == recording.file_path)
            .collect();
        self.session = Some(FileSession {
            recording,
            address,
            chunk_seconds,
            preprocessing,
            selected_channels,
            annotations: AnnotationSet::from_vec(annotations),
            displayed: None,
        });
        if empty {
            return Outcome::Rejected(Rejection::EmptyRecording);
        }
        self.load_chunk(start, plan, now)
    }

    pub fn handle(&mut self, command: NavCommand) -> Outcome {
        self.handle_at(command, Instant::now())
    }

    pub fn handle_at(&mut self, command: NavCommand, now: Instant) -> Outcome {
        let limits = self.limits;
        match command {
            NavCommand::NextChunk => self.step_chunk(true, now),
            NavCommand::PrevChunk => self.step_chunk(false, now),
            NavCommand::JumpToChunk(display) => {
                let Some(session) = self.session.as_ref() else {
                    return Outcome::Rejected(Rejection::NoRecording);
                };
                match session.address.start_for_display_index(display) {
                    Some(start) => self.load_chunk(start, WindowPlan::Full, now),
                    None => Outcome::Rejected(Rejection::OutOfRange),
                }
            }
            NavCommand::JumpToTime(seconds) => {
                let Some(session) = self.session.as_ref() else {
                    return Outcome::Rejected(Rejection::NoRecording);
                };
                match session.address.start_covering_time(seconds) {
                    Some(start) => self.load_chunk(start, WindowPlan::Full, now),
                    None => Outcome::Rejected(Rejection::InvalidInput),
                }
            }
            NavCommand::Zoom { factor, focus } => self.change_window(now, |window, duration| {
                window.zoom(factor, focus, duration, &limits)
            }),
            NavCommand::Pan(delta) => {
                self.change_window(now, |window, duration| window.pan(delta, duration))
            }
            NavCommand::ZoomIn => self.change_window(now, |window, duration| {
                window.step_zoom_in(duration, &limits)
            }),
            NavCommand::ZoomOut => self.change_window(now, |window, duration| {
                window.step_zoom_out(duration, &limits)
            }),
            NavCommand::ResetView => self.change_window(now, |_, duration| {
                Some(ViewWindow::reset(duration, &limits))
            }),
            NavCommand::SetWindow { start, end } => self.change_window(now, |_, duration| {
                ViewWindow::new(start, end, duration, &limits)
            }),
            NavCommand::SetChunkSeconds(seconds) => self.set_chunk_seconds(seconds, now),
            NavCommand::SetPreprocessing(config) => self.set_preprocessing(config, now),
            NavCommand::ResetPreprocessing => {
                if let Some(session) = self.session.as_ref() {
                    let dropped = self.cache.invalidate_file(&session.recording.file_path);
                    debug!("preprocessing reset dropped {dropped} cached chunk(s)");
                }
                self.set_preprocessing(PreprocessingConfig::default(), now)
            }
            NavCommand::SelectChannels(labels) => self.select_channels(labels, now),
            NavCommand::Retry => self.retry(),
        }
    }

    /// Report the result of the fetch issued under `token`.
    pub fn complete_fetch(
        &mut self,
        token: u64,
        result: Result<FetchResponse, FetchError>,
    ) -> Completion {
        self.complete_fetch_at(token, result, Instant::now())
    }

    pub fn complete_fetch_at(
        &mut self,
        token: u64,
        result: Result<FetchResponse, FetchError>,
        now: Instant,
    ) -> Completion {
        let pending = match self.pending.take() {
            Some(pending) if pending.token == token => pending,
            other => {
                self.pending = other;
                debug!("discarding stale response for token {token}");
                return Completion::Stale;
            }
        };
        let Some(session) = self.session.as_mut() else {
            return Completion::Stale;
        };
        let validated =
            result.and_then(|response| response.into_chunk(&session.recording, &pending.request));
        match validated {
            Ok(validated) => {
                if let Some(list) = validated.annotations {
                    for mut annotation in list {
                        annotation.file_path = session.recording.file_path.clone();
                        session.annotations.upsert(annotation);
                    }
                }
                let chunk = self.cache.put(pending.key.clone(), validated.chunk);
                match self.apply_chunk(pending.key, chunk, pending.plan, now) {
                    Ok(()) => Completion::Applied,
                    Err(err) => Completion::Unusable(err),
                }
            }
            Err(err) => {
                warn!(
                    "fetch of {} @ {} failed: {err}",
                    pending.request.filename, pending.request.chunk_start
                );
                self.phase = Phase::Error(NavFailure::fetch(&err));
                self.last_failed = Some(pending);
                Completion::Failed(err)
            }
        }
    }

    /// Persist requests whose quiet period has elapsed.
    pub fn poll_persist(&mut self, now: Instant) -> Vec<PersistRequest> {
        let mut ready = std::mem::take(&mut self.ready_persist);
        ready.extend(self.persist.poll(now));
        ready
    }

    /// Everything still waiting, regardless of the debounce delay.
    pub fn flush_persist(&mut self) -> Vec<PersistRequest> {
        let mut ready = std::mem::take(&mut self.ready_persist);
        ready.extend(self.persist.flush());
        ready
    }

    pub fn view_state(&self) -> Option<ViewState> {
        let session = self.session.as_ref()?;
        let displayed = session.displayed.as_ref()?;
        let duration = displayed.chunk.duration();
        Some(ViewState {
            chunk_start: displayed.key.chunk_start,
            chunk_size_seconds: session.chunk_seconds,
            window: displayed.window,
            absolute_window: displayed.window.absolute(displayed.chunk.origin_seconds()),
            zoom_scalar: displayed.window.zoom_scalar(duration),
            preprocessing_options: session.preprocessing.clone(),
            selected_channels: session.selected_channels.clone(),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        let error = match &self.phase {
            Phase::Error(failure) => Some(failure.clone()),
            _ => None,
        };
        let view = self.session.as_ref().and_then(|session| {
            let displayed = session.displayed.as_ref()?;
            let chunk = &displayed.chunk;
            let start = chunk.chunk_start;
            Some(ChunkView {
                chunk_start: start,
                chunk_len: chunk.len(),
                chunk_index: session.address.display_index_of(start),
                has_next: session.address.has_next(start),
                has_prev: session.address.has_prev(start),
                window: displayed.window,
                absolute_window: displayed.window.absolute(chunk.origin_seconds()),
                zoom_scalar: displayed.window.zoom_scalar(chunk.duration()),
                selected_channels: session.selected_channels.clone(),
                annotations: session
                    .annotations
                    .index()
                    .visible_in_chunk(chunk)
                    .into_iter()
                    .cloned()
                    .collect(),
                chunk: Arc::clone(chunk),
            })
        });
        Snapshot {
            phase: self.phase.kind(),
            error,
            file_path: self
                .session
                .as_ref()
                .map(|session| session.recording.file_path.clone()),
            pending_token: self.pending_token(),
            total_chunks: self
                .session
                .as_ref()
                .map(|session| session.address.total_chunks())
                .unwrap_or(0),
            view,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.session
            .as_ref()
            .map(|session| session.annotations.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_annotation(
        &mut self,
        start_time: usize,
        end_time: Option<usize>,
        text: impl Into<String>,
        channel: Option<String>,
    ) -> Option<Annotation> {
        let session = self.session.as_mut()?;
        if start_time >= session.recording.total_samples {
            return None;
        }
        let file_path = session.recording.file_path.clone();
        Some(
            session
                .annotations
                .add(&file_path, start_time, end_time, text, channel)
                .clone(),
        )
    }

    pub fn update_annotation(&mut self, id: &str, patch: AnnotationPatch) -> bool {
        self.session
            .as_mut()
            .is_some_and(|session| session.annotations.update(id, patch))
    }

    pub fn delete_annotation(&mut self, id: &str) -> Option<Annotation> {
        self.session.as_mut()?.annotations.delete(id)
    }

    /// Annotation under a pointer on a plot `width_px` wide.
    pub fn hit_test(&self, pointer_px: f64, width_px: f64) -> Option<&Annotation> {
        let session = self.session.as_ref()?;
        let displayed = session.displayed.as_ref()?;
        let mapping = PixelMapping::new(displayed.window, width_px);
        session.annotations.index().hit_test(
            &displayed.chunk,
            &mapping,
            pointer_px,
            self.config.hit_tolerance_px,
        )
    }

    /// Chunk start the user is heading to: the in-flight request, else the screen.
    fn current_start(&self) -> Option<usize> {
        self.pending
            .as_ref()
            .map(|pending| pending.key.chunk_start)
            .or_else(|| self.displayed().map(|displayed| displayed.key.chunk_start))
    }

    fn reload_plan(&self) -> WindowPlan {
        if let Some(pending) = &self.pending {
            return pending.plan;
        }
        self.displayed()
            .map(|displayed| WindowPlan::Keep(displayed.window))
            .unwrap_or(WindowPlan::Full)
    }

    fn step_chunk(&mut self, forward: bool, now: Instant) -> Outcome {
        let Some(session) = self.session.as_ref() else {
            return Outcome::Rejected(Rejection::NoRecording);
        };
        let Some(current) = self.current_start() else {
            return Outcome::Rejected(Rejection::NoChunk);
        };
        let target = if forward {
            session.address.next_start(current)
        } else {
            session.address.prev_start(current)
        };
        match target {
            Some(start) => self.load_chunk(start, WindowPlan::Full, now),
            None => Outcome::Rejected(Rejection::OutOfRange),
        }
    }

    fn load_chunk(&mut self, start: usize, plan: WindowPlan, now: Instant) -> Outcome {
        let (key, request, same_as_screen) = {
            let Some(session) = self.session.as_ref() else {
                return Outcome::Rejected(Rejection::NoRecording);
            };
            let key = CacheKey::new(
                session.recording.file_path.clone(),
                start,
                session.address.chunk_size(),
                &session.preprocessing,
            );
            let same = !requires_fetch(session.displayed.as_ref().map(|d| &d.key), &key);
            let request = FetchRequest {
                filename: key.file_path.clone(),
                chunk_start: start,
                chunk_size: key.chunk_size,
                preprocessing_options: session.preprocessing.for_request(),
                include_navigation_info: session.displayed.is_none(),
            };
            (key, request, same)
        };
        if same_as_screen {
            if self.pending.take().is_some() {
                debug!("back on the displayed chunk, dropping in-flight request");
            }
            if matches!(self.phase, Phase::FetchingChunk { .. } | Phase::Error(_)) {
                self.last_failed = None;
                self.phase = Phase::Ready;
            }
            return Outcome::Unchanged;
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.key == key)
        {
            return Outcome::Unchanged;
        }
        self.pending = None;
        if let Some(chunk) = self.cache.get(&key) {
            return match self.apply_chunk(key, chunk, plan, now) {
                Ok(()) => Outcome::CacheHit,
                Err(err) => Outcome::Unusable(err),
            };
        }
        self.issue_fetch(key, request, plan)
    }

    fn issue_fetch(&mut self, key: CacheKey, request: FetchRequest, plan: WindowPlan) -> Outcome {
        self.last_token += 1;
        let token = self.last_token;
        debug!(
            "token {token}: fetching {} @ {} (+{})",
            request.filename, request.chunk_start, request.chunk_size
        );
        self.pending = Some(PendingFetch {
            token,
            key,
            request: request.clone(),
            plan,
        });
        self.last_failed = None;
        self.phase = Phase::FetchingChunk { token };
        Outcome::Fetch(FetchTicket { token, request })
    }

    fn apply_chunk(
        &mut self,
        key: CacheKey,
        chunk: Arc<Chunk>,
        plan: WindowPlan,
        now: Instant,
    ) -> Result<(), ConversionError> {
        let limits = self.limits;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if let Err(err) = chunk.to_traces(&session.selected_channels) {
            error!("{}: data received but unusable: {err}", key.file_path);
            self.phase = Phase::Error(NavFailure::unusable(&err));
            return Err(err);
        }
        let duration = chunk.duration();
        let window = match plan {
            WindowPlan::Full => ViewWindow::full(duration),
            WindowPlan::Keep(window) => window.fit_within(duration, &limits),
            WindowPlan::Absolute(absolute) => {
                ViewWindow::from_absolute(&absolute, chunk.origin_seconds(), duration, &limits)
                    .unwrap_or_else(|| ViewWindow::full(duration))
            }
        };
        info!(
            "showing {} @ {} ({} samples)",
            key.file_path,
            key.chunk_start,
            chunk.len()
        );
        session.displayed = Some(Displayed {
            key: key.clone(),
            chunk,
            window,
        });
        self.cache.pin(Some(key));
        self.phase = Phase::Ready;
        self.last_failed = None;
        self.schedule_persist(now);
        Ok(())
    }

    fn change_window<F>(&mut self, now: Instant, op: F) -> Outcome
    where
        F: FnOnce(&ViewWindow, f64) -> Option<ViewWindow>,
    {
        let Some(session) = self.session.as_mut() else {
            return Outcome::Rejected(Rejection::NoRecording);
        };
        let Some(displayed) = session.displayed.as_mut() else {
            return Outcome::Rejected(Rejection::NoChunk);
        };
        let Some(window) = op(&displayed.window, displayed.chunk.duration()) else {
            return Outcome::Rejected(Rejection::InvalidInput);
        };
        if window == displayed.window {
            return Outcome::Unchanged;
        }
        displayed.window = window;
        if matches!(self.phase, Phase::Idle) {
            self.phase = Phase::Ready;
        }
        self.schedule_persist(now);
        Outcome::ViewChanged
    }

    fn set_chunk_seconds(&mut self, seconds: f64, now: Instant) -> Outcome {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Outcome::Rejected(Rejection::InvalidInput);
        }
        let Some(session) = self.session.as_mut() else {
            return Outcome::Rejected(Rejection::NoRecording);
        };
        let address = ChunkAddressSpace::with_chunk_seconds(
            session.recording.sample_rate,
            session.recording.total_samples,
            seconds,
        );
        session.chunk_seconds = seconds;
        if address.chunk_size() == session.address.chunk_size() {
            return Outcome::Unchanged;
        }
        let heading_to = self
            .pending
            .as_ref()
            .map(|pending| session.address.time_of_sample(pending.key.chunk_start));
        let on_screen = session
            .displayed
            .as_ref()
            .map(|displayed| displayed.window.absolute(displayed.chunk.origin_seconds()));
        session.address = address;
        let (anchor, plan) = match (heading_to, on_screen) {
            (Some(seconds), _) => (seconds, WindowPlan::Full),
            (None, Some(absolute)) => (absolute.start, WindowPlan::Absolute(absolute)),
            (None, None) => return Outcome::Unchanged,
        };
        match address.start_covering_time(anchor) {
            Some(start) => self.load_chunk(start, plan, now),
            None => Outcome::Unchanged,
        }
    }

    fn set_preprocessing(&mut self, config: PreprocessingConfig, now: Instant) -> Outcome {
        if config.validate().is_err() {
            return Outcome::Rejected(Rejection::InvalidInput);
        }
        let Some(session) = self.session.as_mut() else {
            return Outcome::Rejected(Rejection::NoRecording);
        };
        let equivalent = session.preprocessing.equivalent(&config);
        session.preprocessing = config;
        if equivalent {
            return Outcome::Unchanged;
        }
        let plan = self.reload_plan();
        match self.current_start() {
            Some(start) => self.load_chunk(start, plan, now),
            None => Outcome::Unchanged,
        }
    }

    fn select_channels(&mut self, labels: Vec<String>, now: Instant) -> Outcome {
        let Some(session) = self.session.as_mut() else {
            return Outcome::Rejected(Rejection::NoRecording);
        };
        if labels
            .iter()
            .any(|label| !session.recording.channel_labels.contains(label))
        {
            return Outcome::Rejected(Rejection::InvalidInput);
        }
        if session.selected_channels == labels {
            return Outcome::Unchanged;
        }
        session.selected_channels = labels;
        if session.displayed.is_none() {
            return Outcome::Unchanged;
        }
        self.schedule_persist(now);
        Outcome::ViewChanged
    }

    fn retry(&mut self) -> Outcome {
        if let Phase::Error(failure) = &self.phase {
            if failure.kind == FailureKind::Unusable {
                return Outcome::Rejected(Rejection::RetryPointless);
            }
        }
        match self.last_failed.take() {
            Some(failed) => self.issue_fetch(failed.key, failed.request, failed.plan),
            None => Outcome::Rejected(Rejection::NothingToRetry),
        }
    }

    fn schedule_persist(&mut self, now: Instant) {
        let Some(state) = self.view_state() else {
            return;
        };
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let request = PersistRequest {
            file_path: session.recording.file_path.clone(),
            state,
        };
        self.persist.schedule(request, now);
    }
}
