mod script;

use anyhow::{anyhow, bail, Context, Result};
use chunkview_lib::{
    annotations::Annotation,
    config::NavigatorConfig,
    io as chunk_io,
    local::LocalSource,
    navigation::{Completion, NavCommand, NavigationController, Outcome, Snapshot},
    plot::{figure_from_view, Figure, PlotBackend, Series},
    preprocess::PreprocessingConfig,
    settings::{JsonFileStore, ViewStateStore},
    source::DataSource,
    worker::FetchWorker,
    Recording,
};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use plotters::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "chunkview",
    version,
    about = "Chunked, windowed navigation over long multichannel recordings"
)]
struct Cli {
    /// Navigator settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. warn, info, chunkview_lib=debug
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct InputArgs {
    #[arg(long)]
    input: PathBuf,
    /// Sample rate for formats that do not carry one
    #[arg(long)]
    fs: Option<f64>,
    /// Annotation sidecar (.tsv BIDS events, .atr, .json, .txt indices)
    #[arg(long)]
    annotations: Option<PathBuf>,
    #[arg(long)]
    chunk_seconds: Option<f64>,
}

#[derive(Args, Clone, Default)]
struct PreprocessArgs {
    #[arg(long)]
    highpass: Option<f64>,
    #[arg(long)]
    lowpass: Option<f64>,
    #[arg(long)]
    notch: Option<f64>,
    #[arg(long)]
    remove_outliers: bool,
    /// Moving-average window in samples
    #[arg(long)]
    smoothing: Option<usize>,
    /// none, zscore or minmax
    #[arg(long)]
    normalize: Option<String>,
}

impl PreprocessArgs {
    fn to_config(&self) -> Result<PreprocessingConfig> {
        let mut config = PreprocessingConfig {
            remove_outliers: self.remove_outliers,
            highpass: self.highpass,
            lowpass: self.lowpass,
            notch: self.notch,
            ..Default::default()
        };
        if let Some(window) = self.smoothing {
            config.smoothing = true;
            config.smoothing_window = window;
        }
        if let Some(mode) = &self.normalize {
            config.normalization = script::parse_normalization(mode)?;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print recording metadata and chunk layout as JSON
    Info {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Fetch one chunk (1-based index) and summarize it as JSON
    Chunk {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        index: usize,
        #[command(flatten)]
        preprocess: PreprocessArgs,
    },
    /// Replay a navigation script, printing one snapshot JSON line per step
    Navigate {
        #[command(flatten)]
        input: InputArgs,
        /// Comma-separated commands, e.g. "next,zoom-in,pan:-2,jump:5"
        #[arg(long)]
        script: String,
        /// View-state file restored on start and written on exit
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Render the windowed chunk with annotation markers to a PNG via plotters
    Render {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        index: usize,
        /// Window inside the chunk in seconds, as START:END
        #[arg(long)]
        window: Option<String>,
        #[command(flatten)]
        preprocess: PreprocessArgs,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 1200)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
    /// Write a synthetic multichannel CSV recording
    Synth {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4)]
        channels: usize,
        #[arg(long, default_value_t = 256.0)]
        fs: f64,
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    let mut config = match &cli.config {
        Some(path) => NavigatorConfig::load(path)?,
        None => NavigatorConfig::default(),
    };
    match cli.command {
        Commands::Info { input } => cmd_info(&input, &mut config)?,
        Commands::Chunk {
            input,
            index,
            preprocess,
        } => cmd_chunk(&input, index, &preprocess, &mut config)?,
        Commands::Navigate {
            input,
            script,
            state,
        } => cmd_navigate(&input, &script, state.as_deref(), &mut config)?,
        Commands::Render {
            input,
            index,
            window,
            preprocess,
            out,
            width,
            height,
        } => cmd_render(
            &input,
            index,
            window.as_deref(),
            &preprocess,
            &out,
            (width, height),
            &mut config,
        )?,
        Commands::Synth {
            out,
            channels,
            fs,
            seconds,
            seed,
        } => cmd_synth(&out, channels, fs, seconds, seed)?,
    }
    Ok(())
}

/// Recording, its annotations and a source able to serve it.
struct Session {
    source: LocalSource,
    recording: Recording,
    annotations: Vec<Annotation>,
}

fn open_session(input: &InputArgs, config: &mut NavigatorConfig) -> Result<Session> {
    if let Some(seconds) = input.chunk_seconds {
        config.chunk_size_seconds = seconds;
        config.validate()?;
    }
    let mut source = LocalSource::with_sample_rate(input.fs);
    let file_path = input.input.display().to_string();
    let recording = source
        .describe(&file_path)
        .with_context(|| format!("failed to open {}", input.input.display()))?;
    let annotations = match &input.annotations {
        Some(path) => chunk_io::load_annotations(path, &recording)?,
        None => Vec::new(),
    };
    source.set_annotations(&recording.file_path, annotations.clone());
    Ok(Session {
        source,
        recording,
        annotations,
    })
}

/// Run the fetch an outcome asks for, synchronously, and report failures.
fn settle(
    nav: &mut NavigationController,
    source: &mut LocalSource,
    outcome: Outcome,
) -> Result<()> {
    match outcome {
        Outcome::Fetch(ticket) => {
            let result = source.fetch(&ticket.request);
            match nav.complete_fetch(ticket.token, result) {
                Completion::Applied | Completion::Stale => Ok(()),
                Completion::Failed(err) => Err(anyhow!("fetch failed: {err}")),
                Completion::Unusable(err) => Err(anyhow!("data received but unusable: {err}")),
            }
        }
        Outcome::Unusable(err) => Err(anyhow!("data received but unusable: {err}")),
        Outcome::Rejected(reason) => Err(anyhow!("command rejected: {reason:?}")),
        _ => Ok(()),
    }
}

/// Open the session and bring chunk `index` (1-based) on screen.
///
/// Commands are queued before anything is fetched, so only the request that
/// survives them reaches the source.
fn show_chunk(
    input: &InputArgs,
    index: usize,
    preprocess: &PreprocessArgs,
    config: &mut NavigatorConfig,
) -> Result<(NavigationController, Session)> {
    if index == 0 {
        bail!("chunk index is 1-based");
    }
    let preprocessing = preprocess.to_config()?;
    let mut session = open_session(input, config)?;
    let mut nav = NavigationController::new(config.clone());
    let mut last = nav.open_file(
        session.recording.clone(),
        session.annotations.clone(),
        None,
    );
    for command in [
        NavCommand::SetPreprocessing(preprocessing),
        NavCommand::JumpToChunk(index),
    ] {
        match nav.handle(command) {
            Outcome::Unchanged => {}
            Outcome::Rejected(reason) => bail!("command rejected: {reason:?}"),
            outcome => last = outcome,
        }
    }
    settle(&mut nav, &mut session.source, last)?;
    Ok((nav, session))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoReport<'a> {
    #[serde(flatten)]
    recording: &'a Recording,
    duration: f64,
    chunk_size: usize,
    total_chunks: usize,
    annotations: usize,
}

fn cmd_info(input: &InputArgs, config: &mut NavigatorConfig) -> Result<()> {
    let session = open_session(input, config)?;
    let address = chunkview_lib::ChunkAddressSpace::with_chunk_seconds(
        session.recording.sample_rate,
        session.recording.total_samples,
        config.chunk_size_seconds,
    );
    let report = InfoReport {
        recording: &session.recording,
        duration: session.recording.duration(),
        chunk_size: address.chunk_size(),
        total_chunks: address.total_chunks(),
        annotations: session.annotations.len(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[derive(Serialize)]
struct ChannelSummary {
    label: String,
    min: f64,
    max: f64,
    mean: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkReport {
    chunk_start: usize,
    chunk_len: usize,
    chunk_index: usize,
    total_chunks: usize,
    has_next: bool,
    has_prev: bool,
    channels: Vec<ChannelSummary>,
    annotations: Vec<Annotation>,
}

fn cmd_chunk(
    input: &InputArgs,
    index: usize,
    preprocess: &PreprocessArgs,
    config: &mut NavigatorConfig,
) -> Result<()> {
    let (nav, _session) = show_chunk(input, index, preprocess, config)?;
    let snapshot = nav.snapshot();
    let view = snapshot
        .view
        .ok_or_else(|| anyhow!("no chunk on screen"))?;
    let channels = view
        .traces()?
        .into_iter()
        .map(|trace| {
            let data = &trace.series.data;
            let min = data.iter().copied().fold(f64::INFINITY, f64::min);
            let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = data.iter().sum::<f64>() / data.len().max(1) as f64;
            ChannelSummary {
                label: trace.label,
                min,
                max,
                mean,
            }
        })
        .collect();
    let report = ChunkReport {
        chunk_start: view.chunk_start,
        chunk_len: view.chunk_len,
        chunk_index: view.chunk_index,
        total_chunks: snapshot.total_chunks,
        has_next: view.has_next,
        has_prev: view.has_prev,
        channels,
        annotations: view.annotations,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[derive(Serialize)]
struct StepReport<'a> {
    step: &'a str,
    outcome: String,
    snapshot: Snapshot,
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::ViewChanged => "viewChanged".into(),
        Outcome::CacheHit => "cacheHit".into(),
        Outcome::Fetch(ticket) => format!("fetch#{}", ticket.token),
        Outcome::Unusable(_) => "unusable".into(),
        Outcome::Unchanged => "unchanged".into(),
        Outcome::Rejected(reason) => format!("rejected:{reason:?}"),
    }
}

/// Hand a fetch to the worker and wait until nothing is in flight.
fn drain(nav: &mut NavigationController, worker: &FetchWorker, outcome: &Outcome) -> Result<()> {
    if let Outcome::Fetch(ticket) = outcome {
        if !worker.submit(ticket.clone()) {
            bail!("fetch worker stopped");
        }
    }
    while let Some(token) = nav.pending_token() {
        let done = worker
            .recv_timeout(FETCH_TIMEOUT)
            .ok_or_else(|| anyhow!("timed out waiting for fetch #{token}"))?;
        if let Completion::Failed(err) = nav.complete_fetch(done.token, done.result) {
            log::warn!("fetch #{} failed: {err}", done.token);
        }
    }
    Ok(())
}

fn persist(
    store: &mut Option<JsonFileStore>,
    requests: Vec<chunkview_lib::navigation::PersistRequest>,
) -> Result<()> {
    if let Some(store) = store {
        for request in requests {
            store.save(&request.file_path, &request.state)?;
        }
    }
    Ok(())
}

fn cmd_navigate(
    input: &InputArgs,
    script_text: &str,
    state: Option<&Path>,
    config: &mut NavigatorConfig,
) -> Result<()> {
    let steps = script::parse_script(script_text)?;
    let session = open_session(input, config)?;
    let mut store = state.map(JsonFileStore::new);
    let saved = match &store {
        Some(store) => store.load(&session.recording.file_path)?,
        None => None,
    };
    let worker = FetchWorker::spawn(session.source);
    let mut nav = NavigationController::new(config.clone());

    let opened = nav.open_file(session.recording, session.annotations, saved);
    drain(&mut nav, &worker, &opened)?;
    print_step("open", &opened, &nav)?;
    for step in &steps {
        let outcome = nav.handle(step.command.clone());
        drain(&mut nav, &worker, &outcome)?;
        print_step(&step.text, &outcome, &nav)?;
        persist(&mut store, nav.poll_persist(Instant::now()))?;
    }
    persist(&mut store, nav.flush_persist())?;
    Ok(())
}

fn print_step(step: &str, outcome: &Outcome, nav: &NavigationController) -> Result<()> {
    let report = StepReport {
        step,
        outcome: outcome_label(outcome),
        snapshot: nav.snapshot(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn parse_window(text: &str) -> Result<(f64, f64)> {
    let (start, end) = text
        .split_once(':')
        .ok_or_else(|| anyhow!("window must look like START:END"))?;
    let start = start.trim().parse().context("window start")?;
    let end = end.trim().parse().context("window end")?;
    Ok((start, end))
}

fn cmd_render(
    input: &InputArgs,
    index: usize,
    window: Option<&str>,
    preprocess: &PreprocessArgs,
    out: &Path,
    size: (u32, u32),
    config: &mut NavigatorConfig,
) -> Result<()> {
    let (mut nav, _session) = show_chunk(input, index, preprocess, config)?;
    if let Some(text) = window {
        let (start, end) = parse_window(text)?;
        if let Outcome::Rejected(reason) = nav.handle(NavCommand::SetWindow { start, end }) {
            bail!("window {text} rejected: {reason:?}");
        }
    }
    let view = nav
        .snapshot()
        .view
        .ok_or_else(|| anyhow!("no chunk on screen"))?;
    let fig = figure_from_view(&view, size.0 as usize * 2)?;
    let mut backend = PngBackend {
        path: out.to_path_buf(),
        size,
    };
    backend.draw(&fig)?;
    log::info!("wrote {}", out.display());
    Ok(())
}

struct PngBackend {
    path: PathBuf,
    size: (u32, u32),
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let (data_x0, data_x1, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
        let [x_min, x_max] = fig.x.range.unwrap_or([data_x0, data_x1]);
        let (y_min, y_max) = if y_max > y_min {
            (y_min, y_max)
        } else {
            (y_min - 1.0, y_max + 1.0)
        };
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    let stroke = (line.style.width.round() as u32).max(1);
                    chart
                        .draw_series(plotters::series::LineSeries::new(
                            line.points.iter().map(|p| (p[0], p[1])),
                            RGBColor(r, g, b).stroke_width(stroke),
                        ))?
                        .label(line.name.clone())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], RGBColor(r, g, b))
                        });
                }
            }
        }
        for marker in &fig.markers {
            let (r, g, b) = marker.color.rgb();
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(marker.x, y_min), (marker.x, y_max)],
                RGBColor(r, g, b),
            )))?;
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    }
}

fn cmd_synth(out: &Path, channels: usize, fs: f64, seconds: f64, seed: u64) -> Result<()> {
    if channels == 0 {
        bail!("need at least one channel");
    }
    if !(fs.is_finite() && fs > 0.0 && seconds.is_finite() && seconds > 0.0) {
        bail!("fs and seconds must be positive");
    }
    let samples = (fs * seconds).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let freqs: Vec<f64> = (0..channels).map(|_| rng.gen_range(1.0..20.0)).collect();
    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    let mut header = vec!["time".to_string()];
    header.extend((1..=channels).map(|c| format!("ch{c}")));
    writer.write_record(&header)?;
    for i in 0..samples {
        let t = i as f64 / fs;
        let mut row = Vec::with_capacity(channels + 1);
        row.push(format!("{t:.6}"));
        for freq in &freqs {
            let value = (2.0 * std::f64::consts::PI * freq * t).sin() + rng.gen_range(-0.1..0.1);
            row.push(format!("{value:.6}"));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    log::info!("wrote {samples} samples x {channels} channels to {}", out.display());
    Ok(())
}
