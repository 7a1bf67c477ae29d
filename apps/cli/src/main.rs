// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! StepView headless driver.
//!
//! Loads an IFC file in the background, renders frames against the
//! headless backend while orbiting the camera, and prints load report,
//! model statistics and the last frame as JSON.
//!
//! ```text
//! stepview model.ifc --frames 240 --threads 8
//! ```
//!
//! # Environment
//!
//! - `RUST_LOG` - log filter (default `info,stepview=debug`)
//! - `STEPVIEW_LOG_JSON=1` - same as `--json-logs`
//! - `STEPVIEW_*` - viewer settings, see `ViewerConfig::from_env`

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use stepview_viewer::{
    CameraInput, FrameStats, HeadlessBackend, LoadReport, ModelStats, Viewer, ViewerConfig,
    ViewerState,
};

/// Load an IFC file, render frames headlessly and print statistics as JSON
#[derive(Parser)]
#[command(name = "stepview")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IFC (STEP) file to load
    file: PathBuf,

    /// Frames to render while orbiting the model
    #[arg(short, long, default_value_t = 120)]
    frames: usize,

    /// Worker threads (default: STEPVIEW_WORKER_THREADS or CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Give up waiting for the load after this many seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Log JSON lines instead of pretty output
    #[arg(long, env = "STEPVIEW_LOG_JSON", value_parser = clap::builder::BoolishValueParser::new())]
    json_logs: bool,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    file: String,
    state: ViewerState,
    load: Option<&'a LoadReport>,
    stats: ModelStats,
    last_frame: FrameStats,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,stepview=debug"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);
    let (path, frames) = (args.file, args.frames);
    let load_timeout = Duration::from_secs(args.timeout_secs);
    let mut config = ViewerConfig::from_env();
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }

    tracing::info!(
        file = %path.display(),
        frames,
        worker_threads = config.worker_threads,
        extract_batch = config.extract_batch,
        lod_medium_m = config.lod.medium,
        lod_low_m = config.lod.low,
        lod_minimal_m = config.lod.minimal,
        "Starting StepView"
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads.max(1))
        .build_global()
        .context("failed to initialize rayon thread pool")?;

    let bytes = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let frame_budget = Duration::from_secs_f64(config.frame_budget_ms() / 1000.0);
    let mut viewer = Viewer::new(HeadlessBackend::new(), config);

    let started = Instant::now();
    viewer.load(bytes);
    let mut last_stage = None;
    while viewer.state() == ViewerState::Loading {
        if started.elapsed() > load_timeout {
            bail!("load did not finish within {:?}", load_timeout);
        }
        if let Some(progress) = viewer.load_progress() {
            let stage = progress.stage();
            if last_stage != Some(stage) {
                tracing::debug!(stage = stage.as_str(), "loading");
                last_stage = Some(stage);
            }
        }
        if let Some(Err(err)) = viewer.poll_load() {
            return Err(err).with_context(|| format!("failed to load {}", path.display()));
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let mut last_frame = FrameStats::default();
    let orbit_step = std::f32::consts::TAU / frames.max(1) as f32;
    for _ in 0..frames {
        let tick = Instant::now();
        last_frame = viewer.frame(&[CameraInput::Orbit {
            yaw: orbit_step,
            pitch: 0.0,
        }]);
        if let Some(rest) = frame_budget.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    viewer.pause();

    let summary = RunSummary {
        file: path.display().to_string(),
        state: viewer.state(),
        load: viewer.report(),
        stats: viewer.stats(),
        last_frame,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let metrics = viewer.metrics();
    tracing::info!(
        frames = metrics.frames,
        mean_frame_ms = metrics.mean_frame_ms,
        max_frame_ms = metrics.max_frame_ms,
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_and_flags() {
        let args = Args::try_parse_from(["stepview", "model.ifc"]).unwrap();
        assert_eq!(args.file, PathBuf::from("model.ifc"));
        assert_eq!(args.frames, 120);
        assert_eq!(args.threads, None);
        assert_eq!(args.timeout_secs, 600);

        let args = Args::try_parse_from(["stepview", "a.ifc", "--frames", "10", "-t", "2", "--json-logs"]).unwrap();
        assert_eq!(args.frames, 10);
        assert_eq!(args.threads, Some(2));
        assert!(args.json_logs);

        assert!(Args::try_parse_from(["stepview"]).is_err());
        assert!(Args::try_parse_from(["stepview", "a.ifc", "--frames", "many"]).is_err());
    }
}
