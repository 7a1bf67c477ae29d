// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration loaded from environment variables.

use stepview_core::DEFAULT_MESSAGE_LIMIT;
use stepview_geometry::{ExtractorConfig, DEFAULT_BATCH_SIZE};

use crate::lod::LodThresholds;

/// Viewer configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Distance thresholds for LOD selection.
    pub lod: LodThresholds,
    /// Candidates per extraction batch (cancellation granularity).
    pub extract_batch: usize,
    /// Diagnostic messages kept verbatim per load.
    pub max_diagnostics: usize,
    /// Viewport size in pixels.
    pub viewport: (u32, u32),
    /// Frame rate the driver aims for.
    pub target_fps: u32,
    /// Number of worker threads for parallel processing.
    pub worker_threads: usize,
    /// Instance color for selected objects.
    pub highlight_color: [f32; 3],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            lod: LodThresholds::default(),
            extract_batch: DEFAULT_BATCH_SIZE,
            max_diagnostics: DEFAULT_MESSAGE_LIMIT,
            viewport: (1280, 720),
            target_fps: 60,
            worker_threads: num_cpus::get(),
            highlight_color: [1.0, 0.55, 0.0],
        }
    }
}

impl ViewerConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparsable values fall back to their defaults. LOD thresholds that do
    /// not increase are replaced by the defaults as a whole.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let medium = std::env::var("STEPVIEW_LOD_MEDIUM_M")
            .unwrap_or_else(|_| defaults.lod.medium.to_string())
            .parse()
            .unwrap_or(defaults.lod.medium);
        let low = std::env::var("STEPVIEW_LOD_LOW_M")
            .unwrap_or_else(|_| defaults.lod.low.to_string())
            .parse()
            .unwrap_or(defaults.lod.low);
        let minimal = std::env::var("STEPVIEW_LOD_MINIMAL_M")
            .unwrap_or_else(|_| defaults.lod.minimal.to_string())
            .parse()
            .unwrap_or(defaults.lod.minimal);
        let lod = LodThresholds::new(medium, low, minimal).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring LOD thresholds from environment");
            defaults.lod
        });

        Self {
            lod,
            extract_batch: std::env::var("STEPVIEW_EXTRACT_BATCH")
                .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
                .parse()
                .ok()
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            max_diagnostics: std::env::var("STEPVIEW_MAX_DIAGNOSTICS")
                .unwrap_or_else(|_| DEFAULT_MESSAGE_LIMIT.to_string())
                .parse()
                .unwrap_or(DEFAULT_MESSAGE_LIMIT),
            viewport: std::env::var("STEPVIEW_VIEWPORT")
                .ok()
                .and_then(|v| parse_viewport(&v))
                .unwrap_or(defaults.viewport),
            target_fps: std::env::var("STEPVIEW_TARGET_FPS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .ok()
                .filter(|&n: &u32| n > 0)
                .unwrap_or(60),
            worker_threads: std::env::var("STEPVIEW_WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .unwrap_or_else(|_| num_cpus::get()),
            highlight_color: defaults.highlight_color,
        }
    }

    /// Extractor settings derived from this configuration
    pub fn extractor_config(&self) -> ExtractorConfig {
        let mut config = ExtractorConfig::default();
        config.batch_size = self.extract_batch;
        config.message_limit = self.max_diagnostics;
        config
    }

    /// Time budget of one frame in milliseconds
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}

/// `"1280x720"` into `(1280, 720)`
fn parse_viewport(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}
