// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exported model statistics

use serde::Serialize;

use crate::loader::LoadReport;
use crate::render::FrameMetrics;

/// Objects drawn per level in the last frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LodCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub minimal: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelStats {
    pub objects: usize,
    pub triangles: usize,
    pub lod: LodCounts,
    pub parse_ms: f64,
    pub extraction_ms: f64,
    /// Mean over rendered frames
    pub frame_ms: f64,
    pub frames: u64,
    pub diagnostics: usize,
    pub skipped_unsupported: usize,
}

impl ModelStats {
    pub fn new(report: Option<&LoadReport>, metrics: &FrameMetrics) -> Self {
        let last = &metrics.last;
        let mut stats = Self {
            lod: LodCounts {
                high: last.high,
                medium: last.medium,
                low: last.low,
                minimal: last.minimal,
            },
            frame_ms: metrics.mean_frame_ms,
            frames: metrics.frames,
            ..Self::default()
        };
        if let Some(report) = report {
            stats.objects = report.objects;
            stats.triangles = report.triangles;
            stats.parse_ms = report.parse_ms;
            stats.extraction_ms = report.extract_ms;
            stats.diagnostics = report.diagnostics.total;
            stats.skipped_unsupported = report.extraction.skipped_unsupported;
        }
        stats
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
