// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading: parse, resolve, extract and index, either inline or as
//! a background task on the rayon pool.
//!
//! A background load reports exactly once through an `mpsc` channel that
//! the viewer polls without blocking. Dropping the [`LoadHandle`] or
//! calling [`LoadHandle::cancel`] stops the task at the next stage or
//! extraction batch boundary.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use stepview_core::{DiagnosticsSummary, EntityGraph, ResolvedGraph, SpatialTree};
use stepview_geometry::{CancelToken, ExtractionSummary, Extractor, LoadStage, Progress};

use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::scene::SceneIndex;

/// What a load found and how long each stage took
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub schema: Option<String>,
    pub entities: usize,
    pub objects: usize,
    pub geometries: usize,
    pub triangles: usize,
    /// Metres per model length unit
    pub unit_scale: f64,
    pub extraction: ExtractionSummary,
    pub diagnostics: DiagnosticsSummary,
    pub parse_ms: f64,
    pub resolve_ms: f64,
    pub extract_ms: f64,
    pub index_ms: f64,
}

/// A fully indexed model ready to be swapped in
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub scene: Arc<SceneIndex>,
    /// Entity graph kept for queries
    pub graph: Arc<ResolvedGraph>,
    pub spatial: Arc<SpatialTree>,
    pub report: LoadReport,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Run the whole pipeline on the calling thread
///
/// Only a file that is not STEP or has no `DATA` section fails; broken
/// entities degrade into diagnostics and a partial model.
pub fn load_model(
    bytes: &[u8],
    config: &ViewerConfig,
    cancel: &CancelToken,
    progress: &Progress,
) -> Result<LoadedModel> {
    progress.set_stage(LoadStage::Parsing);
    let start = Instant::now();
    let text = String::from_utf8_lossy(bytes);
    let graph = EntityGraph::parse_with_limit(&text, config.max_diagnostics)?;
    let parse_ms = elapsed_ms(start);
    tracing::debug!(entities = graph.len(), parse_ms, "parsed");
    cancel.check()?;

    progress.set_stage(LoadStage::Resolving);
    let start = Instant::now();
    let resolved = ResolvedGraph::resolve(graph);
    let spatial = SpatialTree::build(&resolved);
    let resolve_ms = elapsed_ms(start);
    cancel.check()?;

    progress.set_stage(LoadStage::Extracting);
    let start = Instant::now();
    let extraction = Extractor::new(config.extractor_config()).extract(&resolved, cancel, progress)?;
    let extract_ms = elapsed_ms(start);
    cancel.check()?;

    progress.set_stage(LoadStage::Indexing);
    let start = Instant::now();
    let scene = SceneIndex::build(extraction.objects);
    let index_ms = elapsed_ms(start);

    let mut diagnostics = resolved.diagnostics().clone();
    diagnostics.merge(extraction.diagnostics);

    let report = LoadReport {
        schema: resolved.header().schema().map(str::to_string),
        entities: resolved.len(),
        objects: scene.object_count(),
        geometries: scene.geometry_count(),
        triangles: scene.triangle_count(),
        unit_scale: extraction.unit_scale,
        extraction: extraction.summary,
        diagnostics: diagnostics.summary(),
        parse_ms,
        resolve_ms,
        extract_ms,
        index_ms,
    };
    progress.set_stage(LoadStage::Done);
    tracing::info!(
        objects = report.objects,
        geometries = report.geometries,
        diagnostics = report.diagnostics.total,
        skipped_unsupported = report.extraction.skipped_unsupported,
        "model loaded"
    );

    Ok(LoadedModel {
        scene: Arc::new(scene),
        graph: Arc::new(resolved),
        spatial: Arc::new(spatial),
        report,
    })
}

/// Handle to a background load
#[derive(Debug)]
pub struct LoadHandle {
    receiver: Receiver<Result<LoadedModel>>,
    cancel: CancelToken,
    progress: Progress,
}

impl LoadHandle {
    /// Start loading `bytes` on the rayon pool
    pub fn spawn(bytes: Arc<[u8]>, config: ViewerConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancelToken::new();
        let progress = Progress::new();
        progress.set_stage(LoadStage::Queued);

        let task_cancel = cancel.clone();
        let task_progress = progress.clone();
        rayon::spawn(move || {
            let result = load_model(&bytes, &config, &task_cancel, &task_progress);
            if let Err(err) = &result {
                tracing::debug!(error = %err, "background load ended with an error");
            }
            // The receiver is gone when the load was superseded
            let _ = sender.send(result);
        });

        Self {
            receiver,
            cancel,
            progress,
        }
    }

    /// Result of the load once finished; `None` while still running
    pub fn try_recv(&self) -> Option<Result<LoadedModel>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::LoaderDisconnected)),
        }
    }

    /// Block until the load finishes
    pub fn wait(self) -> Result<LoadedModel> {
        self.receiver.recv().map_err(|_| Error::LoaderDisconnected)?
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_WALLS: &str = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCCARTESIANPOINT((0.,0.,0.));
#2=IFCDIRECTION((0.,0.,1.));
#3=IFCDIRECTION((1.,0.,0.));
#4=IFCAXIS2PLACEMENT3D(#1,#2,#3);
#5=IFCGEOMETRICREPRESENTATIONCONTEXT($,'Model',3,1.E-05,#4,$);
#6=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,4.,0.2);
#7=IFCEXTRUDEDAREASOLID(#6,#4,#2,3.);
#8=IFCSHAPEREPRESENTATION(#5,'Body','SweptSolid',(#7));
#9=IFCPRODUCTDEFINITIONSHAPE($,$,(#8));
#10=IFCLOCALPLACEMENT($,#4);
#11=IFCWALL('a',$,'A',$,$,#10,#9,$);
#12=IFCWALL('b',$,'B',$,$,#10,#9,$);
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_load_model_reports_stages() {
        let progress = Progress::new();
        let model = load_model(TWO_WALLS.as_bytes(), &ViewerConfig::default(), &CancelToken::new(), &progress).unwrap();
        assert_eq!(model.report.objects, 2);
        assert_eq!(model.report.geometries, 1);
        assert_eq!(model.report.schema.as_deref(), Some("IFC4"));
        assert_eq!(model.report.extraction.extracted, 2);
        assert_eq!(progress.stage(), LoadStage::Done);
    }

    #[test]
    fn test_not_step_fails() {
        let err = load_model(b"hello", &ViewerConfig::default(), &CancelToken::new(), &Progress::new()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = load_model(TWO_WALLS.as_bytes(), &ViewerConfig::default(), &cancel, &Progress::new()).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!err.is_load_failure());
        assert!(!Error::LoaderDisconnected.is_load_failure());
    }

    #[test]
    fn test_background_load_delivers_once() {
        let handle = LoadHandle::spawn(Arc::from(TWO_WALLS.as_bytes()), ViewerConfig::default());
        let model = handle.wait().unwrap();
        assert_eq!(model.scene.object_count(), 2);
    }
}
