// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry extraction
//!
//! Walks the extraction candidates of a [`ResolvedGraph`] and turns every
//! configured kind into a [`Geometry`]. Extraction is partial: unsupported
//! kinds are counted, broken entities are excluded and failures become
//! diagnostics; only cancellation aborts the run.
//!
//! Candidates are processed in batches on the rayon pool. The cancel token
//! is checked between batches.

use std::time::Instant;

use nalgebra::Matrix4;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use stepview_core::{
    length_unit_scale, DiagnosticKind, Diagnostics, EntityHandle, EntityKind, ResolvedEntity,
    ResolvedGraph, ResolvedValue, DEFAULT_MESSAGE_LIMIT,
};

use crate::error::{Error, Result};
use crate::mesh::{Geometry, MeshBuilder, Primitive};
use crate::placement::{local_placement, required};
use crate::router::GeometryRouter;
use crate::task::{CancelToken, Progress};

/// Default number of candidates per parallel batch
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Color used for kinds without an entry in the color table
pub const DEFAULT_COLOR: [f32; 3] = [0.6, 0.6, 0.6];

/// How a configured kind produces its mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Physical product: ObjectPlacement (attr 5) and Representation (attr 6)
    Product,
    /// The entity itself is a representation item
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionRule {
    pub color: [f32; 3],
    pub strategy: Strategy,
}

/// Which kinds are extracted, and how
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    rules: FxHashMap<EntityKind, ExtractionRule>,
    pub batch_size: usize,
    pub message_limit: usize,
}

impl ExtractorConfig {
    /// Configuration without any rule; every candidate is skipped
    pub fn empty() -> Self {
        Self {
            rules: FxHashMap::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    pub fn with_rule(mut self, kind: EntityKind, color: [f32; 3], strategy: Strategy) -> Self {
        self.set_rule(kind, color, strategy);
        self
    }

    pub fn set_rule(&mut self, kind: EntityKind, color: [f32; 3], strategy: Strategy) {
        self.rules.insert(kind, ExtractionRule { color, strategy });
    }

    pub fn remove_rule(&mut self, kind: &EntityKind) -> Option<ExtractionRule> {
        self.rules.remove(kind)
    }

    pub fn rule(&self, kind: &EntityKind) -> Option<&ExtractionRule> {
        self.rules.get(kind)
    }

    /// Static color for `kind`
    pub fn color(&self, kind: &EntityKind) -> [f32; 3] {
        self.rule(kind).map_or(DEFAULT_COLOR, |r| r.color)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        use EntityKind::*;
        use Strategy::{Item, Product};

        let products: [(EntityKind, [f32; 3]); 17] = [
            (Wall, [0.85, 0.85, 0.85]),
            (WallStandardCase, [0.85, 0.85, 0.85]),
            (Slab, [0.75, 0.70, 0.65]),
            (Beam, [0.4, 0.6, 0.8]),
            (Column, [0.3, 0.5, 0.7]),
            (Roof, [0.7, 0.35, 0.3]),
            (Stair, [0.7, 0.65, 0.6]),
            (Railing, [0.5, 0.5, 0.55]),
            (Covering, [0.8, 0.78, 0.72]),
            (CurtainWall, [0.55, 0.7, 0.8]),
            (Plate, [0.6, 0.75, 0.85]),
            (Member, [0.45, 0.5, 0.55]),
            (Footing, [0.55, 0.55, 0.5]),
            (Door, [0.6, 0.45, 0.3]),
            (Window, [0.6, 0.8, 0.9]),
            (BuildingElementProxy, DEFAULT_COLOR),
            (FurnishingElement, [0.65, 0.5, 0.4]),
        ];
        let items: [(EntityKind, [f32; 3]); 7] = [
            (Polyline, [0.9, 0.3, 0.3]),
            (IndexedPolyCurve, [0.9, 0.3, 0.3]),
            (FaceOuterBound, [0.3, 0.8, 0.3]),
            (ExtrudedAreaSolid, [0.7, 0.7, 0.7]),
            (TriangulatedFaceSet, [0.7, 0.7, 0.7]),
            (FacetedBrep, [0.7, 0.7, 0.7]),
            (ShellBasedSurfaceModel, [0.7, 0.7, 0.7]),
        ];

        let mut config = Self::empty();
        for (kind, color) in products {
            config.set_rule(kind, color, Product);
        }
        for (kind, color) in items {
            config.set_rule(kind, color, Item);
        }
        config
    }
}

/// Mesh of one entity and its placement in scene units (metres)
#[derive(Debug, Clone)]
pub struct ExtractedObject {
    pub entity_id: u64,
    pub kind: EntityKind,
    /// Name attribute of products, when present
    pub name: Option<String>,
    pub geometry: Geometry,
    pub transform: Matrix4<f32>,
}

/// Candidate counts of one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtractionSummary {
    pub candidates: usize,
    pub extracted: usize,
    /// Candidates whose kind has no rule
    pub skipped_unsupported: usize,
    /// Candidates excluded because of unresolved or cyclic references
    pub excluded_broken: usize,
    /// Configured candidates that produced no geometry
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub objects: Vec<ExtractedObject>,
    pub summary: ExtractionSummary,
    pub diagnostics: Diagnostics,
    /// Model length unit in metres
    pub unit_scale: f64,
}

/// Extract with the built-in processors
pub fn extract(
    graph: &ResolvedGraph,
    config: &ExtractorConfig,
    cancel: &CancelToken,
    progress: &Progress,
) -> Result<Extraction> {
    Extractor::new(config.clone()).extract(graph, cancel, progress)
}

/// Configured extractor with its processor router
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
    router: GeometryRouter,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            router: GeometryRouter::new(),
        }
    }

    pub fn with_router(config: ExtractorConfig, router: GeometryRouter) -> Self {
        Self { config, router }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn extract(
        &self,
        graph: &ResolvedGraph,
        cancel: &CancelToken,
        progress: &Progress,
    ) -> Result<Extraction> {
        let start = Instant::now();
        let unit_scale = length_unit_scale(graph);
        let mut summary = ExtractionSummary::default();
        let mut diagnostics = Diagnostics::with_limit(self.config.message_limit);

        let mut work: Vec<(EntityHandle, ExtractionRule)> = Vec::new();
        for handle in graph.candidates() {
            summary.candidates += 1;
            let entity = graph.get(handle);
            let Some(rule) = self.config.rule(&entity.kind) else {
                summary.skipped_unsupported += 1;
                tracing::trace!(entity = entity.id, kind = %entity.kind, "no extraction rule");
                continue;
            };
            if !graph.status(handle).is_ok() {
                summary.excluded_broken += 1;
                continue;
            }
            work.push((handle, *rule));
        }

        progress.begin(work.len());
        let batch_size = self.config.batch_size.max(1);
        let mut objects = Vec::with_capacity(work.len());

        for batch in work.chunks(batch_size) {
            cancel.check()?;
            let results: Vec<(u64, Result<ExtractedObject>)> = batch
                .par_iter()
                .map(|&(handle, rule)| {
                    let entity = graph.get(handle);
                    (entity.id, self.extract_one(graph, entity, rule, unit_scale))
                })
                .collect();

            for (id, result) in results {
                match result {
                    Ok(object) => objects.push(object),
                    Err(err) => {
                        summary.failed += 1;
                        tracing::debug!(entity = id, error = %err, "extraction failed");
                        diagnostics.push(DiagnosticKind::ExtractionFailed, Some(id), err.to_string());
                    }
                }
            }
            progress.advance(batch.len());
        }
        cancel.check()?;

        summary.extracted = objects.len();
        tracing::info!(
            candidates = summary.candidates,
            extracted = summary.extracted,
            skipped_unsupported = summary.skipped_unsupported,
            excluded_broken = summary.excluded_broken,
            failed = summary.failed,
            unit_scale,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "geometry extracted"
        );

        Ok(Extraction {
            objects,
            summary,
            diagnostics,
            unit_scale,
        })
    }

    fn extract_one(
        &self,
        graph: &ResolvedGraph,
        entity: &ResolvedEntity,
        rule: ExtractionRule,
        unit_scale: f64,
    ) -> Result<ExtractedObject> {
        let (mut mesh, primitive, mut transform) = match rule.strategy {
            Strategy::Item => {
                let (mesh, primitive) = self.router.process(entity, graph)?;
                (mesh, primitive, Matrix4::identity())
            }
            Strategy::Product => {
                let transform = match graph.follow(entity, 5) {
                    Some(placement) => local_placement(graph, placement)?,
                    None => Matrix4::identity(),
                };
                let (mesh, primitive) = self.product_mesh(graph, entity)?;
                (mesh, primitive, transform)
            }
        };

        // Geometry and placement offsets move to metres; rotations are unitless
        if unit_scale != 1.0 {
            mesh.scale(unit_scale as f32);
            for row in 0..3 {
                transform[(row, 3)] *= unit_scale;
            }
        }

        let name = match rule.strategy {
            Strategy::Product => entity.get(2).and_then(ResolvedValue::as_str).map(str::to_owned),
            Strategy::Item => None,
        };
        let geometry = Geometry::new(entity.id, entity.kind.clone(), primitive, mesh, rule.color)?;
        Ok(ExtractedObject {
            entity_id: entity.id,
            kind: entity.kind.clone(),
            name,
            geometry,
            transform: transform.cast::<f32>(),
        })
    }

    /// Merge the items of the preferred shape representation. Triangle
    /// items win over line items.
    fn product_mesh(
        &self,
        graph: &ResolvedGraph,
        product: &ResolvedEntity,
    ) -> Result<(MeshBuilder, Primitive)> {
        let shape = required(graph, product, 6)?;
        if shape.kind != EntityKind::ProductDefinitionShape {
            return Err(Error::UnexpectedKind {
                entity: shape.id,
                expected: "IFCPRODUCTDEFINITIONSHAPE",
                found: shape.kind.clone(),
            });
        }

        // IfcProductDefinitionShape: Name, Description, Representations
        let mut representations: SmallVec<[&ResolvedEntity; 4]> = shape
            .get(2)
            .and_then(ResolvedValue::as_list)
            .unwrap_or(&[])
            .iter()
            .filter_map(ResolvedValue::as_handle)
            .map(|h| graph.get(h))
            .filter(|r| r.kind == EntityKind::ShapeRepresentation)
            .collect();
        // IfcShapeRepresentation: ContextOfItems, RepresentationIdentifier, RepresentationType, Items
        representations.sort_by_key(|r| r.get(1).and_then(ResolvedValue::as_str) != Some("Body"));

        let mut first_error = None;
        for representation in representations {
            let mut triangles = MeshBuilder::new();
            let mut lines = MeshBuilder::new();
            let items = representation
                .get(3)
                .and_then(ResolvedValue::as_list)
                .unwrap_or(&[]);
            for item in items.iter().filter_map(ResolvedValue::as_handle).map(|h| graph.get(h)) {
                if !self.router.supports(&item.kind) {
                    tracing::trace!(item = item.id, kind = %item.kind, "representation item skipped");
                    continue;
                }
                match self.router.process(item, graph) {
                    Ok((mesh, Primitive::Triangles)) => triangles.merge(&mesh),
                    Ok((mesh, Primitive::Lines)) => lines.merge(&mesh),
                    Err(err) => {
                        tracing::debug!(product = product.id, item = item.id, error = %err, "item failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            if !triangles.is_empty() {
                return Ok((triangles, Primitive::Triangles));
            }
            if !lines.is_empty() {
                return Ok((lines, Primitive::Lines));
            }
        }

        Err(first_error.unwrap_or_else(|| {
            Error::geometry(format!("#{}: no supported representation items", product.id))
        }))
    }
}
