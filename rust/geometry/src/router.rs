// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Router - dispatch of representation items to processors
//!
//! Each [`GeometryProcessor`] declares the entity kinds it handles; the
//! router maps kinds to processors and is shared read-only across the
//! extraction worker threads.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph};

use crate::error::{Error, Result};
use crate::mesh::{MeshBuilder, Primitive};
use crate::processors::{
    CurveProcessor, ExtrudedAreaSolidProcessor, FacetedBrepProcessor,
    TriangulatedFaceSetProcessor,
};

/// Turns one geometric representation item into mesh buffers
pub trait GeometryProcessor: Send + Sync {
    /// Mesh of `item` in its own coordinate system
    fn process(&self, item: &ResolvedEntity, graph: &ResolvedGraph) -> Result<MeshBuilder>;

    /// Entity kinds this processor accepts
    fn supported_kinds(&self) -> Vec<EntityKind>;

    /// How the produced index buffer is drawn
    fn primitive(&self) -> Primitive {
        Primitive::Triangles
    }
}

/// Routes items to processors by kind
#[derive(Clone)]
pub struct GeometryRouter {
    processors: FxHashMap<EntityKind, Arc<dyn GeometryProcessor>>,
}

impl GeometryRouter {
    /// Router with every built-in processor registered
    pub fn new() -> Self {
        let mut router = Self::empty();
        router.register(Arc::new(ExtrudedAreaSolidProcessor));
        router.register(Arc::new(TriangulatedFaceSetProcessor));
        router.register(Arc::new(FacetedBrepProcessor));
        router.register(Arc::new(CurveProcessor));
        router
    }

    pub fn empty() -> Self {
        Self {
            processors: FxHashMap::default(),
        }
    }

    /// Register a processor for all of its kinds, replacing earlier ones
    pub fn register(&mut self, processor: Arc<dyn GeometryProcessor>) {
        for kind in processor.supported_kinds() {
            self.processors.insert(kind, Arc::clone(&processor));
        }
    }

    pub fn supports(&self, kind: &EntityKind) -> bool {
        self.processors.contains_key(kind)
    }

    /// Process one item with the processor registered for its kind
    pub fn process(
        &self,
        item: &ResolvedEntity,
        graph: &ResolvedGraph,
    ) -> Result<(MeshBuilder, Primitive)> {
        let processor = self
            .processors
            .get(&item.kind)
            .ok_or_else(|| Error::Unsupported(item.kind.clone()))?;
        let mesh = processor.process(item, graph)?;
        Ok((mesh, processor.primitive()))
    }
}

impl Default for GeometryRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GeometryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.processors.keys().map(EntityKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("GeometryRouter").field("kinds", &kinds).finish()
    }
}
