// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity reference resolution
//!
//! Replaces `#id` parameters with [`EntityHandle`]s into the resolved
//! entity table. Parameter bodies are moved, never copied.
//!
//! After translation an iterative depth-first walk (white/grey/black
//! colouring) propagates breakage: entities with dangling references are
//! [`EntityStatus::Unresolved`], entities on a reference cycle are
//! [`EntityStatus::Cyclic`] and everything that reaches either becomes
//! [`EntityStatus::BrokenDependency`]. Only [`EntityStatus::Ok`] entities
//! are handed to geometry extraction.
//!
//! Breakage only travels along shape edges. Products and spatial elements
//! depend on their ObjectPlacement and Representation attributes alone, and
//! nothing depends on ownership, unit, context or property resources, so a
//! dangling `IfcOwnerHistory` is diagnosed without excluding any product.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::Error;
use crate::graph::{Entity, EntityGraph};
use crate::header::FileHeader;
use crate::schema::EntityKind;
use crate::value::Value;

/// Index of an entity in a [`ResolvedGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(u32);

impl EntityHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parameter value with references linked
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Integer(i64),
    Real(f64),
    String(String),
    Enum(String),
    /// Link to another entity of the same graph
    Ref(EntityHandle),
    /// Reference to an id that is not in the file
    Unresolved(u64),
    List(Vec<ResolvedValue>),
    Typed(String, Vec<ResolvedValue>),
    Omitted,
    Derived,
}

impl ResolvedValue {
    #[inline]
    pub fn as_handle(&self) -> Option<EntityHandle> {
        match self {
            ResolvedValue::Ref(handle) => Some(*handle),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResolvedValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            ResolvedValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResolvedValue::Real(f) => Some(*f),
            ResolvedValue::Integer(i) => Some(*i as f64),
            ResolvedValue::Typed(_, args) if args.len() == 1 => args[0].as_f64(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ResolvedValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_enum()? {
            "T" | "TRUE" => Some(true),
            "F" | "FALSE" => Some(false),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[ResolvedValue]> {
        match self {
            ResolvedValue::List(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn is_omitted(&self) -> bool {
        matches!(self, ResolvedValue::Omitted | ResolvedValue::Derived)
    }
}

/// Entity whose references point at other resolved entities
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub id: u64,
    pub kind: EntityKind,
    pub params: Vec<ResolvedValue>,
}

impl ResolvedEntity {
    #[inline]
    pub fn get(&self, index: usize) -> Option<&ResolvedValue> {
        self.params.get(index)
    }

    #[inline]
    pub fn get_handle(&self, index: usize) -> Option<EntityHandle> {
        self.get(index).and_then(ResolvedValue::as_handle)
    }

    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(ResolvedValue::as_f64)
    }

    /// `$`, `*` or missing
    #[inline]
    pub fn is_omitted(&self, index: usize) -> bool {
        self.get(index).map_or(true, ResolvedValue::is_omitted)
    }
}

/// Whether an entity may be used for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Ok,
    /// Has at least one reference to a missing id
    Unresolved,
    /// Lies on a reference cycle
    Cyclic,
    /// Reaches an unresolved or cyclic entity
    BrokenDependency,
}

impl EntityStatus {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == EntityStatus::Ok
    }
}

/// Number of entities per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ok: usize,
    pub unresolved: usize,
    pub cyclic: usize,
    pub broken_dependency: usize,
}

/// Validated entity graph
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    header: FileHeader,
    entities: Vec<ResolvedEntity>,
    index: FxHashMap<u64, EntityHandle>,
    status: Vec<EntityStatus>,
    consumed: Vec<bool>,
    diagnostics: Diagnostics,
}

type Edges = SmallVec<[u32; 8]>;

const WHITE: u8 = 0;
const GREY: u8 = 1;
const BLACK: u8 = 2;

/// IfcProduct attributes that carry geometry
const OBJECT_PLACEMENT: usize = 5;
const REPRESENTATION: usize = 6;

/// Whether attribute `index` of a `kind` entity feeds its shape
#[inline]
fn is_shape_attribute(kind: &EntityKind, index: usize) -> bool {
    if kind.is_product() || kind.is_spatial() {
        matches!(index, OBJECT_PLACEMENT | REPRESENTATION)
    } else {
        true
    }
}

impl ResolvedGraph {
    /// Link every reference of `graph` and classify each entity
    pub fn resolve(graph: EntityGraph) -> Self {
        let (header, entities, index, mut diagnostics) = graph.into_parts();
        let n = entities.len();

        let handles: FxHashMap<u64, EntityHandle> = index
            .into_iter()
            .map(|(id, position)| (id, EntityHandle(position as u32)))
            .collect();

        let mut resolved = Vec::with_capacity(n);
        let mut edges: Vec<Edges> = Vec::with_capacity(n);
        let mut shape_edges: Vec<Edges> = Vec::with_capacity(n);
        let mut status = vec![EntityStatus::Ok; n];
        let mut consumed = vec![false; n];

        for (position, Entity { id, kind, params }) in entities.into_iter().enumerate() {
            let mut out = Edges::new();
            let mut shape = Edges::new();
            let mut missing: SmallVec<[u64; 2]> = SmallVec::new();
            let mut blocking = false;
            let params: Vec<ResolvedValue> = params
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    let (first_edge, first_missing) = (out.len(), missing.len());
                    let linked = link(value, &handles, &mut out, &mut missing);
                    if is_shape_attribute(&kind, index) {
                        shape.extend_from_slice(&out[first_edge..]);
                        blocking |= missing.len() > first_missing;
                    }
                    linked
                })
                .collect();

            if !kind.is_relationship() {
                for &target in &out {
                    consumed[target as usize] = true;
                }
            }

            if let Some(&target) = missing.first() {
                if blocking {
                    status[position] = EntityStatus::Unresolved;
                }
                let mut message = Error::UnresolvedReference { owner: id, target }.to_string();
                if missing.len() > 1 {
                    message.push_str(&format!(" (and {} more)", missing.len() - 1));
                }
                diagnostics.push(DiagnosticKind::UnresolvedReference, Some(id), message);
            }

            edges.push(out);
            shape_edges.push(shape);
            resolved.push(ResolvedEntity { id, kind, params });
        }

        // Resources that never shape anything do not pass breakage on
        for targets in &mut shape_edges {
            targets.retain(|target| !resolved[*target as usize].kind.is_non_geometric());
        }
        propagate(&resolved, &edges, &shape_edges, &mut status, &mut diagnostics);

        let graph = ResolvedGraph {
            header,
            entities: resolved,
            index: handles,
            status,
            consumed,
            diagnostics,
        };
        let counts = graph.status_counts();
        tracing::debug!(
            entities = n,
            unresolved = counts.unresolved,
            cyclic = counts.cyclic,
            broken_dependency = counts.broken_dependency,
            "references resolved"
        );
        graph
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn get(&self, handle: EntityHandle) -> &ResolvedEntity {
        &self.entities[handle.index()]
    }

    #[inline]
    pub fn handle(&self, id: u64) -> Option<EntityHandle> {
        self.index.get(&id).copied()
    }

    pub fn by_id(&self, id: u64) -> Option<&ResolvedEntity> {
        self.handle(id).map(|h| self.get(h))
    }

    #[inline]
    pub fn status(&self, handle: EntityHandle) -> EntityStatus {
        self.status[handle.index()]
    }

    /// Referenced by some non-relationship entity
    #[inline]
    pub fn is_consumed(&self, handle: EntityHandle) -> bool {
        self.consumed[handle.index()]
    }

    /// Follow the reference stored at `index` of `entity`
    #[inline]
    pub fn follow(&self, entity: &ResolvedEntity, index: usize) -> Option<&ResolvedEntity> {
        entity.get_handle(index).map(|h| self.get(h))
    }

    /// Entities in file order with their handles
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &ResolvedEntity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityHandle(i as u32), e))
    }

    /// First entity of a kind
    pub fn first_of_kind(&self, kind: &EntityKind) -> Option<EntityHandle> {
        self.iter().find(|(_, e)| &e.kind == kind).map(|(h, _)| h)
    }

    /// Top-level entities that may produce geometry on their own: not
    /// referenced by another (non-relationship) entity and not a resource,
    /// relationship or spatial container.
    pub fn candidates(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.iter()
            .filter(|(h, e)| !self.is_consumed(*h) && !e.kind.is_non_geometric())
            .map(|(h, _)| h)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in &self.status {
            match status {
                EntityStatus::Ok => counts.ok += 1,
                EntityStatus::Unresolved => counts.unresolved += 1,
                EntityStatus::Cyclic => counts.cyclic += 1,
                EntityStatus::BrokenDependency => counts.broken_dependency += 1,
            }
        }
        counts
    }
}

fn link(
    value: Value,
    handles: &FxHashMap<u64, EntityHandle>,
    edges: &mut Edges,
    missing: &mut SmallVec<[u64; 2]>,
) -> ResolvedValue {
    match value {
        Value::Integer(i) => ResolvedValue::Integer(i),
        Value::Real(f) => ResolvedValue::Real(f),
        Value::String(s) => ResolvedValue::String(s),
        Value::Enum(s) => ResolvedValue::Enum(s),
        Value::Omitted => ResolvedValue::Omitted,
        Value::Derived => ResolvedValue::Derived,
        Value::EntityRef(id) => match handles.get(&id) {
            Some(&handle) => {
                edges.push(handle.0);
                ResolvedValue::Ref(handle)
            }
            None => {
                missing.push(id);
                ResolvedValue::Unresolved(id)
            }
        },
        Value::List(items) => ResolvedValue::List(
            items
                .into_iter()
                .map(|v| link(v, handles, edges, missing))
                .collect(),
        ),
        Value::Typed(name, args) => ResolvedValue::Typed(
            name,
            args.into_iter()
                .map(|v| link(v, handles, edges, missing))
                .collect(),
        ),
    }
}

/// Colour the reference graph depth-first without recursion. Cycles are
/// found over every edge; breakage spreads over `shape_edges` only.
fn propagate(
    entities: &[ResolvedEntity],
    edges: &[Edges],
    shape_edges: &[Edges],
    status: &mut [EntityStatus],
    diagnostics: &mut Diagnostics,
) {
    let n = entities.len();
    let mut colour = vec![WHITE; n];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if colour[root] != WHITE {
            continue;
        }
        colour[root] = GREY;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if let Some(&child) = edges[node].get(next) {
                top.1 += 1;
                let child = child as usize;
                match colour[child] {
                    WHITE => {
                        colour[child] = GREY;
                        stack.push((child, 0));
                    }
                    GREY => {
                        // Back edge: everything from `child` to the top is on the cycle
                        let start = stack
                            .iter()
                            .rposition(|&(n, _)| n == child)
                            .unwrap_or(stack.len() - 1);
                        for &(member, _) in &stack[start..] {
                            status[member] = EntityStatus::Cyclic;
                        }
                        diagnostics.push(
                            DiagnosticKind::CyclicReference,
                            Some(entities[child].id),
                            format!(
                                "{} ({} entities)",
                                Error::CyclicReference(entities[child].id),
                                stack.len() - start
                            ),
                        );
                    }
                    _ => {}
                }
            } else {
                stack.pop();
                colour[node] = BLACK;
                if status[node] == EntityStatus::Ok
                    && shape_edges[node]
                        .iter()
                        .any(|&child| !status[child as usize].is_ok())
                {
                    status[node] = EntityStatus::BrokenDependency;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(data: &str) -> ResolvedGraph {
        let content = format!("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{}\nENDSEC;\n", data);
        ResolvedGraph::resolve(EntityGraph::parse(&content).unwrap())
    }

    #[test]
    fn test_references_become_handles() {
        let graph = resolve(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCCARTESIANPOINT((1.,0.,0.));\n#3=IFCPOLYLINE((#1,#2));",
        );
        let polyline = graph.by_id(3).unwrap();
        let points = polyline.get(0).unwrap().as_list().unwrap();
        let first = graph.get(points[0].as_handle().unwrap());
        assert_eq!(first.id, 1);
        assert!(graph.diagnostics().is_empty());
        assert!(graph.is_consumed(graph.handle(1).unwrap()));
        assert!(!graph.is_consumed(graph.handle(3).unwrap()));
    }

    #[test]
    fn test_dangling_reference_is_diagnosed_once_per_owner() {
        let graph = resolve(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCPOLYLINE((#1,#98,#99));\n#3=IFCPOLYLINE((#1,#1));",
        );
        assert_eq!(
            graph.diagnostics().count(DiagnosticKind::UnresolvedReference),
            1
        );
        assert_eq!(graph.status(graph.handle(2).unwrap()), EntityStatus::Unresolved);
        assert_eq!(graph.status(graph.handle(3).unwrap()), EntityStatus::Ok);
        assert_eq!(
            graph.by_id(2).unwrap().get(0).unwrap().as_list().unwrap()[1],
            ResolvedValue::Unresolved(98)
        );
    }

    #[test]
    fn test_dependents_of_broken_entities_are_excluded() {
        let graph = resolve(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCAXIS2PLACEMENT3D(#1,#77,$);\n#3=IFCLOCALPLACEMENT($,#2);\n#4=IFCWALL('w',$,$,$,$,#3,$,$);",
        );
        assert_eq!(graph.status(graph.handle(2).unwrap()), EntityStatus::Unresolved);
        assert_eq!(
            graph.status(graph.handle(4).unwrap()),
            EntityStatus::BrokenDependency
        );
        assert_eq!(graph.status(graph.handle(1).unwrap()), EntityStatus::Ok);
        let counts = graph.status_counts();
        assert_eq!(counts.unresolved, 1);
        assert_eq!(counts.broken_dependency, 2);
    }

    #[test]
    fn test_dangling_owner_history_keeps_products() {
        let graph = resolve(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCAXIS2PLACEMENT3D(#1,$,$);\n#3=IFCLOCALPLACEMENT($,#2);\n\
             #30=IFCOWNERHISTORY(#999,$,$,.ADDED.,$,$,$,0);\n\
             #40=IFCWALL('a',#30,$,$,$,#3,$,$);\n#41=IFCWALL('b',#30,$,$,$,#3,$,$);\n\
             #42=IFCWALL('c',#888,$,$,$,#3,$,$);",
        );
        assert_eq!(graph.status(graph.handle(30).unwrap()), EntityStatus::Unresolved);
        for id in [40, 41, 42] {
            assert_eq!(graph.status(graph.handle(id).unwrap()), EntityStatus::Ok);
        }
        // The wall's own dangling owner is still reported
        assert_eq!(
            graph.diagnostics().count(DiagnosticKind::UnresolvedReference),
            2
        );
    }

    #[test]
    fn test_dangling_representation_excludes_product() {
        let graph = resolve(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCAXIS2PLACEMENT3D(#1,$,$);\n#3=IFCLOCALPLACEMENT($,#2);\n\
             #4=IFCWALL('a',$,$,$,$,#3,#77,$);",
        );
        assert_eq!(graph.status(graph.handle(4).unwrap()), EntityStatus::Unresolved);
    }

    #[test]
    fn test_placement_cycle_is_detected() {
        let graph = resolve(
            "#1=IFCAXIS2PLACEMENT3D(#9,$,$);\n#9=IFCCARTESIANPOINT((0.,0.,0.));\n#10=IFCLOCALPLACEMENT(#11,#1);\n#11=IFCLOCALPLACEMENT(#10,#1);\n#12=IFCWALL('w',$,$,$,$,#11,$,$);",
        );
        assert_eq!(graph.status(graph.handle(10).unwrap()), EntityStatus::Cyclic);
        assert_eq!(graph.status(graph.handle(11).unwrap()), EntityStatus::Cyclic);
        assert_eq!(
            graph.status(graph.handle(12).unwrap()),
            EntityStatus::BrokenDependency
        );
        assert_eq!(graph.status(graph.handle(1).unwrap()), EntityStatus::Ok);
        assert_eq!(graph.diagnostics().count(DiagnosticKind::CyclicReference), 1);
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let graph = resolve("#5=IFCLOCALPLACEMENT(#5,$);");
        assert_eq!(graph.status(graph.handle(5).unwrap()), EntityStatus::Cyclic);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        // Each placement points at the next one, so the walk is 50k deep
        let mut data = String::new();
        for id in 1..50_000u64 {
            data.push_str(&format!("#{}=IFCLOCALPLACEMENT(#{},$);\n", id, id + 1));
        }
        data.push_str("#50000=IFCLOCALPLACEMENT($,$);\n");
        let graph = resolve(&data);
        assert_eq!(graph.status_counts().ok, 50_000);
    }

    #[test]
    fn test_relationships_do_not_consume() {
        let graph = resolve(
            "#1=IFCBUILDINGSTOREY('s',$,$,$,$,$,$,$,.ELEMENT.,$);\n#2=IFCPOLYLINE(());\n#3=IFCRELCONTAINEDINSPATIALSTRUCTURE('r',$,$,$,(#2),#1);",
        );
        let candidates: Vec<u64> = graph.candidates().map(|h| graph.get(h).id).collect();
        assert_eq!(candidates, vec![2]);
    }
}
