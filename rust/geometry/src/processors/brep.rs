// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary representations built from planar IfcPolyLoop faces
//!
//! Faces are collected sequentially (graph walk) and triangulated in
//! parallel, then merged in face order.

use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph, ResolvedValue};

use crate::error::{Error, Result};
use crate::mesh::MeshBuilder;
use crate::placement::{point_refs, required};
use crate::router::GeometryProcessor;
use crate::triangulation::{polygon_normal, signed_area, triangulate_polygon_with_holes, PlaneBasis};

/// Faces below this count are triangulated on the calling thread
const PARALLEL_FACE_THRESHOLD: usize = 64;

/// Loops of one face, outer boundary first
#[derive(Debug, Default)]
struct FaceLoops {
    outer: Vec<Point3<f64>>,
    inner: Vec<Vec<Point3<f64>>>,
}

/// Handles IfcFacetedBrep, IfcShellBasedSurfaceModel and loose
/// IfcFace / IfcFaceOuterBound / IfcFaceBound items
pub struct FacetedBrepProcessor;

impl FacetedBrepProcessor {
    fn collect_faces(graph: &ResolvedGraph, item: &ResolvedEntity) -> Result<Vec<FaceLoops>> {
        let mut faces = Vec::new();
        match item.kind {
            // Outer (IfcClosedShell)
            EntityKind::FacetedBrep => {
                shell_faces(graph, required(graph, item, 0)?, &mut faces)?;
            }
            // SbsmBoundary (set of shells)
            EntityKind::ShellBasedSurfaceModel => {
                for shell in handles(item, 0) {
                    shell_faces(graph, graph.get(shell), &mut faces)?;
                }
            }
            EntityKind::Face => faces.push(face_loops(graph, item)?),
            EntityKind::FaceOuterBound | EntityKind::FaceBound => faces.push(FaceLoops {
                outer: bound_points(graph, item)?,
                inner: Vec::new(),
            }),
            _ => return Err(Error::Unsupported(item.kind.clone())),
        }
        Ok(faces)
    }
}

impl GeometryProcessor for FacetedBrepProcessor {
    fn process(&self, item: &ResolvedEntity, graph: &ResolvedGraph) -> Result<MeshBuilder> {
        let faces = Self::collect_faces(graph, item)?;

        let meshes: Vec<Option<MeshBuilder>> = if faces.len() >= PARALLEL_FACE_THRESHOLD {
            faces.par_iter().map(triangulate_face).collect()
        } else {
            faces.iter().map(triangulate_face).collect()
        };

        let mut mesh = MeshBuilder::new();
        let mut skipped = 0usize;
        for face in meshes {
            match face {
                Some(face) => mesh.merge(&face),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(entity = item.id, skipped, faces = faces.len(), "degenerate faces skipped");
        }
        if mesh.is_empty() {
            return Err(Error::EmptyMesh(format!("#{}: no valid faces", item.id)));
        }
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<EntityKind> {
        vec![
            EntityKind::FacetedBrep,
            EntityKind::ShellBasedSurfaceModel,
            EntityKind::Face,
            EntityKind::FaceOuterBound,
            EntityKind::FaceBound,
        ]
    }
}

fn handles(entity: &ResolvedEntity, index: usize) -> impl Iterator<Item = stepview_core::EntityHandle> + '_ {
    entity
        .get(index)
        .and_then(ResolvedValue::as_list)
        .unwrap_or(&[])
        .iter()
        .filter_map(ResolvedValue::as_handle)
}

/// IfcClosedShell / IfcOpenShell: CfsFaces
fn shell_faces(graph: &ResolvedGraph, shell: &ResolvedEntity, faces: &mut Vec<FaceLoops>) -> Result<()> {
    if !matches!(shell.kind, EntityKind::ClosedShell | EntityKind::OpenShell) {
        return Err(Error::UnexpectedKind {
            entity: shell.id,
            expected: "IFCCLOSEDSHELL",
            found: shell.kind.clone(),
        });
    }
    for face in handles(shell, 0) {
        faces.push(face_loops(graph, graph.get(face))?);
    }
    Ok(())
}

/// IfcFace: Bounds, the IfcFaceOuterBound (or first bound) is the outer loop
fn face_loops(graph: &ResolvedGraph, face: &ResolvedEntity) -> Result<FaceLoops> {
    let bounds: Vec<&ResolvedEntity> = handles(face, 0).map(|h| graph.get(h)).collect();
    let outer_at = bounds
        .iter()
        .position(|b| b.kind == EntityKind::FaceOuterBound)
        .unwrap_or(0);

    let mut loops = FaceLoops::default();
    for (i, bound) in bounds.iter().enumerate() {
        let points = bound_points(graph, bound)?;
        if i == outer_at {
            loops.outer = points;
        } else {
            loops.inner.push(points);
        }
    }
    Ok(loops)
}

/// IfcFaceBound: Bound (IfcPolyLoop), Orientation
fn bound_points(graph: &ResolvedGraph, bound: &ResolvedEntity) -> Result<Vec<Point3<f64>>> {
    let poly_loop = required(graph, bound, 0)?;
    if poly_loop.kind != EntityKind::PolyLoop {
        return Err(Error::Unsupported(poly_loop.kind.clone()));
    }
    let refs = poly_loop
        .get(0)
        .and_then(ResolvedValue::as_list)
        .ok_or(Error::MissingAttribute {
            entity: poly_loop.id,
            index: 0,
        })?;
    let mut points = point_refs(graph, refs)?;
    if bound.get(1).and_then(ResolvedValue::as_bool) == Some(false) {
        points.reverse();
    }
    Ok(points)
}

/// Triangles of one planar face, `None` when degenerate
fn triangulate_face(face: &FaceLoops) -> Option<MeshBuilder> {
    if face.outer.len() < 3 {
        return None;
    }
    let normal = polygon_normal(&face.outer);
    let basis = PlaneBasis::new(face.outer[0], &normal);
    let outer = basis.project(&face.outer);
    let holes: Vec<Vec<Point2<f64>>> = face.inner.iter().map(|h| basis.project(h)).collect();
    let indices = triangulate_polygon_with_holes(&outer, &holes).ok()?;

    let points: Vec<&Point3<f64>> = face
        .outer
        .iter()
        .chain(face.inner.iter().filter(|h| h.len() >= 3).flatten())
        .collect();
    let flat: Vec<&Point2<f64>> = outer
        .iter()
        .chain(holes.iter().filter(|h| h.len() >= 3).flatten())
        .collect();

    let mut mesh = MeshBuilder::with_capacity(points.len(), indices.len());
    for point in &points {
        mesh.add_vertex(**point, normal);
    }
    for tri in indices.chunks_exact(3) {
        // Wind every triangle counter-clockwise around the face normal
        let area = signed_area(&[*flat[tri[0]], *flat[tri[1]], *flat[tri[2]]]);
        if area.abs() < 1e-14 {
            continue;
        }
        let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        if area > 0.0 {
            mesh.add_triangle(a, b, c);
        } else {
            mesh.add_triangle(a, c, b);
        }
    }
    (!mesh.indices.is_empty()).then_some(mesh)
}
