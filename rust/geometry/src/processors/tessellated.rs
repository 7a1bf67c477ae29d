// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tessellated geometry: explicit triangle meshes

use nalgebra::Vector3;
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph, ResolvedValue};

use crate::error::{Error, Result};
use crate::mesh::MeshBuilder;
use crate::placement::{point_list, required};
use crate::router::GeometryProcessor;

/// Handles IfcTriangulatedFaceSet
pub struct TriangulatedFaceSetProcessor;

impl GeometryProcessor for TriangulatedFaceSetProcessor {
    fn process(&self, item: &ResolvedEntity, graph: &ResolvedGraph) -> Result<MeshBuilder> {
        // IfcTriangulatedFaceSet attributes:
        // 0: Coordinates (IfcCartesianPointList3D)
        // 1: Normals (optional)
        // 2: Closed (optional)
        // 3: CoordIndex (list of 1-based index triples)
        let points = point_list(required(graph, item, 0)?)?;
        let triangles = item
            .get(3)
            .and_then(ResolvedValue::as_list)
            .ok_or(Error::MissingAttribute {
                entity: item.id,
                index: 3,
            })?;

        let mut mesh = MeshBuilder::with_capacity(points.len(), triangles.len() * 3);
        for point in &points {
            mesh.add_vertex(*point, Vector3::zeros());
        }

        let count = points.len() as i64;
        for triangle in triangles {
            let corners: Vec<i64> = triangle
                .as_list()
                .map(|t| t.iter().filter_map(ResolvedValue::as_i64).collect())
                .unwrap_or_default();
            let [a, b, c] = corners[..] else {
                return Err(Error::InvalidMesh(format!(
                    "#{}: triangle with {} indices",
                    item.id,
                    corners.len()
                )));
            };
            if let Some(bad) = [a, b, c].into_iter().find(|&i| i < 1 || i > count) {
                return Err(Error::InvalidMesh(format!(
                    "#{}: index {} outside 1..={}",
                    item.id, bad, count
                )));
            }
            mesh.add_triangle((a - 1) as u32, (b - 1) as u32, (c - 1) as u32);
        }

        mesh.recompute_normals();
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<EntityKind> {
        vec![EntityKind::TriangulatedFaceSet]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_graph;

    #[test]
    fn test_one_based_indices() {
        let g = test_graph(
            "#1=IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(1.,0.,0.),(1.,1.,0.),(0.,1.,0.)));\n\
             #2=IFCTRIANGULATEDFACESET(#1,$,.T.,((1,2,3),(1,3,4)),$);",
        );
        let mesh = TriangulatedFaceSetProcessor
            .process(g.by_id(2).unwrap(), &g)
            .unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(&mesh.normals[0..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_index_out_of_range() {
        let g = test_graph(
            "#1=IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(1.,0.,0.),(1.,1.,0.)));\n\
             #2=IFCTRIANGULATEDFACESET(#1,$,.T.,((1,2,4)),$);",
        );
        let err = TriangulatedFaceSetProcessor
            .process(g.by_id(2).unwrap(), &g)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }
}
