// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement and coordinate readers
//!
//! Readers for the resource entities every geometry processor needs:
//! points, directions, point lists and the placement hierarchy.

use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph, ResolvedValue};

use crate::error::{Error, Result};

/// Placement chains deeper than this are treated as malformed
const MAX_PLACEMENT_DEPTH: usize = 100;

pub(crate) fn expect_kind(
    entity: &ResolvedEntity,
    kind: EntityKind,
    expected: &'static str,
) -> Result<()> {
    if entity.kind == kind {
        Ok(())
    } else {
        Err(Error::UnexpectedKind {
            entity: entity.id,
            expected,
            found: entity.kind.clone(),
        })
    }
}

/// Referenced entity at `index`, failing when absent
pub(crate) fn required<'g>(
    graph: &'g ResolvedGraph,
    entity: &ResolvedEntity,
    index: usize,
) -> Result<&'g ResolvedEntity> {
    graph.follow(entity, index).ok_or(Error::MissingAttribute {
        entity: entity.id,
        index,
    })
}

fn coordinates(values: &[ResolvedValue]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value.as_f64().unwrap_or(0.0);
    }
    out
}

/// IFCCARTESIANPOINT; 2D points get z = 0
pub fn cartesian_point(point: &ResolvedEntity) -> Result<Point3<f64>> {
    expect_kind(point, EntityKind::CartesianPoint, "IFCCARTESIANPOINT")?;
    let coords = point
        .get(0)
        .and_then(ResolvedValue::as_list)
        .ok_or(Error::MissingAttribute {
            entity: point.id,
            index: 0,
        })?;
    let [x, y, z] = coordinates(coords);
    Ok(Point3::new(x, y, z))
}

/// IFCDIRECTION, normalized
pub fn direction(dir: &ResolvedEntity) -> Result<Vector3<f64>> {
    expect_kind(dir, EntityKind::Direction, "IFCDIRECTION")?;
    let ratios = dir
        .get(0)
        .and_then(ResolvedValue::as_list)
        .ok_or(Error::MissingAttribute {
            entity: dir.id,
            index: 0,
        })?;
    let [x, y, z] = coordinates(ratios);
    Vector3::new(x, y, z)
        .try_normalize(1e-12)
        .ok_or_else(|| Error::geometry(format!("#{}: zero-length direction", dir.id)))
}

fn optional_direction(
    graph: &ResolvedGraph,
    entity: &ResolvedEntity,
    index: usize,
    default: Vector3<f64>,
) -> Result<Vector3<f64>> {
    match graph.follow(entity, index) {
        Some(dir) => direction(dir),
        None => Ok(default),
    }
}

/// Points of an IFCCARTESIANPOINTLIST2D/3D, 2D lists padded with z = 0
pub fn point_list(list: &ResolvedEntity) -> Result<Vec<Point3<f64>>> {
    if !matches!(
        list.kind,
        EntityKind::CartesianPointList2D | EntityKind::CartesianPointList3D
    ) {
        return Err(Error::UnexpectedKind {
            entity: list.id,
            expected: "IFCCARTESIANPOINTLIST",
            found: list.kind.clone(),
        });
    }
    let rows = list
        .get(0)
        .and_then(ResolvedValue::as_list)
        .ok_or(Error::MissingAttribute {
            entity: list.id,
            index: 0,
        })?;
    Ok(rows
        .iter()
        .filter_map(ResolvedValue::as_list)
        .map(|row| {
            let [x, y, z] = coordinates(row);
            Point3::new(x, y, z)
        })
        .collect())
}

/// Resolve a list of IFCCARTESIANPOINT references
pub fn point_refs(graph: &ResolvedGraph, refs: &[ResolvedValue]) -> Result<Vec<Point3<f64>>> {
    refs.iter()
        .filter_map(ResolvedValue::as_handle)
        .map(|h| cartesian_point(graph.get(h)))
        .collect()
}

/// Right-handed frame from a Z axis and an approximate X axis
fn frame(z: Vector3<f64>, x_hint: Vector3<f64>, origin: Point3<f64>) -> Matrix4<f64> {
    // Gram-Schmidt: drop the component of X along Z
    let x = x_hint - z * x_hint.dot(&z);
    let x = x.try_normalize(1e-6).unwrap_or_else(|| {
        let fallback = if z.z.abs() < 0.9 { Vector3::z() } else { Vector3::x() };
        fallback.cross(&z).normalize()
    });
    let y = z.cross(&x).normalize();

    let rotation = Matrix3::from_columns(&[x, y, z]);
    let mut m = rotation.to_homogeneous();
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&origin.coords);
    m
}

/// IFCAXIS2PLACEMENT3D: Location, Axis (default +Z), RefDirection (default +X)
pub fn axis2_placement_3d(graph: &ResolvedGraph, placement: &ResolvedEntity) -> Result<Matrix4<f64>> {
    expect_kind(placement, EntityKind::Axis2Placement3D, "IFCAXIS2PLACEMENT3D")?;
    let origin = match graph.follow(placement, 0) {
        Some(point) => cartesian_point(point)?,
        None => Point3::origin(),
    };
    let z = optional_direction(graph, placement, 1, Vector3::z())?;
    let x = optional_direction(graph, placement, 2, Vector3::x())?;
    Ok(frame(z, x, origin))
}

/// IFCAXIS2PLACEMENT2D as an in-plane rotation plus offset
pub fn axis2_placement_2d(
    graph: &ResolvedGraph,
    placement: &ResolvedEntity,
) -> Result<(Point2<f64>, Vector3<f64>)> {
    expect_kind(placement, EntityKind::Axis2Placement2D, "IFCAXIS2PLACEMENT2D")?;
    let origin = match graph.follow(placement, 0) {
        Some(point) => cartesian_point(point)?,
        None => Point3::origin(),
    };
    let x = optional_direction(graph, placement, 1, Vector3::x())?;
    Ok((Point2::new(origin.x, origin.y), x))
}

/// World matrix of an IFCLOCALPLACEMENT: parent chain composed as
/// `parent * local`
pub fn local_placement(graph: &ResolvedGraph, placement: &ResolvedEntity) -> Result<Matrix4<f64>> {
    let mut chain = Vec::new();
    let mut current = Some(placement);
    while let Some(entity) = current {
        if chain.len() >= MAX_PLACEMENT_DEPTH {
            return Err(Error::geometry(format!(
                "#{}: placement chain deeper than {}",
                placement.id, MAX_PLACEMENT_DEPTH
            )));
        }
        expect_kind(entity, EntityKind::LocalPlacement, "IFCLOCALPLACEMENT")?;
        // RelativePlacement (attribute 1)
        let relative = match graph.follow(entity, 1) {
            Some(axis) if axis.kind == EntityKind::Axis2Placement3D => {
                axis2_placement_3d(graph, axis)?
            }
            Some(axis) if axis.kind == EntityKind::Axis2Placement2D => {
                let (origin, x) = axis2_placement_2d(graph, axis)?;
                frame(Vector3::z(), x, Point3::new(origin.x, origin.y, 0.0))
            }
            _ => Matrix4::identity(),
        };
        chain.push(relative);
        // PlacementRelTo (attribute 0)
        current = graph.follow(entity, 0);
    }
    Ok(chain
        .into_iter()
        .rev()
        .fold(Matrix4::identity(), |world, local| world * local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stepview_core::EntityGraph;

    fn graph(data: &str) -> ResolvedGraph {
        let content = format!("ISO-10303-21;\nDATA;\n{}\nENDSEC;\n", data);
        ResolvedGraph::resolve(EntityGraph::parse(&content).unwrap())
    }

    #[test]
    fn test_axis2_placement_rotated() {
        let g = graph(
            "#1=IFCCARTESIANPOINT((1.,2.,3.));\n\
             #2=IFCDIRECTION((0.,0.,1.));\n\
             #3=IFCDIRECTION((0.,1.,0.));\n\
             #4=IFCAXIS2PLACEMENT3D(#1,#2,#3);",
        );
        let m = axis2_placement_3d(&g, g.by_id(4).unwrap()).unwrap();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 3.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_local_placement_chain() {
        let g = graph(
            "#1=IFCCARTESIANPOINT((10.,0.,0.));\n\
             #2=IFCAXIS2PLACEMENT3D(#1,$,$);\n\
             #3=IFCLOCALPLACEMENT($,#2);\n\
             #4=IFCCARTESIANPOINT((0.,5.,0.));\n\
             #5=IFCAXIS2PLACEMENT3D(#4,$,$);\n\
             #6=IFCLOCALPLACEMENT(#3,#5);",
        );
        let m = local_placement(&g, g.by_id(6).unwrap()).unwrap();
        let p = m.transform_point(&Point3::origin());
        assert_relative_eq!(p, Point3::new(10.0, 5.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_point_list_pads_2d() {
        let g = graph("#1=IFCCARTESIANPOINTLIST2D(((0.,0.),(1.,2.)));");
        let points = point_list(g.by_id(1).unwrap()).unwrap();
        assert_eq!(points[1], Point3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let g = graph("#1=IFCDIRECTION((1.,0.,0.));");
        let err = cartesian_point(g.by_id(1).unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedKind { entity: 1, .. }));
    }
}
