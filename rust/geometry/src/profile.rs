// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D profile definitions
//!
//! Profiles are normalized on construction: the outer loop runs
//! counter-clockwise and every hole clockwise, with duplicate closing
//! points removed.

use std::f64::consts::PI;

use nalgebra::{Point2, Vector3};
use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph, ResolvedValue};

use crate::error::{Error, Result};
use crate::placement::{axis2_placement_2d, cartesian_point, point_list, point_refs, required};
use crate::triangulation::{signed_area, triangulate_polygon_with_holes};

/// Segments used to approximate a circle
pub const CIRCLE_SEGMENTS: usize = 24;

/// 2D profile with optional holes
#[derive(Debug, Clone)]
pub struct Profile2D {
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

/// Triangulated profile: indices into `outer` followed by every hole
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub points: Vec<Point2<f64>>,
    pub indices: Vec<usize>,
}

fn close_and_orient(mut ring: Vec<Point2<f64>>, ccw: bool) -> Vec<Point2<f64>> {
    if ring.len() > 1 && (ring[0] - ring[ring.len() - 1]).norm() < 1e-9 {
        ring.pop();
    }
    if (signed_area(&ring) > 0.0) != ccw {
        ring.reverse();
    }
    ring
}

impl Profile2D {
    pub fn new(outer: Vec<Point2<f64>>) -> Result<Self> {
        let outer = close_and_orient(outer, true);
        if outer.len() < 3 {
            return Err(Error::InvalidProfile(format!(
                "outer loop with {} points",
                outer.len()
            )));
        }
        Ok(Self {
            outer,
            holes: Vec::new(),
        })
    }

    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        let hole = close_and_orient(hole, false);
        if hole.len() >= 3 {
            self.holes.push(hole);
        }
    }

    pub fn rectangle(x_dim: f64, y_dim: f64) -> Result<Self> {
        if x_dim <= 0.0 || y_dim <= 0.0 {
            return Err(Error::InvalidProfile(format!(
                "rectangle {} x {}",
                x_dim, y_dim
            )));
        }
        let (hx, hy) = (x_dim / 2.0, y_dim / 2.0);
        Self::new(vec![
            Point2::new(-hx, -hy),
            Point2::new(hx, -hy),
            Point2::new(hx, hy),
            Point2::new(-hx, hy),
        ])
    }

    pub fn circle(radius: f64) -> Result<Self> {
        if radius <= 0.0 {
            return Err(Error::InvalidProfile(format!("circle radius {}", radius)));
        }
        Self::new(
            (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let angle = i as f64 * 2.0 * PI / CIRCLE_SEGMENTS as f64;
                    Point2::new(radius * angle.cos(), radius * angle.sin())
                })
                .collect(),
        )
    }

    /// Rotate by the in-plane X axis `x_dir` then translate by `origin`
    pub fn transform(&mut self, origin: Point2<f64>, x_dir: &Vector3<f64>) {
        let (cos, sin) = (x_dir.x, x_dir.y);
        let apply = |p: &mut Point2<f64>| {
            *p = Point2::new(p.x * cos - p.y * sin + origin.x, p.x * sin + p.y * cos + origin.y);
        };
        self.outer.iter_mut().for_each(apply);
        self.holes.iter_mut().flatten().for_each(apply);
    }

    pub fn triangulate(&self) -> Result<Triangulation> {
        let indices = triangulate_polygon_with_holes(&self.outer, &self.holes)?;
        let points = self
            .outer
            .iter()
            .chain(self.holes.iter().flatten())
            .copied()
            .collect();
        Ok(Triangulation { points, indices })
    }
}

/// Read any supported IFCPROFILEDEF into a [`Profile2D`]
pub fn read_profile(graph: &ResolvedGraph, profile: &ResolvedEntity) -> Result<Profile2D> {
    let mut out = match profile.kind {
        // ProfileType, ProfileName, Position, XDim, YDim
        EntityKind::RectangleProfileDef => {
            let x = dimension(profile, 3)?;
            let y = dimension(profile, 4)?;
            Profile2D::rectangle(x, y)?
        }
        // ProfileType, ProfileName, Position, Radius
        EntityKind::CircleProfileDef => Profile2D::circle(dimension(profile, 3)?)?,
        // ProfileType, ProfileName, OuterCurve
        EntityKind::ArbitraryClosedProfileDef => {
            return Profile2D::new(curve_points_2d(graph, required(graph, profile, 2)?)?);
        }
        // ProfileType, ProfileName, OuterCurve, InnerCurves
        EntityKind::ArbitraryProfileDefWithVoids => {
            let mut out = Profile2D::new(curve_points_2d(graph, required(graph, profile, 2)?)?)?;
            let inner = profile.get(3).and_then(ResolvedValue::as_list).unwrap_or(&[]);
            for curve in inner.iter().filter_map(ResolvedValue::as_handle) {
                out.add_hole(curve_points_2d(graph, graph.get(curve))?);
            }
            return Ok(out);
        }
        _ => return Err(Error::Unsupported(profile.kind.clone())),
    };

    // Parametric profiles carry an optional IFCAXIS2PLACEMENT2D at attribute 2
    if let Some(position) = graph.follow(profile, 2) {
        let (origin, x_dir) = axis2_placement_2d(graph, position)?;
        out.transform(origin, &x_dir);
    }
    Ok(out)
}

fn dimension(profile: &ResolvedEntity, index: usize) -> Result<f64> {
    profile.get_f64(index).ok_or(Error::MissingAttribute {
        entity: profile.id,
        index,
    })
}

/// Planar points of a bounded curve
pub fn curve_points_2d(graph: &ResolvedGraph, curve: &ResolvedEntity) -> Result<Vec<Point2<f64>>> {
    Ok(curve_points(graph, curve)?
        .into_iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect())
}

/// Points of an IFCPOLYLINE or IFCINDEXEDPOLYCURVE (line segments only)
pub fn curve_points(
    graph: &ResolvedGraph,
    curve: &ResolvedEntity,
) -> Result<Vec<nalgebra::Point3<f64>>> {
    match curve.kind {
        EntityKind::Polyline => {
            let refs = curve
                .get(0)
                .and_then(ResolvedValue::as_list)
                .ok_or(Error::MissingAttribute {
                    entity: curve.id,
                    index: 0,
                })?;
            point_refs(graph, refs)
        }
        EntityKind::IndexedPolyCurve => {
            let points = point_list(required(graph, curve, 0)?)?;
            // Segments (attribute 1): IFCLINEINDEX/IFCARCINDEX with 1-based indices
            let Some(segments) = curve.get(1).and_then(ResolvedValue::as_list) else {
                return Ok(points);
            };
            let mut out = Vec::with_capacity(points.len());
            for segment in segments {
                let ResolvedValue::Typed(_, args) = segment else {
                    continue;
                };
                let indices = args
                    .first()
                    .and_then(ResolvedValue::as_list)
                    .map(|l| l.iter().filter_map(ResolvedValue::as_i64).collect::<Vec<_>>())
                    .unwrap_or_default();
                for index in indices {
                    let point = usize::try_from(index - 1)
                        .ok()
                        .and_then(|i| points.get(i))
                        .ok_or_else(|| {
                            Error::geometry(format!("#{}: segment index {} out of range", curve.id, index))
                        })?;
                    if out.last() != Some(point) {
                        out.push(*point);
                    }
                }
            }
            Ok(out)
        }
        EntityKind::CartesianPoint => Ok(vec![cartesian_point(curve)?]),
        _ => Err(Error::Unsupported(curve.kind.clone())),
    }
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
    fn test_rectangle_profile_with_position() {
        let g = graph(
            "#1=IFCCARTESIANPOINT((2.,0.));\n\
             #2=IFCAXIS2PLACEMENT2D(#1,$);\n\
             #3=IFCRECTANGLEPROFILEDEF(.AREA.,$,#2,4.,0.2);",
        );
        let profile = read_profile(&g, g.by_id(3).unwrap()).unwrap();
        assert_eq!(profile.outer.len(), 4);
        assert_relative_eq!(profile.outer[0].x, 0.0);
        assert!(signed_area(&profile.outer) > 0.0);
    }

    #[test]
    fn test_circle_profile() {
        let profile = Profile2D::circle(0.5).unwrap();
        assert_eq!(profile.outer.len(), CIRCLE_SEGMENTS);
        assert_eq!(profile.triangulate().unwrap().indices.len(), (CIRCLE_SEGMENTS - 2) * 3);
    }

    #[test]
    fn test_arbitrary_profile_clockwise_closed_polyline() {
        let g = graph(
            "#1=IFCCARTESIANPOINT((0.,0.));\n\
             #2=IFCCARTESIANPOINT((0.,1.));\n\
             #3=IFCCARTESIANPOINT((1.,1.));\n\
             #4=IFCCARTESIANPOINT((1.,0.));\n\
             #5=IFCPOLYLINE((#1,#2,#3,#4,#1));\n\
             #6=IFCARBITRARYCLOSEDPROFILEDEF(.AREA.,$,#5);",
        );
        let profile = read_profile(&g, g.by_id(6).unwrap()).unwrap();
        assert_eq!(profile.outer.len(), 4);
        assert!(signed_area(&profile.outer) > 0.0);
    }

    #[test]
    fn test_indexed_poly_curve_segments() {
        let g = graph(
            "#1=IFCCARTESIANPOINTLIST2D(((0.,0.),(3.,0.),(3.,3.)));\n\
             #2=IFCINDEXEDPOLYCURVE(#1,(IFCLINEINDEX((1,2)),IFCLINEINDEX((2,3))),.F.);",
        );
        let points = curve_points(&g, g.by_id(2).unwrap()).unwrap();
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn test_degenerate_rectangle_rejected() {
        assert!(Profile2D::rectangle(0.0, 1.0).is_err());
    }
}
