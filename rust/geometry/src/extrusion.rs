// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extrusion of 2D profiles into closed solids

use nalgebra::{Matrix4, Point2, Point3, Vector3};

use crate::error::{Error, Result};
use crate::mesh::MeshBuilder;
use crate::profile::{Profile2D, Triangulation};

/// Extrude `profile` by `depth` along local `direction` (default +Z),
/// then apply `transform`
pub fn extrude_profile(
    profile: &Profile2D,
    depth: f64,
    direction: Option<Vector3<f64>>,
    transform: Option<&Matrix4<f64>>,
) -> Result<MeshBuilder> {
    if !(depth > 0.0 && depth.is_finite()) {
        return Err(Error::InvalidExtrusion(format!("depth {}", depth)));
    }

    let triangulation = profile.triangulate()?;
    let side_vertices: usize = (profile.outer.len() + profile.holes.iter().map(Vec::len).sum::<usize>()) * 4;
    let mut mesh = MeshBuilder::with_capacity(
        triangulation.points.len() * 2 + side_vertices,
        triangulation.indices.len() * 2 + side_vertices / 4 * 6,
    );

    add_cap(&triangulation, 0.0, &mut mesh);
    add_cap(&triangulation, depth, &mut mesh);
    add_side_walls(&profile.outer, depth, &mut mesh);
    for hole in &profile.holes {
        add_side_walls(hole, depth, &mut mesh);
    }

    // Depth is measured along the direction: (0, 0, depth) maps onto
    // `direction * depth`, shearing the prism when the direction tilts
    if let Some(dir) = direction {
        if dir.z.abs() < 1e-9 {
            return Err(Error::InvalidExtrusion(format!(
                "direction ({}, {}, {}) lies in the profile plane",
                dir.x, dir.y, dir.z
            )));
        }
        if (dir - Vector3::z()).norm() > 1e-9 {
            let mut shear = Matrix4::identity();
            shear.fixed_view_mut::<3, 1>(0, 2).copy_from(&dir);
            mesh.apply_transform(&shear);
            if dir.z < 0.0 {
                // Negative determinant turns every triangle inside out
                mesh.indices.chunks_exact_mut(3).for_each(|tri| tri.swap(1, 2));
            }
        }
    }

    if let Some(transform) = transform {
        mesh.apply_transform(transform);
    }
    Ok(mesh)
}

/// Cap at height `z`; the bottom cap (z = 0) faces -Z
fn add_cap(triangulation: &Triangulation, z: f64, mesh: &mut MeshBuilder) {
    let bottom = z == 0.0;
    let normal = if bottom { -Vector3::z() } else { Vector3::z() };
    let base = mesh.vertex_count() as u32;
    for point in &triangulation.points {
        mesh.add_vertex(Point3::new(point.x, point.y, z), normal);
    }
    for tri in triangulation.indices.chunks_exact(3) {
        let (a, b, c) = (base + tri[0] as u32, base + tri[1] as u32, base + tri[2] as u32);
        if bottom {
            mesh.add_triangle(a, c, b);
        } else {
            mesh.add_triangle(a, b, c);
        }
    }
}

/// One quad per edge with a flat outward normal
fn add_side_walls(ring: &[Point2<f64>], depth: f64, mesh: &mut MeshBuilder) {
    for (i, p0) in ring.iter().enumerate() {
        let p1 = &ring[(i + 1) % ring.len()];
        let edge = p1 - p0;
        // Skip zero-length edges from repeated points
        let Some(normal) = Vector3::new(edge.y, -edge.x, 0.0).try_normalize(1e-10) else {
            continue;
        };
        let a = mesh.add_vertex(Point3::new(p0.x, p0.y, 0.0), normal);
        let b = mesh.add_vertex(Point3::new(p1.x, p1.y, 0.0), normal);
        let c = mesh.add_vertex(Point3::new(p1.x, p1.y, depth), normal);
        let d = mesh.add_vertex(Point3::new(p0.x, p0.y, depth), normal);
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_extrusion() {
        let profile = Profile2D::rectangle(2.0, 1.0).unwrap();
        let mesh = extrude_profile(&profile, 3.0, None, None).unwrap();
        // Two caps of 4 vertices plus 4 side quads
        assert_eq!(mesh.vertex_count(), 8 + 16);
        assert_eq!(mesh.triangle_count(), 4 + 8);

        let zs: Vec<f32> = mesh.positions.chunks_exact(3).map(|p| p[2]).collect();
        assert_relative_eq!(zs.iter().cloned().fold(f32::MAX, f32::min), 0.0);
        assert_relative_eq!(zs.iter().cloned().fold(f32::MIN, f32::max), 3.0);
    }

    #[test]
    fn test_side_normals_point_outward() {
        let profile = Profile2D::rectangle(2.0, 2.0).unwrap();
        let mesh = extrude_profile(&profile, 1.0, None, None).unwrap();
        for (p, n) in mesh.positions.chunks_exact(3).zip(mesh.normals.chunks_exact(3)) {
            if n[2] == 0.0 {
                assert!(p[0] * n[0] + p[1] * n[1] > 0.0);
            }
        }
    }

    #[test]
    fn test_sheared_extrusion() {
        let profile = Profile2D::rectangle(1.0, 1.0).unwrap();
        let dir = Vector3::new(1.0, 0.0, 1.0).normalize();
        let mesh = extrude_profile(&profile, 2.0, Some(dir), None).unwrap();
        let max_x = mesh
            .positions
            .chunks_exact(3)
            .map(|p| p[0])
            .fold(f32::MIN, f32::max);
        assert_relative_eq!(max_x, 0.5 + 2.0 * std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_depth() {
        let profile = Profile2D::rectangle(1.0, 1.0).unwrap();
        assert!(extrude_profile(&profile, 0.0, None, None).is_err());
        assert!(extrude_profile(&profile, 1.0, Some(Vector3::x()), None).is_err());
    }
}
