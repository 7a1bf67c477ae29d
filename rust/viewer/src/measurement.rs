// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-to-point distance measurement

use nalgebra::{distance, Point3};
use serde::Serialize;

use crate::picking::PickHit;

/// One measured point, taken from a successful pick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasuredPoint {
    pub entity_id: u64,
    pub position: [f32; 3],
}

/// Ordered points; distances are between consecutive points
#[derive(Debug, Clone, Default)]
pub struct MeasurementSession {
    points: Vec<MeasuredPoint>,
}

impl MeasurementSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, hit: &PickHit) {
        let p = hit.world_point;
        self.points.push(MeasuredPoint {
            entity_id: hit.entity_id,
            position: [p.x, p.y, p.z],
        });
    }

    pub fn points(&self) -> &[MeasuredPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Euclidean distance of each consecutive pair, in metres
    pub fn distances(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.windows(2).map(|pair| {
            let a = Point3::from(pair[0].position).cast::<f64>();
            let b = Point3::from(pair[1].position).cast::<f64>();
            distance(&a, &b)
        })
    }

    /// Distances rounded to millimetres for display
    pub fn labels(&self) -> Vec<String> {
        self.distances().map(format_distance).collect()
    }

    pub fn total(&self) -> f64 {
        self.distances().sum()
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }
}

/// `5.0` as `"5.000"`
pub fn format_distance(metres: f64) -> String {
    format!("{:.3}", metres)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ObjectKey;

    fn hit(x: f32, y: f32, z: f32) -> PickHit {
        PickHit::new(ObjectKey::default(), 1, 0, Point3::new(x, y, z), 1.0)
    }

    #[test]
    fn test_three_four_five() {
        let mut session = MeasurementSession::new();
        session.add_point(&hit(0.0, 0.0, 0.0));
        session.add_point(&hit(3.0, 4.0, 0.0));
        assert_eq!(session.labels(), vec!["5.000".to_string()]);
        assert!((session.total() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_and_reset() {
        let mut session = MeasurementSession::new();
        assert_eq!(session.distances().count(), 0);
        session.add_point(&hit(0.0, 0.0, 0.0));
        assert_eq!(session.distances().count(), 0);
        session.add_point(&hit(1.0, 0.0, 0.0));
        session.add_point(&hit(1.0, 2.0, 0.0));
        assert_eq!(session.labels(), vec!["1.000".to_string(), "2.000".to_string()]);
        assert!((session.total() - 3.0).abs() < 1e-9);
        session.reset();
        assert!(session.is_empty());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(format_distance(1.23456), "1.235");
        assert_eq!(format_distance(0.0), "0.000");
    }
}
