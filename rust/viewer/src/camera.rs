// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orbit camera (Z up) with perspective projection

use nalgebra::{Matrix4, Point2, Point3, Vector3};
use stepview_geometry::Aabb;

const MIN_DISTANCE: f32 = 0.01;
const MAX_PITCH: f32 = 1.55;

/// One input event applied at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraInput {
    /// Rotate around the target (radians)
    Orbit { yaw: f32, pitch: f32 },
    /// Multiply the eye distance; values below 1 move closer
    Zoom(f32),
    /// Move the target in the view plane, in screen pixels
    Pan { dx: f32, dy: f32 },
    /// Frame the given bounds
    Fit(Aabb),
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub distance: f32,
    /// Rotation around +Z, 0 looks along +Y
    pub yaw: f32,
    /// Elevation above the XY plane
    pub pitch: f32,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    viewport: (u32, u32),
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Point3::origin(),
            distance: 20.0,
            yaw: -std::f32::consts::FRAC_PI_4,
            pitch: 0.5,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 10_000.0,
            viewport: (1280, 720),
        }
    }
}

impl Camera {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            viewport: (viewport.0.max(1), viewport.1.max(1)),
            ..Self::default()
        }
    }

    /// Camera at `eye` looking at `target`
    pub fn looking_at(eye: Point3<f32>, target: Point3<f32>, viewport: (u32, u32)) -> Self {
        let offset = eye - target;
        let distance = offset.norm().max(MIN_DISTANCE);
        let pitch = (offset.z / distance).clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
        let yaw = (-offset.x).atan2(-offset.y);
        let mut camera = Self::new(viewport);
        camera.target = target;
        camera.distance = distance;
        camera.yaw = yaw;
        camera.pitch = pitch;
        camera.far = camera.far.max(distance * 4.0);
        camera
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    /// Unit vector from the eye towards the target
    pub fn forward(&self) -> Vector3<f32> {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vector3::new(sy * cp, cy * cp, -sp)
    }

    pub fn eye(&self) -> Point3<f32> {
        self.target - self.forward() * self.distance
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye(), &self.target, &Vector3::z())
    }

    pub fn projection(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect(), self.fov_y, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    pub fn apply(&mut self, input: CameraInput) {
        match input {
            CameraInput::Orbit { yaw, pitch } => self.orbit(yaw, pitch),
            CameraInput::Zoom(factor) => self.zoom(factor),
            CameraInput::Pan { dx, dy } => self.pan(dx, dy),
            CameraInput::Fit(bounds) => self.fit_to(&bounds),
            CameraInput::Resize { width, height } => {
                self.viewport = (width.max(1), height.max(1));
            }
        }
    }

    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        if !(yaw.is_finite() && pitch.is_finite()) {
            return;
        }
        self.yaw = (self.yaw + yaw) % std::f32::consts::TAU;
        self.pitch = (self.pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).max(MIN_DISTANCE);
        }
    }

    /// Pan so the point under the cursor follows it at target depth
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        let forward = self.forward();
        let right = forward.cross(&Vector3::z()).try_normalize(1e-6).unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);
        let world_per_pixel = 2.0 * self.distance * (self.fov_y * 0.5).tan() / self.viewport.1 as f32;
        self.target += (-right * dx + up * dy) * world_per_pixel;
    }

    /// Keep the viewing direction, move so `bounds` fills the view
    pub fn fit_to(&mut self, bounds: &Aabb) {
        if bounds.is_empty() {
            return;
        }
        let radius = (bounds.diagonal() * 0.5).max(MIN_DISTANCE);
        let half_fov = (self.fov_y.min(self.fov_y * self.aspect()) * 0.5).max(1e-3);
        self.target = bounds.center();
        self.distance = radius / half_fov.sin();
        self.near = (self.distance - radius).max(self.distance * 1e-3).max(0.01) * 0.5;
        self.far = (self.distance + radius) * 2.0;
    }

    /// Pixel coordinates (origin top-left) into normalized device coordinates
    pub fn screen_to_ndc(&self, screen: Point2<f32>) -> Point2<f32> {
        Point2::new(
            2.0 * screen.x / self.viewport.0 as f32 - 1.0,
            1.0 - 2.0 * screen.y / self.viewport.1 as f32,
        )
    }
}
