//! Camera abstraction consumed by LOD selection and visibility culling.
//!
//! The renderer owns the real camera; the pyramid only needs its projection
//! and view (inverse world) transforms. Two concrete cameras are provided for
//! renderers that do not have their own and for tests.

use glam::{Mat4, Vec3};

use crate::bounds::Frustum;

/// A camera as seen by the pyramid.
pub trait Camera {
    /// Projection matrix (clip-space depth in `[0, 1]`).
    fn projection_matrix(&self) -> Mat4;

    /// View matrix, i.e. the inverse of the camera's world transform.
    fn view_matrix(&self) -> Mat4;

    /// Combined view-projection matrix.
    fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a world-space point to normalized device coordinates.
    fn project(&self, point: Vec3) -> Vec3 {
        self.view_projection().project_point3(point)
    }

    /// View frustum for the current transforms.
    fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}

/// Camera with a perspective projection, looking from `eye` at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    /// Create a camera looking at `target` with +Y up.
    pub fn new(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            fov_y,
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera for PerspectiveCamera {
    fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// Camera with an orthographic projection of the given half extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicCamera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub half_width: f32,
    pub half_height: f32,
    pub near: f32,
    pub far: f32,
}

impl OrthographicCamera {
    /// Create a camera looking at `target` with +Y up.
    pub fn new(eye: Vec3, target: Vec3, half_width: f32, half_height: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            half_width,
            half_height,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera for OrthographicCamera {
    fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            -self.half_width,
            self.half_width,
            -self.half_height,
            self.half_height,
            self.near,
            self.far,
        )
    }

    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}
