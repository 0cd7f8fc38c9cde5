//! Bounding volumes and view-frustum tests for tile culling.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Bounding sphere of a tile's plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// View frustum as six inward-facing planes `(normal, distance)`.
///
/// Planes are extracted from a view-projection matrix whose clip-space depth
/// range is `[0, 1]`, which is what glam's `*_rh` projections produce.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the frustum planes from a view-projection matrix.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near
            r3 - r2, // far
        ]
        .map(normalize_plane);

        Self { planes }
    }

    /// Whether any part of `sphere` lies inside the frustum.
    ///
    /// Conservative near the frustum corners: a sphere just outside a corner
    /// may be reported as intersecting.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(sphere.center) + plane.w >= -sphere.radius)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.xyz().length();
    if length > 0.0 {
        plane / length
    } else {
        plane
    }
}
