//! View frustum for culling and screen-space error estimation

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Perspective view frustum
///
/// Keeps the six world-space planes (Near, Far, Left, Right, Top, Bottom)
/// together with the camera parameters the LOD evaluator needs: eye
/// position, view direction and the near-plane extents.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
    eye: Vec3,
    forward: Vec3,
    near: f32,
    far: f32,
    top: f32,
    bottom: f32,
}

impl Frustum {
    pub const NEAR: usize = 0;
    pub const FAR: usize = 1;

    /// Build a perspective frustum looking from `eye` towards `target`
    ///
    /// # Arguments
    /// * `fov_y` - Vertical field of view in radians
    /// * `aspect` - Width / height of the viewport
    /// * `near`, `far` - Clip distances along the view direction
    pub fn perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let proj = Mat4::perspective_rh_gl(fov_y, aspect, near, far);
        let top = near * (fov_y * 0.5).tan();

        Self {
            planes: Self::extract_planes(&(proj * view)),
            eye,
            forward: (target - eye).normalize(),
            near,
            far,
            top,
            bottom: -top,
        }
    }

    /// Extract frustum planes from an OpenGL-style view-projection matrix
    fn extract_planes(vp: &Mat4) -> [Plane; 6] {
        let m = vp.to_cols_array_2d();
        let row = |i: usize| Vec4::new(m[0][i], m[1][i], m[2][i], m[3][i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        [
            Self::normalize_plane(r3 + r2), // near
            Self::normalize_plane(r3 - r2), // far
            Self::normalize_plane(r3 + r0), // left
            Self::normalize_plane(r3 - r0), // right
            Self::normalize_plane(r3 - r1), // top
            Self::normalize_plane(r3 + r1), // bottom
        ]
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = Vec3::new(plane.x, plane.y, plane.z);
        let len = normal.length();
        Plane {
            normal: normal / len,
            distance: plane.w / len,
        }
    }

    pub fn near_plane(&self) -> &Plane {
        &self.planes[Self::NEAR]
    }

    /// Near clip distance
    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Upper extent of the near-plane window (view space)
    pub fn top(&self) -> f32 {
        self.top
    }

    /// Lower extent of the near-plane window (view space)
    pub fn bottom(&self) -> f32 {
        self.bottom
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Point where the view axis pierces the near plane
    pub fn near_center(&self) -> Vec3 {
        self.eye + self.forward * self.near
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        // If the p-vertex is outside any plane the box is completely outside
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(aabb.farthest_corner(plane)) >= 0.0)
    }
}
