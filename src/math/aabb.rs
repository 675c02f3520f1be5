//! World-space node bounds

use crate::core::types::Vec3;
use super::frustum::Plane;

/// Axis-aligned box, `min <= max` on every axis
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Corner closest to the plane's negative side (n-vertex)
    pub fn nearest_corner(&self, plane: &Plane) -> Vec3 {
        Vec3::select(plane.normal.cmpge(Vec3::ZERO), self.min, self.max)
    }

    /// Corner furthest along the plane normal (p-vertex)
    pub fn farthest_corner(&self, plane: &Plane) -> Vec3 {
        Vec3::select(plane.normal.cmpge(Vec3::ZERO), self.max, self.min)
    }

    /// True if the plane cuts through the box
    pub fn straddles(&self, plane: &Plane) -> bool {
        plane.distance_to_point(self.nearest_corner(plane)) < 0.0
            && plane.distance_to_point(self.farthest_corner(plane)) > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_size() {
        let aabb = Aabb::new(Vec3::new(-0.5, 0.0, 0.25), Vec3::new(0.5, 0.5, 0.75));
        assert_eq!(aabb.center(), Vec3::new(0.0, 0.25, 0.5));
        assert_eq!(aabb.size(), Vec3::new(1.0, 0.5, 0.5));
    }

    #[test]
    fn test_plane_corners() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let plane = Plane::new(Vec3::NEG_Z, 5.0);
        assert_eq!(aabb.nearest_corner(&plane), Vec3::new(-1.0, -1.0, 1.0));
        assert_eq!(aabb.farthest_corner(&plane), Vec3::new(1.0, 1.0, -1.0));
    }

    #[test]
    fn test_straddles() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(aabb.straddles(&Plane::new(Vec3::Z, 0.5)));
        assert!(!aabb.straddles(&Plane::new(Vec3::Z, 3.0)));
        assert!(!aabb.straddles(&Plane::new(Vec3::NEG_Z, -3.0)));
    }
}
