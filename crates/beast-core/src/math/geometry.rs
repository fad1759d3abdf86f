// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Geometric primitives: rectangles, bounding volumes and planes.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Integer rectangle, used for atlas regions and viewports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2I {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect2I {
    /// Creates a rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether the two rectangles share any pixel.
    pub fn overlaps(&self, other: &Rect2I) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect2I) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// The rectangle expressed as a fraction of a `width` x `height` surface.
    pub fn normalized(&self, width: u32, height: u32) -> Rect2 {
        let inv_w = 1.0 / width.max(1) as f32;
        let inv_h = 1.0 / height.max(1) as f32;
        Rect2 {
            x: self.x as f32 * inv_w,
            y: self.y as f32 * inv_h,
            width: self.width as f32 * inv_w,
            height: self.height as f32 * inv_h,
        }
    }
}

/// Floating point rectangle, usually in normalized `[0, 1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect2 {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect2 {
    /// Packs the rectangle as `(x, y, width, height)`.
    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.x, self.y, self.width, self.height)
    }

    /// Top-left corner.
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points. `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    /// Center point.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Squared distance from `point` to the box, zero when inside.
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        let closest = point.clamp(self.min, self.max);
        closest.distance_squared(point)
    }

    /// Whether the sphere touches the box.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.distance_squared(sphere.center) <= sphere.radius * sphere.radius
    }
}

/// Bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center.
    pub center: Vec3,
    /// Radius.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere.
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the centroid of the points, enclosing all of them.
    pub fn enclosing(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::new(Vec3::ZERO, 0.0);
        }
        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Self::new(center, radius)
    }

    /// Whether the point lies inside or on the sphere.
    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    /// Whether the two spheres overlap.
    pub fn intersects(&self, other: &Sphere) -> bool {
        let r = self.radius + other.radius;
        self.center.distance_squared(other.center) <= r * r
    }
}

/// Plane in `normal . p + d = 0` form. Points with a positive signed
/// distance are in front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vec3,
    /// Offset along the normal.
    pub d: f32,
}

impl Plane {
    /// Builds a plane from raw coefficients, normalizing them.
    pub fn from_coefficients(v: Vec4) -> Self {
        let len = v.truncate().length();
        if len <= f32::EPSILON {
            return Self {
                normal: Vec3::Z,
                d: 0.0,
            };
        }
        Self {
            normal: v.truncate() / len,
            d: v.w / len,
        }
    }

    /// Signed distance from the plane.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Intersection of half-spaces, each plane facing inward.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvexVolume {
    /// Inward-facing bounding planes.
    pub planes: Vec<Plane>,
}

impl ConvexVolume {
    /// Volume bounded by the given inward-facing planes.
    pub fn new(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    /// Frustum of a view-projection matrix with a `[0, 1]` clip depth range.
    ///
    /// Planes are ordered left, right, bottom, top, near, far.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);
        Self::new(vec![
            Plane::from_coefficients(r3 + r0),
            Plane::from_coefficients(r3 - r0),
            Plane::from_coefficients(r3 + r1),
            Plane::from_coefficients(r3 - r1),
            Plane::from_coefficients(r2),
            Plane::from_coefficients(r3 - r2),
        ])
    }

    /// Conservative sphere test: false only if the sphere is fully outside
    /// one of the planes.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance(sphere.center) >= -sphere.radius)
    }

    /// Whether the point is inside every plane.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_overlap_is_exclusive_on_edges() {
        let a = Rect2I::new(0, 0, 64, 64);
        let b = Rect2I::new(64, 0, 64, 64);
        let c = Rect2I::new(32, 32, 64, 64);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(Rect2I::new(0, 0, 256, 256).contains_rect(&c));
    }

    #[test]
    fn normalized_rect_divides_by_surface() {
        let n = Rect2I::new(1024, 0, 512, 2048).normalized(4096, 4096);
        assert_eq!(n.to_vec4(), Vec4::new(0.25, 0.0, 0.125, 0.5));
    }

    #[test]
    fn frustum_culls_spheres_behind_camera() {
        let proj = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let frustum = ConvexVolume::from_view_projection(&(proj * view));

        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -200.0), 1.0)));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn aabb_sphere_distance() {
        let aabb = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.intersects_sphere(&Sphere::new(Vec3::new(2.0, 0.5, 0.5), 1.0)));
        assert!(!aabb.intersects_sphere(&Sphere::new(Vec3::new(3.0, 0.5, 0.5), 1.0)));
        assert_eq!(aabb.center(), Vec3::splat(0.5));
    }

    #[test]
    fn enclosing_sphere_contains_all_points() {
        let points = [Vec3::ZERO, Vec3::X * 4.0, Vec3::Y * 2.0];
        let sphere = Sphere::enclosing(&points);
        for p in points {
            assert!(sphere.contains(p) || (sphere.center.distance(p) - sphere.radius).abs() < 1e-4);
        }
    }
}
