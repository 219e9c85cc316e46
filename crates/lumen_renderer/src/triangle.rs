//! Triangle and quad primitives for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use lumen_math::{Color, Interval, Ray, Vec2, Vec3};
use rand::RngCore;

use crate::interactable::{Hit, Interactable, Surface};

/// Determinant threshold below which a ray counts as parallel to the triangle.
const PARALLEL_EPSILON: f32 = 1e-5;

/// A triangle primitive.
#[derive(Clone)]
pub struct Triangle {
    /// Vertices
    p1: Vec3,
    p2: Vec3,
    p3: Vec3,
    /// Pre-computed edges from `p1`
    e1: Vec3,
    e2: Vec3,
    /// Pre-computed face normal (unit length, zero when degenerate)
    normal: Vec3,
    pub surface: Surface,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(p1: Vec3, p2: Vec3, p3: Vec3, surface: Surface) -> Self {
        let e1 = p2 - p1;
        let e2 = p3 - p1;

        Self {
            p1,
            p2,
            p3,
            e1,
            e2,
            normal: e1.cross(e2).normalize_or_zero(),
            surface,
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.p1, self.p2, self.p3]
    }

    /// Unit face normal following the vertex winding.
    pub fn face_normal(&self) -> Vec3 {
        self.normal
    }

    /// Shift all vertices by `delta`. Edges and normal are unchanged.
    pub fn translate(&mut self, delta: Vec3) {
        self.p1 += delta;
        self.p2 += delta;
        self.p3 += delta;
    }

    /// Intersection parameter and barycentric coordinates of `ray` within `ray_t`.
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<(f32, Vec2)> {
        let h = ray.direction().cross(self.e2);
        let a = self.e1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < PARALLEL_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.p1;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.e1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.e2.dot(q);
        ray_t.surrounds(t).then_some((t, Vec2::new(u, v)))
    }
}

impl Interactable for Triangle {
    fn interacts<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        hit: &mut Hit,
    ) -> Option<&'a dyn Interactable> {
        let (t, _) = self.intersect(ray, ray_t)?;

        let facing = self.normal.dot(ray.direction());
        let normal = self.normal * -facing.signum();

        *hit = Hit::new(t, ray.at(t), normal, facing > 0.0);
        Some(self)
    }

    fn redirect(&self, ray: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        self.surface.redirect(ray, hit, rng)
    }

    fn albedo(&self, hit: &Hit) -> Color {
        // No surface parameterisation for flat primitives yet
        let uv = hit.uv_or_init(|| Vec2::ZERO);
        self.surface.texture.albedo(uv)
    }

    fn emission(&self, _hit: &Hit) -> f32 {
        self.surface.emission()
    }

    fn centroid(&self) -> Option<Vec3> {
        Some((self.p1 + self.p2 + self.p3) / 3.0)
    }

    fn move_to(&mut self, point: Vec3) {
        let delta = point - (self.p1 + self.p2 + self.p3) / 3.0;
        self.translate(delta);
    }
}

/// A planar quad `(a, b, c, d)`, split into triangles `(a, b, c)` and `(a, c, d)`.
#[derive(Clone)]
pub struct Quad {
    h1: Triangle,
    h2: Triangle,
}

impl Quad {
    pub fn new(a: Vec3, b: Vec3, c: Vec3, d: Vec3, surface: Surface) -> Self {
        Self {
            h1: Triangle::new(a, b, c, surface.clone()),
            h2: Triangle::new(a, c, d, surface),
        }
    }

    pub fn corners(&self) -> [Vec3; 4] {
        let [a, b, c] = self.h1.vertices();
        let [_, _, d] = self.h2.vertices();
        [a, b, c, d]
    }

    pub fn surface(&self) -> &Surface {
        &self.h1.surface
    }
}

impl Interactable for Quad {
    fn interacts<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        hit: &mut Hit,
    ) -> Option<&'a dyn Interactable> {
        // The halves only share an edge, so the first hit is the only one
        let struck = self.h1.interacts(ray, ray_t, hit).is_some()
            || self.h2.interacts(ray, ray_t, hit).is_some();
        struck.then_some(self as &dyn Interactable)
    }

    fn redirect(&self, ray: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        self.h1.redirect(ray, hit, rng)
    }

    fn albedo(&self, hit: &Hit) -> Color {
        self.h1.albedo(hit)
    }

    fn emission(&self, hit: &Hit) -> f32 {
        self.h1.emission(hit)
    }

    fn centroid(&self) -> Option<Vec3> {
        let [a, b, c, d] = self.corners();
        Some((a + b + c + d) / 4.0)
    }

    fn move_to(&mut self, point: Vec3) {
        let [a, b, c, d] = self.corners();
        let delta = point - (a + b + c + d) / 4.0;
        self.h1.translate(delta);
        self.h2.translate(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactable::TRACE_INTERVAL;

    fn facing_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, -5.0),
            Vec3::new(1.0, -1.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
            Surface::default(),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let triangle = facing_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut hit = Hit::default();

        assert!(triangle.interacts(&ray, TRACE_INTERVAL, &mut hit).is_some());
        assert!((hit.ptime - 5.0).abs() < 1e-5);
        assert!((hit.surface_normal() - Vec3::Z).length() < 1e-5);
        assert!(!hit.reverse_intersect);
    }

    #[test]
    fn test_triangle_hit_from_behind_flips_normal() {
        let triangle = facing_triangle();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        let mut hit = Hit::default();

        assert!(triangle.interacts(&ray, TRACE_INTERVAL, &mut hit).is_some());
        assert!((hit.surface_normal() - Vec3::NEG_Z).length() < 1e-5);
        assert!(hit.reverse_intersect);
    }

    #[test]
    fn test_triangle_miss() {
        let triangle = facing_triangle();
        let mut hit = Hit::default();

        let outside = Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::NEG_Z);
        assert!(triangle.interacts(&outside, TRACE_INTERVAL, &mut hit).is_none());

        let parallel = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::X);
        assert!(triangle.interacts(&parallel, TRACE_INTERVAL, &mut hit).is_none());
    }

    #[test]
    fn test_triangle_move_preserves_barycentrics() {
        let mut triangle = facing_triangle();
        let ray = Ray::new(Vec3::new(0.2, -0.3, 0.0), Vec3::NEG_Z);
        let (t_before, uv_before) = triangle.intersect(&ray, TRACE_INTERVAL).unwrap();

        let delta = Vec3::new(4.0, -2.0, 1.0);
        let target = triangle.centroid().unwrap() + delta;
        triangle.move_to(target);
        assert!((triangle.centroid().unwrap() - target).length() < 1e-5);

        let moved_ray = Ray::new(ray.origin() + delta, ray.direction());
        let (t_after, uv_after) = triangle.intersect(&moved_ray, TRACE_INTERVAL).unwrap();
        assert!((t_after - t_before).abs() < 1e-4);
        assert!((uv_after - uv_before).length() < 1e-4);
    }

    #[test]
    fn test_triangle_uv_stub() {
        let triangle = facing_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut hit = Hit::default();
        triangle.interacts(&ray, TRACE_INTERVAL, &mut hit).unwrap();

        assert_eq!(triangle.albedo(&hit), Color::ONE);
        assert_eq!(hit.uv(), Some(Vec2::ZERO));
    }

    fn floor_quad() -> Quad {
        Quad::new(
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, -1.0),
            Surface::colored(Color::new(0.0, 1.0, 0.0)),
        )
    }

    #[test]
    fn test_quad_hits_both_halves() {
        let quad = floor_quad();
        let mut hit = Hit::default();

        // (a, b, c) half
        let ray = Ray::new(Vec3::new(0.5, 2.0, 0.5), Vec3::NEG_Y);
        assert!(quad.interacts(&ray, TRACE_INTERVAL, &mut hit).is_some());
        assert!((hit.ptime - 2.0).abs() < 1e-5);

        // (a, c, d) half
        let ray = Ray::new(Vec3::new(-0.5, 2.0, -0.5), Vec3::NEG_Y);
        assert!(quad.interacts(&ray, TRACE_INTERVAL, &mut hit).is_some());
        assert!((hit.surface_normal() - Vec3::Y).length() < 1e-5);
        assert_eq!(quad.albedo(&hit), Color::new(0.0, 1.0, 0.0));

        let ray = Ray::new(Vec3::new(3.0, 2.0, 0.0), Vec3::NEG_Y);
        assert!(quad.interacts(&ray, TRACE_INTERVAL, &mut hit).is_none());
    }

    #[test]
    fn test_quad_move_to() {
        let mut quad = floor_quad();
        assert_eq!(quad.centroid(), Some(Vec3::ZERO));

        quad.move_to(Vec3::new(0.0, -3.0, 0.0));
        assert_eq!(quad.centroid(), Some(Vec3::new(0.0, -3.0, 0.0)));
        assert_eq!(quad.corners()[0], Vec3::new(-1.0, -3.0, 1.0));

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Y);
        let mut hit = Hit::default();
        assert!(quad.interacts(&ray, TRACE_INTERVAL, &mut hit).is_some());
        assert!((hit.ptime - 3.0).abs() < 1e-5);
    }
}
