//! Sphere primitive for ray tracing.

use std::f32::consts::PI;

use lumen_math::{Color, Interval, Ray, Vec2, Vec3};
use rand::RngCore;

use crate::interactable::{Hit, Interactable, Surface};

/// A sphere primitive.
#[derive(Clone)]
pub struct Sphere {
    pub center: Vec3,
    radius: f32,
    pub surface: Surface,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, surface: Surface) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            surface,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y
        // phi: angle around Y axis from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        Vec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Interactable for Sphere {
    fn interacts<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        hit: &mut Hit,
    ) -> Option<&'a dyn Interactable> {
        // A point sphere has no surface to report a normal for
        if self.radius <= 0.0 {
            return None;
        }

        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if a <= 0.0 || discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let point = ray.at(root);
        let outward = (point - self.center) / self.radius;
        let reverse_intersect = ray.direction().dot(outward) > 0.0;
        let normal = if reverse_intersect { -outward } else { outward };

        *hit = Hit::new(root, point, normal, reverse_intersect);
        Some(self)
    }

    fn redirect(&self, ray: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        self.surface.redirect(ray, hit, rng)
    }

    fn albedo(&self, hit: &Hit) -> Color {
        let uv = hit.uv_or_init(|| Self::sphere_uv((hit.point() - self.center) / self.radius));
        self.surface.texture.albedo(uv)
    }

    fn emission(&self, _hit: &Hit) -> f32 {
        self.surface.emission()
    }

    fn centroid(&self) -> Option<Vec3> {
        Some(self.center)
    }

    fn move_to(&mut self, point: Vec3) {
        self.center = point;
    }
}
