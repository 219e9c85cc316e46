//! Material trait for surface scattering.

use std::sync::{Arc, LazyLock};

use lumen_math::{Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::interactable::Hit;
use crate::sampling::{gen_f32, random_in_unit_sphere, random_unit_vector};

/// Trait for materials that describe how light leaves a surface.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray at `hit`.
    ///
    /// Returns the continuing ray, or `None` when the ray is absorbed.
    fn redirect(&self, source: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray>;

    /// Self-illumination strength. Most materials emit nothing.
    fn luminance(&self) -> f32 {
        0.0
    }
}

/// The one material model: a single uniform draw picks a lobe.
///
/// `u < roughness` scatters diffusely, `u < transparency` refracts and anything
/// else reflects. The thresholds are cumulative, so `transparency` only has an
/// effect above `roughness`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalBase {
    /// Diffuse probability in [0, 1]
    pub roughness: f32,
    /// Perturbation of the mirror lobe (0 = perfect mirror)
    pub glossiness: f32,
    /// Upper threshold of the refraction lobe in [0, 1]
    pub transparency: f32,
    /// Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub refraction_index: f32,
    /// Emission strength
    pub luminance: f32,
}

impl PhysicalBase {
    /// Fully diffuse, non-emissive.
    pub fn diffuse() -> Self {
        Self::default()
    }

    /// Reflective with the given glossiness.
    pub fn mirror(glossiness: f32) -> Self {
        Self {
            roughness: 0.0,
            glossiness: glossiness.max(0.0),
            ..Self::default()
        }
    }

    /// Clear refractive medium.
    pub fn glass(refraction_index: f32) -> Self {
        Self {
            roughness: 0.0,
            transparency: 1.0,
            refraction_index,
            ..Self::default()
        }
    }

    /// Diffuse light source.
    pub fn emissive(luminance: f32) -> Self {
        Self {
            luminance: luminance.max(0.0),
            ..Self::default()
        }
    }

    pub fn with_luminance(mut self, luminance: f32) -> Self {
        self.luminance = luminance.max(0.0);
        self
    }

    /// Schlick's approximation for reflectance.
    fn reflectance(cosine: f32, ratio: f32) -> f32 {
        let r0 = ((1.0 - ratio) / (1.0 + ratio)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }

    fn scatter_diffuse(hit: &Hit, rng: &mut dyn RngCore) -> Ray {
        let normal = hit.surface_normal();
        Ray::new(hit.point(), diffuse_direction(normal, random_unit_vector(rng)))
    }

    fn scatter_refract(&self, unit_direction: Vec3, hit: &Hit, rng: &mut dyn RngCore) -> Ray {
        let normal = hit.surface_normal();
        let ratio = if hit.reverse_intersect {
            self.refraction_index
        } else {
            1.0 / self.refraction_index
        };

        let cos_theta = (-unit_direction).dot(normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        let cannot_refract = ratio * sin_theta > 1.0;
        let direction = if cannot_refract || Self::reflectance(cos_theta, ratio) > gen_f32(rng) {
            reflect(unit_direction, normal)
        } else {
            refract(unit_direction, normal, ratio)
        };
        Ray::new(hit.point(), direction)
    }

    fn scatter_reflect(&self, unit_direction: Vec3, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        let normal = hit.surface_normal();
        let direction =
            reflect(unit_direction, normal) + self.glossiness * random_in_unit_sphere(rng);

        // Only scatter if the reflected ray stays above the surface
        (direction.dot(normal) > 0.0).then(|| Ray::new(hit.point(), direction))
    }
}

impl Default for PhysicalBase {
    fn default() -> Self {
        Self {
            roughness: 1.0,
            glossiness: 0.0,
            transparency: 0.0,
            refraction_index: 1.5,
            luminance: 0.0,
        }
    }
}

impl Material for PhysicalBase {
    fn redirect(&self, source: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        let u = gen_f32(rng);
        if u < self.roughness {
            return Some(Self::scatter_diffuse(hit, rng));
        }

        let unit_direction = source.direction().normalize_or_zero();
        if u < self.transparency {
            Some(self.scatter_refract(unit_direction, hit, rng))
        } else {
            self.scatter_reflect(unit_direction, hit, rng)
        }
    }

    fn luminance(&self) -> f32 {
        self.luminance
    }
}

/// Lambertian direction `normal + offset`, or the bare normal when the two cancel out.
fn diffuse_direction(normal: Vec3, offset: Vec3) -> Vec3 {
    let direction = normal + offset;
    if direction.length_squared() < 1e-8 {
        normal
    } else {
        direction
    }
}

static DEFAULT_MATERIAL: LazyLock<Arc<dyn Material>> =
    LazyLock::new(|| Arc::new(PhysicalBase::default()));

/// Shared handle to the process-wide default material.
pub fn default_material() -> Arc<dyn Material> {
    Arc::clone(&DEFAULT_MATERIAL)
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a vector through a surface.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}
