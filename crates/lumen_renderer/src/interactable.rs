//! The `Interactable` capability and the `Hit` record it fills in.

use std::cell::OnceCell;
use std::sync::Arc;

use lumen_math::{Color, Interval, Ray, Vec2, Vec3};
use rand::RngCore;

use crate::material::{default_material, Material};
use crate::texture::{default_texture, StaticColor, Texture};

/// Smallest accepted ray parameter; keeps scattered rays from re-hitting their origin.
pub const T_MIN: f32 = 1e-4;

/// Hard cutoff for ray parameters.
pub const T_MAX: f32 = f32::MAX;

/// The window every primary and scattered ray is traced with.
pub const TRACE_INTERVAL: Interval = Interval {
    min: T_MIN,
    max: T_MAX,
};

/// Record of a ray-object intersection.
#[derive(Clone, Debug)]
pub struct Hit {
    /// Parameter along the ray where the intersection occurs
    pub ptime: f32,
    /// Origin = world-space hit point, direction = unit surface normal.
    /// The normal always faces against the incoming ray.
    pub normal: Ray,
    /// True when the ray struck the surface from the inside (leaving the medium)
    pub reverse_intersect: bool,
    /// Surface coordinates, computed on first use by the struck object
    uv: OnceCell<Vec2>,
}

impl Hit {
    pub fn new(ptime: f32, point: Vec3, normal: Vec3, reverse_intersect: bool) -> Self {
        Self {
            ptime,
            normal: Ray::new(point, normal),
            reverse_intersect,
            uv: OnceCell::new(),
        }
    }

    /// World-space hit point.
    #[inline]
    pub fn point(&self) -> Vec3 {
        self.normal.origin
    }

    /// Unit surface normal facing against the incoming ray.
    #[inline]
    pub fn surface_normal(&self) -> Vec3 {
        self.normal.direction
    }

    /// Surface coordinates if they have been computed already.
    pub fn uv(&self) -> Option<Vec2> {
        self.uv.get().copied()
    }

    /// Surface coordinates, computing them with `compute` the first time.
    pub fn uv_or_init(&self, compute: impl FnOnce() -> Vec2) -> Vec2 {
        *self.uv.get_or_init(compute)
    }
}

impl Default for Hit {
    fn default() -> Self {
        Self::new(T_MAX, Vec3::ZERO, Vec3::ZERO, false)
    }
}

/// Anything a ray can interact with: primitives, and the scene aggregate itself.
pub trait Interactable: Send + Sync {
    /// Test the ray against this entity within `ray_t`.
    ///
    /// On a hit, fills in `hit` and returns the entity actually struck so the
    /// caller can query its material and texture. `hit` is left untouched on a miss.
    fn interacts<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        hit: &mut Hit,
    ) -> Option<&'a dyn Interactable>;

    /// Scatter an incoming ray at `hit`. `None` terminates the path.
    fn redirect(&self, ray: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray>;

    /// Base surface color at `hit`.
    fn albedo(&self, hit: &Hit) -> Color;

    /// Self-illumination at `hit`.
    fn emission(&self, hit: &Hit) -> f32;

    /// The point `move_to` re-centres, if the entity can be repositioned.
    fn centroid(&self) -> Option<Vec3> {
        None
    }

    /// Translate the entity so that its centroid lands on `point`.
    fn move_to(&mut self, _point: Vec3) {}
}

/// Material and texture bound to a primitive.
///
/// Both are shared handles: many primitives may reference one material.
#[derive(Clone)]
pub struct Surface {
    pub material: Arc<dyn Material>,
    pub texture: Arc<dyn Texture>,
}

impl Surface {
    pub fn new(material: Arc<dyn Material>, texture: Arc<dyn Texture>) -> Self {
        Self { material, texture }
    }

    /// Default material with a constant color.
    pub fn colored(color: Color) -> Self {
        Self::new(default_material(), Arc::new(StaticColor::new(color)))
    }

    pub fn with_material(mut self, material: Arc<dyn Material>) -> Self {
        self.material = material;
        self
    }

    pub fn with_texture(mut self, texture: Arc<dyn Texture>) -> Self {
        self.texture = texture;
        self
    }

    #[inline]
    pub fn redirect(&self, ray: &Ray, hit: &Hit, rng: &mut dyn RngCore) -> Option<Ray> {
        self.material.redirect(ray, hit, rng)
    }

    #[inline]
    pub fn emission(&self) -> f32 {
        self.material.luminance()
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(default_material(), default_texture())
    }
}
