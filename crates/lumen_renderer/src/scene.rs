//! The scene: an ordered collection of interactables plus the sky color.

use std::sync::Arc;

use lumen_math::{Color, Interval, Ray, Vec3};
use rand::RngCore;

use crate::interactable::{Hit, Interactable, TRACE_INTERVAL};

/// Sky color used when none is configured.
pub const DEFAULT_SKY: Color = Color::new(0.5, 0.7, 1.0);

/// An ordered list of shared interactable handles.
///
/// The scene is itself an `Interactable`: it reports the closest hit among its
/// objects, and acts as the sky for rays that escape.
pub struct Scene {
    objects: Vec<Arc<dyn Interactable>>,
    sky: Color,
}

impl Scene {
    /// Create a new empty scene with the given sky color.
    pub fn new(sky: Color) -> Self {
        Self {
            objects: Vec::new(),
            sky,
        }
    }

    /// Add an object, returning its index.
    pub fn add(&mut self, object: impl Interactable + 'static) -> usize {
        self.add_shared(Arc::new(object))
    }

    /// Add a handle that may also be held elsewhere.
    pub fn add_shared(&mut self, object: Arc<dyn Interactable>) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Builder-style `add`.
    pub fn with(mut self, object: impl Interactable + 'static) -> Self {
        self.add(object);
        self
    }

    /// Remove the object at `index`, shifting later objects down.
    pub fn remove(&mut self, index: usize) -> Option<Arc<dyn Interactable>> {
        (index < self.objects.len()).then(|| self.objects.remove(index))
    }

    /// Clear all objects from the scene.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn object(&self, index: usize) -> Option<&Arc<dyn Interactable>> {
        self.objects.get(index)
    }

    /// Mutable access, only while the scene holds the sole handle.
    pub fn object_mut(&mut self, index: usize) -> Option<&mut (dyn Interactable + 'static)> {
        self.objects.get_mut(index).and_then(Arc::get_mut)
    }

    /// Move the object at `index` so its centroid lands on `point`.
    ///
    /// Returns false when there is no such object or its handle is shared.
    pub fn move_object(&mut self, index: usize, point: Vec3) -> bool {
        match self.object_mut(index) {
            Some(object) => {
                object.move_to(point);
                true
            }
            None => false,
        }
    }

    pub fn sky(&self) -> Color {
        self.sky
    }

    pub fn set_sky(&mut self, sky: Color) {
        self.sky = sky;
    }

    /// Get the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Closest hit along `ray` within the standard trace window.
    pub fn closest_hit(&self, ray: &Ray) -> Option<(Hit, &dyn Interactable)> {
        let mut hit = Hit::default();
        let object = self.interacts(ray, TRACE_INTERVAL, &mut hit)?;
        Some((hit, object))
    }

    /// Index of the closest object along `ray`, for picking.
    pub fn pick(&self, ray: &Ray) -> Option<usize> {
        let mut hit = Hit::default();
        let mut window = TRACE_INTERVAL;
        let mut picked = None;

        for (index, object) in self.objects.iter().enumerate() {
            if object.interacts(ray, window, &mut hit).is_some() {
                window = window.with_max(hit.ptime);
                picked = Some(index);
            }
        }

        picked
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(DEFAULT_SKY)
    }
}

impl Interactable for Scene {
    fn interacts<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        hit: &mut Hit,
    ) -> Option<&'a dyn Interactable> {
        let mut closest = None;
        let mut window = ray_t;

        for object in &self.objects {
            if let Some(struck) = object.interacts(ray, window, hit) {
                window = window.with_max(hit.ptime);
                closest = Some(struck);
            }
        }

        closest
    }

    fn redirect(&self, _ray: &Ray, _hit: &Hit, _rng: &mut dyn RngCore) -> Option<Ray> {
        None
    }

    fn albedo(&self, _hit: &Hit) -> Color {
        self.sky
    }

    fn emission(&self, _hit: &Hit) -> f32 {
        0.0
    }
}
