//! Core path tracing renderer.
//!
//! Per-pixel evaluation in three modes:
//! - Unshaded: raw albedo of the first hit
//! - Shaded: `pixel_samples` independent paths, each bounced up to the limit
//! - Recursive: every hit fans out into `recursive_samples` child paths
//!
//! Results are averaged, clamped, square-rooted and packed into RGBA8.

use bitflags::bitflags;
use lumen_math::{luminance_mean, Color, Interval, Ray, Vec3, Vec4};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::interactable::{Hit, Interactable, TRACE_INTERVAL};
use crate::scene::Scene;

bitflags! {
    /// Renderer switches. Serialised by flag name, e.g. `"ACCUMULATE | PARALLELIZE"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RenderFlags: u32 {
        /// Publish only whole frames to the consumer
        const SYNC_FRAME = 1 << 0;
        /// Running mean over frames
        const ACCUMULATE = 1 << 1;
        /// Trace `antialias_samples` jittered directions per pixel
        const MULTISAMPLE_AA = 1 << 2;
        /// Distribute rows across the thread pool
        const PARALLELIZE = 1 << 3;
        /// Albedo only, no bounces
        const UNSHADED = 1 << 4;
        /// Fan out at every hit instead of tracing independent paths
        const RECURSIVE_SAMPLES = 1 << 5;
    }
}

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    pub render_flags: RenderFlags,
    /// Maximum ray bounce depth
    pub bounce_limit: u32,
    /// Independent paths per pixel in shaded mode
    pub pixel_samples: u32,
    /// Child rays per hit in recursive mode
    pub recursive_samples: u32,
    /// Jittered directions per pixel with `MULTISAMPLE_AA`
    pub antialias_samples: u32,
}

impl Properties {
    pub const BOUNCE_LIMIT_RANGE: (u32, u32) = (1, 20);
    pub const PIXEL_SAMPLES_RANGE: (u32, u32) = (1, 500);
    pub const RECURSIVE_SAMPLES_RANGE: (u32, u32) = (1, 10);
    pub const ANTIALIAS_SAMPLES_RANGE: (u32, u32) = (1, 10);

    /// Copy with every count forced into its accepted range.
    pub fn clamped(&self) -> Self {
        let clamp = |value: u32, (min, max): (u32, u32)| value.clamp(min, max);
        Self {
            render_flags: self.render_flags,
            bounce_limit: clamp(self.bounce_limit, Self::BOUNCE_LIMIT_RANGE),
            pixel_samples: clamp(self.pixel_samples, Self::PIXEL_SAMPLES_RANGE),
            recursive_samples: clamp(self.recursive_samples, Self::RECURSIVE_SAMPLES_RANGE),
            antialias_samples: clamp(self.antialias_samples, Self::ANTIALIAS_SAMPLES_RANGE),
        }
    }

    /// Restore the defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Directions generated per pixel.
    pub fn ray_depth(&self) -> usize {
        if self.render_flags.contains(RenderFlags::MULTISAMPLE_AA) {
            self.antialias_samples.max(1) as usize
        } else {
            1
        }
    }

    /// Whether completed frames feed the running mean.
    pub fn accumulates(&self) -> bool {
        self.render_flags.contains(RenderFlags::ACCUMULATE)
            && !self.render_flags.contains(RenderFlags::UNSHADED)
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            render_flags: RenderFlags::ACCUMULATE,
            bounce_limit: 5,
            pixel_samples: 5,
            recursive_samples: 3,
            antialias_samples: 3,
        }
    }
}

fn trace<'a>(scene: &'a Scene, ray: &Ray) -> Option<(Hit, &'a dyn Interactable)> {
    let mut hit = Hit::default();
    let object = scene.interacts(ray, TRACE_INTERVAL, &mut hit)?;
    Some((hit, object))
}

/// Albedo of the first surface along `ray`, or the sky.
pub fn evaluate_ray_albedo(scene: &Scene, ray: &Ray) -> Color {
    match trace(scene, ray) {
        Some((hit, object)) => object.albedo(&hit),
        None => scene.albedo(&Hit::default()),
    }
}

/// Follow a single path for up to `bounces` redirects.
///
/// Combines as `albedo * (next + luminance)`; a surface with
/// `mean(albedo) * luminance >= 1` ends the path as a light, and a surface
/// that absorbs the ray returns the sky.
pub fn evaluate_ray(scene: &Scene, ray: &Ray, bounces: u32, rng: &mut dyn RngCore) -> Color {
    let Some((hit, object)) = trace(scene, ray) else {
        return scene.albedo(&Hit::default());
    };

    let color = object.albedo(&hit);
    let luminance = object.emission(&hit);
    if bounces == 0 || luminance_mean(color) * luminance >= 1.0 {
        return color * luminance;
    }

    // An absorbed path shows the background, not the surface
    let Some(redirected) = object.redirect(ray, &hit, rng) else {
        return scene.albedo(&hit);
    };
    color * (evaluate_ray(scene, &redirected, bounces - 1, rng) + luminance)
}

/// Fan out `samples` redirected rays at every hit and average them.
///
/// If the material stops producing redirects partway through, the average
/// covers only the samples that succeeded; failing on the very first one
/// returns the sky.
pub fn recursively_sample_ray(
    scene: &Scene,
    ray: &Ray,
    samples: u32,
    bounces: u32,
    rng: &mut dyn RngCore,
) -> Color {
    let Some((hit, object)) = trace(scene, ray) else {
        return scene.albedo(&Hit::default());
    };

    let color = object.albedo(&hit);
    let luminance = object.emission(&hit);
    if bounces == 0 || luminance_mean(color) * luminance >= 1.0 {
        return color * luminance;
    }

    let samples = samples.max(1);
    let mut taken = samples;
    let mut sum = Color::ZERO;
    for sample in 0..samples {
        match object.redirect(ray, &hit, rng) {
            Some(redirected) => {
                sum += recursively_sample_ray(scene, &redirected, samples, bounces - 1, rng);
            }
            None if sample == 0 => return scene.albedo(&hit),
            None => {
                taken = sample;
                break;
            }
        }
    }

    color * (sum / taken as f32 + luminance)
}

/// Clamped color of one pixel, averaged over the configured samples.
///
/// `directions` is the pixel's group from the ray buffer; only its first
/// entry is used unless `MULTISAMPLE_AA` is set.
pub fn shade_pixel(
    scene: &Scene,
    origin: Vec3,
    directions: &[Vec3],
    properties: &Properties,
    rng: &mut dyn RngCore,
) -> Color {
    let Some(&primary) = directions.first() else {
        return scene.sky().clamp(Vec3::ZERO, Vec3::ONE);
    };
    let flags = properties.render_flags;
    let directions = if flags.contains(RenderFlags::MULTISAMPLE_AA) {
        directions
    } else {
        &directions[..1]
    };

    let color = if flags.contains(RenderFlags::UNSHADED) {
        evaluate_ray_albedo(scene, &Ray::new(origin, primary))
    } else if flags.contains(RenderFlags::RECURSIVE_SAMPLES) {
        let sum: Color = directions
            .iter()
            .map(|&direction| {
                recursively_sample_ray(
                    scene,
                    &Ray::new(origin, direction),
                    properties.recursive_samples,
                    properties.bounce_limit,
                    rng,
                )
            })
            .sum();
        sum / directions.len() as f32
    } else {
        let trials = properties.pixel_samples.max(1);
        let mut sum = Color::ZERO;
        for trial in 0..trials as usize {
            let ray = Ray::new(origin, directions[trial % directions.len()]);
            sum += evaluate_ray(scene, &ray, properties.bounce_limit, rng);
        }
        sum / trials as f32
    };

    color.clamp(Vec3::ZERO, Vec3::ONE)
}

/// Display tone curve: clamp to [0, 1] then square root.
#[inline]
pub fn tone_map(color: Color) -> Color {
    let unit = Interval::UNIT;
    Color::new(
        unit.clamp(color.x).sqrt(),
        unit.clamp(color.y).sqrt(),
        unit.clamp(color.z).sqrt(),
    )
}

/// Pack a color into RGBA8 as `A << 24 | B << 16 | G << 8 | R`.
///
/// Components are clamped to [0, 1] and quantised by truncation.
#[inline]
pub fn encode_rgba(color: Color, alpha: f32) -> u32 {
    let unit = Interval::UNIT;
    let byte = |c: f32| (unit.clamp(c) * 255.0) as u32;
    (byte(alpha) << 24) | (byte(color.z) << 16) | (byte(color.y) << 8) | byte(color.x)
}

/// Inverse of `encode_rgba`, as RGBA components in [0, 1].
#[inline]
pub fn decode_rgba(pixel: u32) -> Vec4 {
    let channel = |shift: u32| ((pixel >> shift) & 0xff) as f32 / 255.0;
    Vec4::new(channel(0), channel(8), channel(16), channel(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactable::Surface;
    use crate::material::PhysicalBase;
    use crate::sphere::Sphere;
    use lumen_math::is_finite_vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn red_sphere_scene() -> Scene {
        Scene::new(Color::new(0.2, 0.3, 0.4)).with(Sphere::new(
            Vec3::new(0.0, 0.0, -5.0),
            1.0,
            Surface::colored(Color::new(1.0, 0.0, 0.0)),
        ))
    }

    #[test]
    fn test_default_properties() {
        let props = Properties::default();
        assert_eq!(props.render_flags, RenderFlags::ACCUMULATE);
        assert_eq!(props.bounce_limit, 5);
        assert_eq!(props.pixel_samples, 5);
        assert_eq!(props.recursive_samples, 3);
        assert_eq!(props.antialias_samples, 3);
        assert_eq!(props.ray_depth(), 1);
        assert!(props.accumulates());
    }

    #[test]
    fn test_properties_clamped_and_reset() {
        let mut props = Properties {
            render_flags: RenderFlags::MULTISAMPLE_AA,
            bounce_limit: 0,
            pixel_samples: 10_000,
            recursive_samples: 0,
            antialias_samples: 50,
        };
        let clamped = props.clamped();
        assert_eq!(clamped.bounce_limit, 1);
        assert_eq!(clamped.pixel_samples, 500);
        assert_eq!(clamped.recursive_samples, 1);
        assert_eq!(clamped.antialias_samples, 10);
        assert_eq!(clamped.ray_depth(), 10);

        props.reset();
        assert_eq!(props, Properties::default());
    }

    #[test]
    fn test_properties_json() {
        let props = Properties {
            render_flags: RenderFlags::ACCUMULATE | RenderFlags::PARALLELIZE,
            ..Default::default()
        };
        let json = serde_json::to_string(&props).unwrap();
        let parsed: Properties = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, props);

        let partial: Properties =
            serde_json::from_str(r#"{"render_flags": "UNSHADED", "bounce_limit": 2}"#).unwrap();
        assert_eq!(partial.render_flags, RenderFlags::UNSHADED);
        assert_eq!(partial.bounce_limit, 2);
        assert_eq!(partial.pixel_samples, 5);
        assert!(!partial.accumulates());
    }

    #[test]
    fn test_miss_returns_sky() {
        let scene = red_sphere_scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(evaluate_ray_albedo(&scene, &ray), scene.sky());
        assert_eq!(evaluate_ray(&scene, &ray, 5, &mut rng), scene.sky());
        assert_eq!(recursively_sample_ray(&scene, &ray, 3, 5, &mut rng), scene.sky());
    }

    /// Flat surface at distance 4 down -Z that bounces rays straight back
    /// a limited number of times, then absorbs them.
    struct Absorber {
        redirects: AtomicUsize,
        albedo: Color,
    }

    impl Absorber {
        fn new(redirects: usize, albedo: Color) -> Self {
            Self {
                redirects: AtomicUsize::new(redirects),
                albedo,
            }
        }
    }

    impl Interactable for Absorber {
        fn interacts<'a>(
            &'a self,
            ray: &Ray,
            ray_t: Interval,
            hit: &mut Hit,
        ) -> Option<&'a dyn Interactable> {
            if ray.direction().z >= 0.0 || !ray_t.surrounds(4.0) {
                return None;
            }
            *hit = Hit::new(4.0, ray.at(4.0), Vec3::Z, false);
            Some(self)
        }

        fn redirect(&self, _ray: &Ray, hit: &Hit, _rng: &mut dyn RngCore) -> Option<Ray> {
            self.redirects
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .ok()
                .map(|_| Ray::new(hit.point(), Vec3::Z))
        }

        fn albedo(&self, _hit: &Hit) -> Color {
            self.albedo
        }

        fn emission(&self, _hit: &Hit) -> f32 {
            0.0
        }
    }

    #[test]
    fn test_absorbed_path_returns_sky() {
        let sky = Color::new(0.2, 0.4, 0.8);
        let scene = Scene::new(sky).with(Absorber::new(0, Color::splat(0.5)));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(evaluate_ray(&scene, &ray, 5, &mut rng), sky);
        assert_eq!(recursively_sample_ray(&scene, &ray, 3, 5, &mut rng), sky);
    }

    #[test]
    fn test_recursive_samples_truncate_after_failure() {
        let sky = Color::new(0.2, 0.4, 0.8);
        // One bounce succeeds and escapes to the sky, the second is absorbed
        let scene = Scene::new(sky).with(Absorber::new(1, Color::ONE));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(0);

        let color = recursively_sample_ray(&scene, &ray, 3, 2, &mut rng);
        assert!(is_finite_vec3(color));
        // Averaged over the single successful sample, not all three
        assert!((color - sky).length() < 1e-6);
    }

    #[test]
    fn test_unshaded_albedo() {
        let scene = red_sphere_scene();
        let props = Properties {
            render_flags: RenderFlags::UNSHADED,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let color = shade_pixel(&scene, Vec3::ZERO, &[Vec3::NEG_Z], &props, &mut rng);
        assert_eq!(color, Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_bounces_is_black_for_non_emitters() {
        let scene = red_sphere_scene();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(evaluate_ray(&scene, &ray, 0, &mut rng), Color::ZERO);
    }

    #[test]
    fn test_bright_emitter_terminates() {
        let light = Surface::colored(Color::ONE).with_material(Arc::new(PhysicalBase::emissive(2.0)));
        let scene = Scene::new(Color::ZERO).with(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, light));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(evaluate_ray(&scene, &ray, 5, &mut rng), Color::splat(2.0));
        assert_eq!(recursively_sample_ray(&scene, &ray, 3, 5, &mut rng), Color::splat(2.0));
    }

    #[test]
    fn test_mirror_combination_rule() {
        // Perfect mirror facing the camera sends the ray back into the sky
        let mirror = Surface::colored(Color::splat(0.5)).with_material(Arc::new(PhysicalBase::mirror(0.0)));
        let sky = Color::new(0.2, 0.4, 0.8);
        let scene = Scene::new(sky).with(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, mirror));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut rng = StdRng::seed_from_u64(4);

        let color = evaluate_ray(&scene, &ray, 5, &mut rng);
        assert!((color - sky * 0.5).length() < 1e-6);

        let color = recursively_sample_ray(&scene, &ray, 3, 5, &mut rng);
        assert!((color - sky * 0.5).length() < 1e-6);
    }

    #[test]
    fn test_shaded_pixel_is_finite_and_clamped() {
        let scene = red_sphere_scene()
            .with(Sphere::new(
                Vec3::new(0.0, -101.0, -5.0),
                100.0,
                Surface::colored(Color::splat(0.8)),
            ))
            .with(Sphere::new(
                Vec3::new(2.0, 0.0, -5.0),
                0.0,
                Surface::default(),
            ));
        let mut rng = StdRng::seed_from_u64(17);
        let directions = [Vec3::NEG_Z, Vec3::new(0.1, -0.2, -1.0).normalize()];

        for flags in [
            RenderFlags::empty(),
            RenderFlags::MULTISAMPLE_AA,
            RenderFlags::RECURSIVE_SAMPLES | RenderFlags::MULTISAMPLE_AA,
        ] {
            let props = Properties {
                render_flags: flags,
                ..Default::default()
            };
            let color = shade_pixel(&scene, Vec3::ZERO, &directions, &props, &mut rng);
            assert!(is_finite_vec3(color));
            assert!(color.min_element() >= 0.0 && color.max_element() <= 1.0);
        }
    }

    #[test]
    fn test_encode_decode() {
        let color = Color::new(0.25, 0.5, 0.9);
        let decoded = decode_rgba(encode_rgba(color, 1.0));
        assert!((decoded.truncate() - color).abs().max_element() <= 1.0 / 255.0);
        assert_eq!(decoded.w, 1.0);

        assert_eq!(encode_rgba(Color::new(1.0, 0.0, 0.0), 1.0), 0xff00_00ff);
        assert_eq!(encode_rgba(Color::new(2.0, -1.0, 0.0), 0.0), 0x0000_00ff);
    }

    #[test]
    fn test_tone_map() {
        assert_eq!(tone_map(Color::new(0.25, 1.5, -0.5)), Color::new(0.5, 1.0, 0.0));
    }
}
