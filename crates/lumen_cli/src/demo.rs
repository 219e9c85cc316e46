//! Built-in scene rendered by the command line driver.

use std::sync::Arc;

use lumen_core::TextureCache;
use lumen_math::{Color, Vec3};
use lumen_renderer::{
    Camera, ImageTexture, PhysicalBase, Quad, Scene, Sphere, StaticColor, Surface, DEFAULT_SKY,
};

/// Ground plane, a few spheres of different materials and an overhead light.
///
/// With `texture` set, the centre sphere is wrapped in that image instead of
/// being plain glass; an unreadable image falls back to neutral gray.
pub fn build_scene(cache: &mut TextureCache, texture: Option<&str>) -> Scene {
    let ground = Surface::colored(Color::new(0.8, 0.8, 0.0));
    let light = Surface::colored(Color::ONE)
        .with_material(Arc::new(PhysicalBase::emissive(4.0)));
    let matte = Surface::colored(Color::new(0.7, 0.3, 0.3));
    let mirror = Surface::colored(Color::new(0.8, 0.8, 0.8))
        .with_material(Arc::new(PhysicalBase::mirror(0.05)));

    let centre = match texture {
        Some(path) => Surface::default()
            .with_texture(Arc::new(ImageTexture::from_file_or_gray(cache, path))),
        None => Surface::new(
            Arc::new(PhysicalBase::glass(1.5)),
            Arc::new(StaticColor::new(Color::ONE)),
        ),
    };

    Scene::new(DEFAULT_SKY)
        .with(Quad::new(
            Vec3::new(-20.0, -0.5, 20.0),
            Vec3::new(20.0, -0.5, 20.0),
            Vec3::new(20.0, -0.5, -20.0),
            Vec3::new(-20.0, -0.5, -20.0),
            ground,
        ))
        .with(Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, centre))
        .with(Sphere::new(Vec3::new(-1.1, 0.0, -1.2), 0.5, matte))
        .with(Sphere::new(Vec3::new(1.1, 0.0, -1.2), 0.5, mirror))
        .with(Quad::new(
            Vec3::new(-1.0, 2.5, 0.0),
            Vec3::new(1.0, 2.5, 0.0),
            Vec3::new(1.0, 2.5, -2.0),
            Vec3::new(-1.0, 2.5, -2.0),
            light,
        ))
}

/// Camera framing `build_scene`.
pub fn default_camera() -> Camera {
    Camera::new(45.0, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 0.6, 3.0))
        .looking_at(Vec3::new(0.0, 0.0, -1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Ray;

    #[test]
    fn test_camera_sees_centre_sphere() {
        let mut cache = TextureCache::new();
        let scene = build_scene(&mut cache, None);
        assert_eq!(scene.len(), 5);

        let camera = default_camera();
        let ray = Ray::new(camera.position, camera.forward);
        assert_eq!(scene.pick(&ray), Some(1));
    }

    #[test]
    fn test_missing_texture_still_builds() {
        let mut cache = TextureCache::new();
        let scene = build_scene(&mut cache, Some("does/not/exist.png"));
        assert_eq!(scene.len(), 5);
    }
}
