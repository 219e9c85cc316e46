//! Cached camera matrices and per-pixel ray direction generation.

use lumen_math::{Mat4, Vec2, Vec3, Vec4};
use rand::RngCore;

use crate::camera::Camera;
use crate::sampling::gen_f32;

/// Derived state of a `Camera`: inverse matrices plus the last pixel dimensions.
///
/// Every recompute bumps `generation`, so callers can tell whether an update
/// actually did any work.
#[derive(Debug, Clone)]
pub struct CameraView {
    inverse_view: Mat4,
    inverse_projection: Mat4,
    width: u32,
    height: u32,
    pose: Option<(Vec3, Vec3)>,
    generation: u64,
}

impl CameraView {
    pub fn new() -> Self {
        Self {
            inverse_view: Mat4::IDENTITY,
            inverse_projection: Mat4::IDENTITY,
            width: 0,
            height: 0,
            pose: None,
            generation: 0,
        }
    }

    /// Build a view already matching `camera` at the given size.
    pub fn from_camera(camera: &Camera, width: u32, height: u32) -> Self {
        let mut view = Self::new();
        view.update_view(camera);
        view.update_projection(camera, width, height);
        view
    }

    /// Recompute the inverse view when the camera pose differs from the cached one.
    pub fn update_view(&mut self, camera: &Camera) -> bool {
        let pose = (camera.position, camera.forward);
        if self.pose == Some(pose) {
            return false;
        }

        self.inverse_view = camera.view_matrix().inverse();
        self.pose = Some(pose);
        self.generation += 1;
        true
    }

    /// Recompute the inverse projection for new pixel dimensions.
    ///
    /// Unchanged dimensions are a no-op. `(0, 0)` recomputes with the stored
    /// dimensions, for lens changes that keep the size.
    pub fn update_projection(&mut self, camera: &Camera, width: u32, height: u32) -> bool {
        if (width, height) == (0, 0) {
            if self.width == 0 || self.height == 0 {
                return false;
            }
        } else if (width, height) == (self.width, self.height) {
            return false;
        } else {
            self.width = width;
            self.height = height;
        }

        self.inverse_projection = camera.projection_matrix(self.width, self.height).inverse();
        self.generation += 1;
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of recomputes performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// World-space direction through continuous pixel coordinate `pixel`.
    ///
    /// (0, 0) is the bottom-left corner of the image.
    pub fn direction(&self, pixel: Vec2) -> Vec3 {
        let size = Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32);
        let ndc = pixel / size * 2.0 - Vec2::ONE;

        let target = self.inverse_projection * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let local = (target.truncate() / target.w).normalize_or_zero();
        (self.inverse_view * local.extend(0.0)).truncate()
    }

    /// Fill `out` with `depth` directions per pixel, laid out as `(y * width + x) * depth + k`.
    ///
    /// Sample 0 of every pixel passes through the pixel centre; the rest are
    /// jittered uniformly across the pixel. Pixel coordinates are offset by
    /// +0.5 so a zero jitter lands on the centre, and sub-sample jitter drawn
    /// from [0, 1)² is shifted by -0.5 to cover the same footprint. Returns
    /// false, writing nothing, when the view has no size or `out` is too short.
    pub fn generate_directions(&self, out: &mut [Vec3], depth: usize, rng: &mut dyn RngCore) -> bool {
        let (width, height) = (self.width as usize, self.height as usize);
        let needed = width * height * depth;
        if needed == 0 || out.len() < needed {
            return false;
        }

        for (index, group) in out[..needed].chunks_exact_mut(depth).enumerate() {
            let centre = Vec2::new((index % width) as f32 + 0.5, (index / width) as f32 + 0.5);
            for (k, slot) in group.iter_mut().enumerate() {
                let jitter = if k == 0 {
                    Vec2::ZERO
                } else {
                    Vec2::new(gen_f32(rng), gen_f32(rng)) - Vec2::splat(0.5)
                };
                *slot = self.direction(centre + jitter);
            }
        }

        log::trace!("Generated {} ray directions ({}x{}x{})", needed, width, height, depth);
        true
    }
}

impl Default for CameraView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_update_projection_idempotent() {
        let camera = Camera::default();
        let mut view = CameraView::new();

        assert!(view.update_projection(&camera, 64, 48));
        let generation = view.generation();

        assert!(!view.update_projection(&camera, 64, 48));
        assert_eq!(view.generation(), generation);

        assert!(view.update_projection(&camera, 0, 0));
        assert_eq!(view.generation(), generation + 1);
        assert_eq!((view.width(), view.height()), (64, 48));
    }

    #[test]
    fn test_zero_dimensions_before_any_size() {
        let mut view = CameraView::new();
        assert!(!view.update_projection(&Camera::default(), 0, 0));
        assert_eq!(view.generation(), 0);
    }

    #[test]
    fn test_update_view_memoized() {
        let mut camera = Camera::default();
        let mut view = CameraView::new();

        assert!(view.update_view(&camera));
        assert!(!view.update_view(&camera));

        camera.position = Vec3::new(1.0, 0.0, 0.0);
        assert!(view.update_view(&camera));
    }

    #[test]
    fn test_centre_direction_is_forward() {
        let camera = Camera::default()
            .with_position(Vec3::new(3.0, 1.0, 2.0))
            .looking_at(Vec3::new(3.0, 1.0, -8.0));
        let view = CameraView::from_camera(&camera, 1, 1);

        let dir = view.direction(Vec2::splat(0.5));
        assert!((dir - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_row_zero_is_bottom() {
        let view = CameraView::from_camera(&Camera::default(), 4, 4);
        let bottom = view.direction(Vec2::new(2.0, 0.5));
        let top = view.direction(Vec2::new(2.0, 3.5));
        assert!(bottom.y < 0.0);
        assert!(top.y > 0.0);
    }

    #[test]
    fn test_generate_directions() {
        let view = CameraView::from_camera(&Camera::default(), 3, 2);
        let mut rng = StdRng::seed_from_u64(9);
        let depth = 4;
        let mut out = vec![Vec3::ZERO; 3 * 2 * depth];

        assert!(view.generate_directions(&mut out, depth, &mut rng));
        for dir in &out {
            assert!((dir.length() - 1.0).abs() < 1e-4);
            assert!(dir.z < 0.0);
        }

        // Sample 0 is deterministic
        let (x, y) = (2, 1);
        let pixel = y * 3 + x;
        let expected = view.direction(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
        assert!((out[pixel * depth] - expected).length() < 1e-6);

        let mut short = vec![Vec3::ZERO; 5];
        assert!(!view.generate_directions(&mut short, depth, &mut rng));
    }
}
