//! Free-look camera driven by per-tick input samples.

use lumen_math::{Mat4, Quat, Vec2, Vec3};

/// Translation speed in world units per second.
const MOVE_SPEED: f32 = 5.0;
/// Speed multiplier while the boost key is held.
const BOOST_FACTOR: f32 = 5.0;
/// Radians of rotation per unit of scaled pointer delta.
const ROTATION_SPEED: f32 = 0.3;
/// Scale applied to raw pointer deltas.
const POINTER_SCALE: f32 = 0.002;

/// Snapshot of the input relevant to the camera for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    /// Pointer position in window coordinates
    pub pointer: Vec2,
    /// Look modifier (e.g. right mouse button). Nothing moves without it.
    pub look: bool,
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub up: bool,
    /// Speed boost (e.g. shift)
    pub boost: bool,
}

/// Camera pose and lens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Unit view direction
    pub forward: Vec3,
    /// Vertical field of view in degrees
    pub vertical_fov: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    last_pointer: Vec2,
}

impl Camera {
    /// Create a new camera at the origin looking down -Z.
    pub fn new(vertical_fov: f32, near_clip: f32, far_clip: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            vertical_fov,
            near_clip,
            far_clip,
            last_pointer: Vec2::ZERO,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Aim at `target`. Ignored when `target` coincides with the position.
    pub fn looking_at(mut self, target: Vec3) -> Self {
        let direction = (target - self.position).normalize_or_zero();
        if direction != Vec3::ZERO {
            self.forward = direction;
        }
        self
    }

    /// Camera right axis (forward x world up).
    pub fn right(&self) -> Vec3 {
        self.forward.cross(Vec3::Y).normalize_or_zero()
    }

    /// Apply one tick of input. Returns true when the pose changed.
    pub fn on_update(&mut self, input: &CameraInput, ts: f32) -> bool {
        let delta = (input.pointer - self.last_pointer) * POINTER_SCALE;
        self.last_pointer = input.pointer;

        if !input.look {
            return false;
        }

        let up = Vec3::Y;
        let right = self.right();
        let speed = if input.boost {
            MOVE_SPEED * BOOST_FACTOR
        } else {
            MOVE_SPEED
        };
        let step = speed * ts;
        let mut moved = false;

        if input.forward {
            self.position += self.forward * step;
            moved = true;
        } else if input.backward {
            self.position -= self.forward * step;
            moved = true;
        }

        if input.left {
            self.position -= right * step;
            moved = true;
        } else if input.right {
            self.position += right * step;
            moved = true;
        }

        if input.down {
            self.position -= up * step;
            moved = true;
        } else if input.up {
            self.position += up * step;
            moved = true;
        }

        if delta != Vec2::ZERO {
            let pitch = delta.y * ROTATION_SPEED;
            let yaw = delta.x * ROTATION_SPEED;

            // Straight up or down there is no right axis to pitch around
            let pitch_rotation = if right == Vec3::ZERO {
                Quat::IDENTITY
            } else {
                Quat::from_axis_angle(right, -pitch)
            };
            let rotation = (pitch_rotation * Quat::from_axis_angle(up, -yaw)).normalize();
            self.forward = (rotation * self.forward).normalize();
            moved = true;
        }

        moved
    }

    /// Change the lens. Returns true when any value differs.
    pub fn change_view(&mut self, vertical_fov: f32, near_clip: f32, far_clip: f32) -> bool {
        if (vertical_fov, near_clip, far_clip) == (self.vertical_fov, self.near_clip, self.far_clip)
        {
            return false;
        }

        self.vertical_fov = vertical_fov;
        self.near_clip = near_clip;
        self.far_clip = far_clip;
        true
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, Vec3::Y)
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Mat4::perspective_rh_gl(
            self.vertical_fov.to_radians(),
            aspect,
            self.near_clip,
            self.far_clip,
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(45.0, 0.1, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::default();
        assert_eq!(camera.position, Vec3::ZERO);
        assert_eq!(camera.forward, Vec3::NEG_Z);
        assert_eq!(camera.vertical_fov, 45.0);
        assert!((camera.right() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_no_movement_without_look() {
        let mut camera = Camera::default();
        let input = CameraInput {
            pointer: Vec2::new(100.0, 50.0),
            forward: true,
            ..Default::default()
        };

        assert!(!camera.on_update(&input, 1.0));
        assert_eq!(camera, Camera::default().with_pointer(Vec2::new(100.0, 50.0)));
    }

    #[test]
    fn test_forward_and_boost() {
        let mut camera = Camera::default();
        let mut input = CameraInput {
            look: true,
            forward: true,
            ..Default::default()
        };

        assert!(camera.on_update(&input, 0.5));
        assert!((camera.position - Vec3::new(0.0, 0.0, -2.5)).length() < 1e-5);

        input.boost = true;
        assert!(camera.on_update(&input, 0.5));
        assert!((camera.position - Vec3::new(0.0, 0.0, -15.0)).length() < 1e-4);
    }

    #[test]
    fn test_opposing_keys_are_exclusive() {
        let mut camera = Camera::default();
        let input = CameraInput {
            look: true,
            forward: true,
            backward: true,
            left: true,
            right: true,
            ..Default::default()
        };

        assert!(camera.on_update(&input, 1.0));
        // Forward wins over backward, left over right
        assert!((camera.position - Vec3::new(-5.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn test_pointer_delta_rotates() {
        let mut camera = Camera::default();
        let mut input = CameraInput {
            look: true,
            ..Default::default()
        };
        // First tick only records the pointer
        assert!(!camera.on_update(&input, 0.016));

        input.pointer = Vec2::new(200.0, 0.0);
        assert!(camera.on_update(&input, 0.016));
        assert!((camera.forward.length() - 1.0).abs() < 1e-5);
        // Yaw to the right about world up
        assert!(camera.forward.x > 0.0);
        assert!(camera.forward.y.abs() < 1e-5);
    }

    #[test]
    fn test_change_view() {
        let mut camera = Camera::default();
        assert!(!camera.change_view(45.0, 0.1, 100.0));
        assert!(camera.change_view(60.0, 0.1, 100.0));
        assert_eq!(camera.vertical_fov, 60.0);
    }

    #[test]
    fn test_view_matrix() {
        let camera = Camera::default().with_position(Vec3::new(0.0, 0.0, 5.0));
        let view = camera.view_matrix();
        // View matrix should translate camera to origin
        assert!(view.w_axis.z < 0.0);
    }

    impl Camera {
        fn with_pointer(mut self, pointer: Vec2) -> Self {
            self.last_pointer = pointer;
            self
        }
    }
}
