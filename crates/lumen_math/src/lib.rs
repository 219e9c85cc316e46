// Re-export glam for convenience
pub use glam::*;

mod interval;
mod ray;

pub use interval::Interval;
pub use ray::Ray;

/// Linear RGB color, components nominally in [0, 1].
pub type Color = Vec3;

/// Arithmetic mean of the three color channels.
#[inline]
pub fn luminance_mean(color: Color) -> f32 {
    (color.x + color.y + color.z) / 3.0
}

/// True when every component of `v` is finite (no NaN, no infinity).
#[inline]
pub fn is_finite_vec3(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_mean() {
        assert!((luminance_mean(Color::new(0.3, 0.6, 0.9)) - 0.6).abs() < 1e-6);
        assert_eq!(luminance_mean(Color::ZERO), 0.0);
    }

    #[test]
    fn test_is_finite_vec3() {
        assert!(is_finite_vec3(Vec3::new(1.0, -2.0, 3.0)));
        assert!(!is_finite_vec3(Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_finite_vec3(Vec3::new(0.0, f32::INFINITY, 0.0)));
    }
}
