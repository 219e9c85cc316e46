//! Lumen Renderer - interactive CPU path tracing
//!
//! A brute-force path tracer meant to run continuously behind a UI:
//! frames accumulate into a running mean while the consumer moves the
//! camera, resizes the output or edits the scene from another thread.
//!
//! The consumer usually only touches `Scene`, `Camera`, `Properties` and
//! `RenderLoop`; the lower layers are public for headless and test use.

mod camera;
mod control;
mod error;
mod interactable;
mod material;
mod render_loop;
mod render_stack;
mod renderer;
mod sampling;
mod scene;
mod sphere;
mod texture;
mod triangle;
mod viewport;

pub use camera::{Camera, CameraInput};
pub use control::{Interrupt, RenderControl, RenderState};
pub use error::{RenderError, RenderResult};
pub use interactable::{Hit, Interactable, Surface, TRACE_INTERVAL, T_MAX, T_MIN};
pub use material::{default_material, reflect, refract, Material, PhysicalBase};
pub use render_loop::{FrameStats, RenderLoop};
pub use render_stack::{Frame, FrameStatus, RenderStack};
pub use renderer::{
    decode_rgba, encode_rgba, evaluate_ray, evaluate_ray_albedo, recursively_sample_ray,
    shade_pixel, tone_map, Properties, RenderFlags,
};
pub use sampling::{random_in_unit_sphere, random_unit_vector, row_rng};
pub use scene::{Scene, DEFAULT_SKY};
pub use sphere::Sphere;
pub use texture::{default_texture, ImageTexture, StaticColor, Texture, NEUTRAL_GRAY};
pub use triangle::{Quad, Triangle};
pub use viewport::CameraView;

/// Re-export common math types from lumen_math
pub use lumen_math::{Color, Interval, Ray, Vec2, Vec3};
