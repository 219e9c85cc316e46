//! Ray, accumulation and output buffers, and the frame loop over them.
//!
//! Locking: the frame mutex ("resize lock") is always taken before the rays
//! lock ("move lock"), and both before the properties. A frame holds the
//! frame mutex and a read lock on the rays for its whole duration; camera
//! moves take only the rays write lock, resizes and property changes take
//! the frame mutex first. Invalidation is only consumed once a frame holds
//! both, so an event is either fully visible to a frame or waits for it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lumen_math::{Color, Ray, Vec3, Vec4};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::control::RenderControl;
use crate::renderer::{encode_rgba, shade_pixel, tone_map, Properties, RenderFlags};
use crate::sampling::row_rng;
use crate::scene::Scene;
use crate::viewport::CameraView;

/// How a call to `RenderStack::render_frame` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Every pixel was written
    Completed,
    /// The control flag stopped the frame early
    Cancelled,
    /// Nothing to render at zero size
    Empty,
}

/// Packed RGBA8 pixels, row 0 at the bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    /// All-zero (transparent black) frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Bytes in R, G, B, A order with the top row first, as image files expect.
    pub fn to_rgba_bytes_top_down(&self) -> Vec<u8> {
        let width = self.width.max(1) as usize;
        self.pixels
            .chunks(width)
            .rev()
            .flatten()
            .flat_map(|pixel| pixel.to_le_bytes())
            .collect()
    }
}

/// Output pixels written by row tasks while the consumer may be reading.
///
/// Element-wise atomic: a reader may see a mix of two frames, never a torn pixel.
struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<AtomicU32>,
}

impl PixelBuffer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: (0..width as usize * height as usize)
                .map(|_| AtomicU32::new(0))
                .collect(),
        }
    }

    #[inline]
    fn store(&self, index: usize, pixel: u32) {
        if let Some(slot) = self.pixels.get(index) {
            slot.store(pixel, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|p| p.load(Ordering::Relaxed)).collect(),
        }
    }
}

/// Camera view plus one contiguous buffer of ray data.
///
/// Slot 0 holds the ray origin (camera position); slots `1..` hold `depth`
/// directions per pixel.
struct RayBuffer {
    view: CameraView,
    width: u32,
    height: u32,
    depth: usize,
    data: Vec<Vec3>,
}

impl RayBuffer {
    fn new(camera: &Camera, width: u32, height: u32, depth: usize) -> Self {
        let mut buffer = Self {
            view: CameraView::from_camera(camera, width, height),
            width,
            height,
            depth: depth.max(1),
            data: Vec::new(),
        };
        buffer.regenerate(camera.position);
        buffer
    }

    #[inline]
    fn origin(&self) -> Vec3 {
        self.data.first().copied().unwrap_or(Vec3::ZERO)
    }

    #[inline]
    fn pixel_directions(&self, index: usize) -> &[Vec3] {
        let start = 1 + index * self.depth;
        self.data.get(start..start + self.depth).unwrap_or(&[])
    }

    /// Replace the buffer with freshly generated directions.
    fn regenerate(&mut self, origin: Vec3) {
        let count = self.width as usize * self.height as usize * self.depth;
        let mut data = vec![Vec3::ZERO; count + 1];
        data[0] = origin;
        if count > 0 {
            self.view
                .generate_directions(&mut data[1..], self.depth, &mut rand::thread_rng());
        }
        self.data = data;

        log::debug!(
            "Regenerated ray directions: {}x{}x{}",
            self.width,
            self.height,
            self.depth
        );
    }
}

/// Running per-pixel sums: xyz = color sum, w = sample count.
struct FrameBuffers {
    width: u32,
    height: u32,
    accumulation: Vec<Vec4>,
    /// Index of the next frame in the running mean, starting at 1
    accumulated_frames: u32,
}

impl FrameBuffers {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            accumulation: vec![Vec4::ZERO; width as usize * height as usize],
            accumulated_frames: 1,
        }
    }
}

/// All buffers behind one renderer, shared between the worker and the consumer.
pub struct RenderStack {
    rays: RwLock<RayBuffer>,
    frame: Mutex<FrameBuffers>,
    properties: RwLock<Properties>,
    output: RwLock<Arc<PixelBuffer>>,
    display: Mutex<Frame>,
    invalidated: AtomicBool,
}

impl RenderStack {
    pub fn new(camera: &Camera, width: u32, height: u32, properties: Properties) -> Self {
        let properties = properties.clamped();
        Self {
            rays: RwLock::new(RayBuffer::new(camera, width, height, properties.ray_depth())),
            frame: Mutex::new(FrameBuffers::new(width, height)),
            properties: RwLock::new(properties),
            output: RwLock::new(Arc::new(PixelBuffer::new(width, height))),
            display: Mutex::new(Frame::blank(width, height)),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Current output dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        let output = read(&self.output);
        (output.width, output.height)
    }

    pub fn ray_depth(&self) -> usize {
        read(&self.rays).depth
    }

    pub fn properties(&self) -> Properties {
        *read(&self.properties)
    }

    /// Replace the renderer configuration, clamped to the accepted ranges.
    ///
    /// Waits for the frame in flight. Returns false when nothing changed;
    /// otherwise the ray depth follows the new properties and the running
    /// mean restarts.
    pub fn set_properties(&self, properties: Properties) -> bool {
        let properties = properties.clamped();
        let _frame = lock(&self.frame);
        {
            let mut current = write(&self.properties);
            if *current == properties {
                return false;
            }
            *current = properties;
        }

        self.set_ray_depth(properties.ray_depth());
        self.invalidate();
        true
    }

    /// Restart the running mean at the next frame.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    /// Pick up a new camera pose. Returns false when the pose is unchanged.
    pub fn camera_moved(&self, camera: &Camera) -> bool {
        let mut rays = write(&self.rays);
        if !rays.view.update_view(camera) {
            return false;
        }

        rays.regenerate(camera.position);
        self.invalidate();
        true
    }

    /// Pick up a new field of view or clip range at the current size.
    pub fn lens_changed(&self, camera: &Camera) -> bool {
        let mut rays = write(&self.rays);
        if !rays.view.update_projection(camera, 0, 0) {
            return false;
        }

        rays.regenerate(camera.position);
        self.invalidate();
        true
    }

    /// Reallocate every buffer for a new size. Returns false when the size is unchanged.
    pub fn resize(&self, camera: &Camera, width: u32, height: u32) -> bool {
        let mut frame = lock(&self.frame);
        let mut rays = write(&self.rays);
        if (frame.width, frame.height) == (width, height) {
            return false;
        }

        rays.view.update_view(camera);
        if width > 0 && height > 0 {
            rays.view.update_projection(camera, width, height);
        }
        rays.width = width;
        rays.height = height;
        rays.regenerate(camera.position);

        *frame = FrameBuffers::new(width, height);
        *write(&self.output) = Arc::new(PixelBuffer::new(width, height));
        *lock(&self.display) = Frame::blank(width, height);
        self.invalidated.store(false, Ordering::Release);

        log::debug!("Resized render buffers to {}x{}", width, height);
        true
    }

    /// Change the number of directions per pixel. Returns false when unchanged.
    fn set_ray_depth(&self, depth: usize) -> bool {
        let depth = depth.max(1);
        let mut rays = write(&self.rays);
        if rays.depth == depth {
            return false;
        }

        rays.depth = depth;
        let origin = rays.origin();
        rays.regenerate(origin);
        self.invalidate();
        true
    }

    /// Trace one frame with the current properties into the accumulation
    /// and output buffers.
    ///
    /// Each row draws from `row_rng(frame_seed, row)`, so a frame is
    /// reproducible from its seed whether or not rows run in parallel.
    pub fn render_frame(
        &self,
        scene: &Scene,
        control: &RenderControl,
        frame_seed: u64,
    ) -> FrameStatus {
        let mut frame = lock(&self.frame);
        let rays = read(&self.rays);
        if self.invalidated.swap(false, Ordering::AcqRel) {
            frame.accumulated_frames = 1;
        }
        let properties = *read(&self.properties);

        let output = Arc::clone(&*read(&self.output));
        let width = frame.width as usize;
        if width == 0 || frame.height == 0 {
            return FrameStatus::Empty;
        }

        let flags = properties.render_flags;
        let accumulate = properties.accumulates();
        let frame_index = frame.accumulated_frames;
        let origin = rays.origin();

        let render_row = |(y, row): (usize, &mut [Vec4])| -> bool {
            let mut rng = row_rng(frame_seed, y as u32);
            for (x, sum) in row.iter_mut().enumerate() {
                if !control.checkpoint() {
                    return false;
                }

                let index = y * width + x;
                let mut color =
                    shade_pixel(scene, origin, rays.pixel_directions(index), &properties, &mut rng);
                if accumulate {
                    let sample = color.extend(1.0);
                    *sum = if frame_index <= 1 { sample } else { *sum + sample };
                    color = sum.truncate() / sum.w;
                }
                output.store(index, encode_rgba(tone_map(color), 1.0));
            }
            true
        };

        let completed = if flags.contains(RenderFlags::PARALLELIZE) {
            frame
                .accumulation
                .par_chunks_mut(width)
                .enumerate()
                .all(&render_row)
        } else {
            frame.accumulation.chunks_mut(width).enumerate().all(&render_row)
        };
        drop(rays);

        if !completed {
            frame.accumulated_frames = 1;
            return FrameStatus::Cancelled;
        }

        frame.accumulated_frames = if accumulate { frame_index + 1 } else { 1 };
        if flags.contains(RenderFlags::SYNC_FRAME) {
            *lock(&self.display) = output.snapshot();
        }
        FrameStatus::Completed
    }

    /// Frames folded into the running mean so far.
    pub fn accumulated_frames(&self) -> u32 {
        lock(&self.frame).accumulated_frames - 1
    }

    /// Running-mean color of one pixel before tone mapping.
    pub fn accumulated_color(&self, x: u32, y: u32) -> Option<Color> {
        let frame = lock(&self.frame);
        if x >= frame.width || y >= frame.height {
            return None;
        }
        let sum = frame.accumulation[(y * frame.width + x) as usize];
        (sum.w > 0.0).then(|| sum.truncate() / sum.w)
    }

    /// Primary (centre) ray of one pixel.
    pub fn primary_ray(&self, x: u32, y: u32) -> Option<Ray> {
        let rays = read(&self.rays);
        if x >= rays.width || y >= rays.height {
            return None;
        }
        let index = (y * rays.width + x) as usize;
        let direction = rays.pixel_directions(index).first().copied()?;
        Some(Ray::new(rays.origin(), direction))
    }

    /// Copy of the output as it is right now, possibly mid-frame.
    pub fn live_frame(&self) -> Frame {
        read(&self.output).snapshot()
    }

    /// Copy of the last frame published with `SYNC_FRAME`.
    pub fn display_frame(&self) -> Frame {
        lock(&self.display).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
