//! Background trace worker and the consumer-facing handle that drives it.
//!
//! The worker renders frames back to back. Every consumer event that touches
//! shared buffers holds an interrupt on the render control while it works,
//! so the frame in flight bails out, releases its locks and the event never
//! waits on a long frame or a paused worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::camera::Camera;
use crate::control::{RenderControl, RenderState};
use crate::error::{RenderError, RenderResult};
use crate::render_stack::{Frame, FrameStatus, RenderStack};
use crate::renderer::{Properties, RenderFlags};
use crate::scene::Scene;

/// How long the idle worker sleeps between checks for work.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Counters kept by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub completed: u64,
    pub cancelled: u64,
    /// Wall time of the last completed frame
    pub last_frame_time: Duration,
}

struct Shared {
    control: RenderControl,
    stack: RenderStack,
    scene: RwLock<Scene>,
    running: AtomicBool,
    stats: Mutex<FrameStats>,
    frame_done: Condvar,
}

/// Handle to a running trace worker.
///
/// Dropping the handle stops the worker and joins it.
pub struct RenderLoop {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl RenderLoop {
    /// Start tracing `scene` from `camera` into a `width` x `height` buffer.
    pub fn spawn(
        scene: Scene,
        camera: &Camera,
        properties: Properties,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        Self::spawn_seeded(scene, camera, properties, width, height, rand::random())
    }

    /// Like `spawn`, with the per-frame seeds derived from `seed`.
    pub fn spawn_seeded(
        scene: Scene,
        camera: &Camera,
        properties: Properties,
        width: u32,
        height: u32,
        seed: u64,
    ) -> RenderResult<Self> {
        let shared = Arc::new(Shared {
            control: RenderControl::new(),
            stack: RenderStack::new(camera, width, height, properties),
            scene: RwLock::new(scene),
            running: AtomicBool::new(true),
            stats: Mutex::new(FrameStats::default()),
            frame_done: Condvar::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("lumen-render".into())
                .spawn(move || run(&shared, seed))
                .map_err(RenderError::Spawn)?
        };

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Pick up a new camera pose; accumulation restarts when it moved.
    pub fn camera_moved(&self, camera: &Camera) -> bool {
        let _interrupt = self.shared.control.interrupt();
        self.shared.stack.camera_moved(camera)
    }

    /// Pick up a field of view or clip range change.
    pub fn lens_changed(&self, camera: &Camera) -> bool {
        let _interrupt = self.shared.control.interrupt();
        self.shared.stack.lens_changed(camera)
    }

    /// Reallocate the buffers for a new output size.
    pub fn resize(&self, camera: &Camera, width: u32, height: u32) -> bool {
        let _interrupt = self.shared.control.interrupt();
        self.shared.stack.resize(camera, width, height)
    }

    pub fn properties(&self) -> Properties {
        self.shared.stack.properties()
    }

    /// Replace the renderer configuration (clamped to the accepted ranges).
    ///
    /// Returns false when nothing changed. The next frame to start uses the
    /// new properties.
    pub fn set_properties(&self, properties: Properties) -> bool {
        let _interrupt = self.shared.control.interrupt();
        self.shared.stack.set_properties(properties)
    }

    /// Edit the scene in place. Accumulation restarts afterwards.
    pub fn edit_scene<R>(&self, edit: impl FnOnce(&mut Scene) -> R) -> R {
        let _interrupt = self.shared.control.interrupt();
        let mut scene = write(&self.shared.scene);
        let result = edit(&mut *scene);
        // Still under the write lock, so no frame sees the edit without the reset
        self.shared.stack.invalidate();
        result
    }

    /// Read-only access to the scene, e.g. for picking.
    pub fn with_scene<R>(&self, view: impl FnOnce(&Scene) -> R) -> R {
        view(&*read(&self.shared.scene))
    }

    pub fn pause(&self) {
        self.shared.control.pause();
    }

    pub fn resume(&self) {
        self.shared.control.resume();
    }

    /// Abandon the frame in flight; the next one starts normally.
    pub fn cancel_frame(&self) {
        self.shared.control.cancel();
    }

    pub fn render_state(&self) -> RenderState {
        self.shared.control.stored_state()
    }

    /// Abandon the frame in flight and restart accumulation.
    pub fn reset_render(&self) {
        let _interrupt = self.shared.control.interrupt();
        self.shared.stack.invalidate();
    }

    /// Restart accumulation from the next frame.
    pub fn reset_accumulation(&self) {
        self.shared.stack.invalidate();
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.shared.stack.dimensions()
    }

    /// The image to present: the last whole frame with `SYNC_FRAME`, the live buffer otherwise.
    pub fn frame(&self) -> Frame {
        if self.properties().render_flags.contains(RenderFlags::SYNC_FRAME) {
            self.shared.stack.display_frame()
        } else {
            self.shared.stack.live_frame()
        }
    }

    pub fn stats(&self) -> FrameStats {
        *lock(&self.shared.stats)
    }

    pub fn completed_frames(&self) -> u64 {
        self.stats().completed
    }

    /// Block until at least `count` frames completed. Returns false on timeout.
    pub fn wait_for_frames(&self, count: u64, timeout: Duration) -> bool {
        let stats = lock(&self.shared.stats);
        let (stats, _) = self
            .shared
            .frame_done
            .wait_timeout_while(stats, timeout, |stats| stats.completed < count)
            .unwrap_or_else(PoisonError::into_inner);
        stats.completed >= count
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) -> RenderResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> RenderResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.control.cancel();
        worker.join().map_err(|_| RenderError::WorkerPanicked)
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("{}", e);
        }
    }
}

fn run(shared: &Shared, seed: u64) {
    log::info!("Render worker started");
    let mut frame_seed = seed;

    while shared.running.load(Ordering::Acquire) {
        if !shared.control.wait_for_clearance(IDLE_WAIT) {
            continue;
        }

        let start = Instant::now();
        let status = {
            let scene = read(&shared.scene);
            shared.stack.render_frame(&scene, &shared.control, frame_seed)
        };
        frame_seed = frame_seed.wrapping_add(1);

        match status {
            FrameStatus::Completed => {
                let elapsed = start.elapsed();
                let mut stats = lock(&shared.stats);
                stats.completed += 1;
                stats.last_frame_time = elapsed;
                shared.frame_done.notify_all();
                log::trace!("Frame {} completed in {:?}", stats.completed, elapsed);
            }
            FrameStatus::Cancelled => {
                shared.control.finish_cancelled_frame();
                lock(&shared.stats).cancelled += 1;
                log::debug!("Frame cancelled after {:?}", start.elapsed());
            }
            FrameStatus::Empty => thread::sleep(IDLE_WAIT),
        }
    }

    log::info!("Render worker stopped");
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
