//! Tri-state render control shared between the trace worker and its consumer.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Upper bound on a single wait, so a missed notification costs at most this much.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderState {
    /// Trace normally
    Render = 0,
    /// Hold position without discarding work
    Pause = 1,
    /// Abandon the frame in flight
    Cancel = 2,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderState::Pause,
            2 => RenderState::Cancel,
            _ => RenderState::Render,
        }
    }
}

/// Control flag checked by every row task once per pixel.
///
/// Besides the state set by the consumer, any number of interrupts may be
/// outstanding: while one is held the worker sees `Cancel`, whatever the
/// stored state. Buffer mutations hold an interrupt so they never wait on a
/// paused worker.
#[derive(Debug)]
pub struct RenderControl {
    state: AtomicU8,
    interrupts: AtomicUsize,
    gate: Mutex<()>,
    wake: Condvar,
}

impl RenderControl {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RenderState::Render as u8),
            interrupts: AtomicUsize::new(0),
            gate: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    /// State as the worker must act on it.
    pub fn state(&self) -> RenderState {
        if self.interrupts.load(Ordering::Acquire) > 0 {
            return RenderState::Cancel;
        }
        self.stored_state()
    }

    /// State last set by the consumer, ignoring interrupts.
    pub fn stored_state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: RenderState) {
        let _gate = self.gate();
        self.state.store(state as u8, Ordering::Release);
        self.wake.notify_all();
    }

    pub fn pause(&self) {
        self.set_state(RenderState::Pause);
    }

    pub fn resume(&self) {
        self.set_state(RenderState::Render);
    }

    pub fn cancel(&self) {
        self.set_state(RenderState::Cancel);
    }

    /// Called by the worker after a frame ended early: a consumer cancel only
    /// applies to the frame in flight.
    pub fn finish_cancelled_frame(&self) {
        let _gate = self.gate();
        let _ = self.state.compare_exchange(
            RenderState::Cancel as u8,
            RenderState::Render as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.wake.notify_all();
    }

    /// Force the worker out of its frame until the returned guard drops.
    pub fn interrupt(&self) -> Interrupt<'_> {
        let _gate = self.gate();
        self.interrupts.fetch_add(1, Ordering::AcqRel);
        self.wake.notify_all();
        Interrupt { control: self }
    }

    /// Per-pixel check. Blocks while paused; returns false when the frame must be abandoned.
    pub fn checkpoint(&self) -> bool {
        loop {
            match self.state() {
                RenderState::Render => return true,
                RenderState::Cancel => return false,
                RenderState::Pause => self.wait_while(|control| control.state() == RenderState::Pause),
            }
        }
    }

    /// Between frames: block while paused or interrupted, for at most `timeout`.
    ///
    /// Returns true when a frame may start.
    pub fn wait_for_clearance(&self, timeout: Duration) -> bool {
        let blocked = |control: &Self| {
            control.interrupts.load(Ordering::Acquire) > 0
                || control.stored_state() == RenderState::Pause
        };

        let guard = self.gate();
        let _guard = self
            .wake
            .wait_timeout_while(guard, timeout, |_| blocked(self))
            .unwrap_or_else(PoisonError::into_inner);
        !blocked(self)
    }

    /// Wake everything blocked on this control.
    pub fn notify(&self) {
        let _gate = self.gate();
        self.wake.notify_all();
    }

    fn wait_while(&self, condition: impl Fn(&Self) -> bool) {
        let guard = self.gate();
        let _ = self
            .wake
            .wait_timeout_while(guard, POLL_INTERVAL, |_| condition(self))
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RenderControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Outstanding interrupt; see `RenderControl::interrupt`.
#[must_use = "the worker resumes as soon as the interrupt is dropped"]
pub struct Interrupt<'a> {
    control: &'a RenderControl,
}

impl Drop for Interrupt<'_> {
    fn drop(&mut self) {
        let _gate = self.control.gate();
        self.control.interrupts.fetch_sub(1, Ordering::AcqRel);
        self.control.wake.notify_all();
    }
}
