//! Stepped gain ramps
//!
//! A fade divides its duration into a fixed number of steps. Each step writes
//! the linearly interpolated gain to the handle and then waits one step
//! interval. The cancel token is checked before every step; a cancelled fade
//! leaves the handle at whatever gain it last reached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::backend::ResourceHandle;

/// Steps per fade
pub const FADE_STEPS: u32 = 20;

/// Fade-in length (100ms per step)
pub const FADE_IN_DURATION: Duration = Duration::from_millis(2000);

/// Fade-out length (75ms per step)
pub const FADE_OUT_DURATION: Duration = Duration::from_millis(1500);

struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation shared between a fade and whoever supersedes it
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake a fade waiting between steps
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_waiters();
        }
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// True when both tokens share the same flag
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// How a ramp ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Every step ran; the handle is at the target gain
    Completed,
    /// The token was cancelled before the ramp finished
    Cancelled,
    /// The handle rejected a gain write
    Aborted,
}

/// An in-flight gain ramp
#[derive(Debug, Clone)]
pub struct FadeOperation {
    direction: FadeDirection,
    from: f32,
    target: f32,
    duration: Duration,
    steps_done: u32,
    total_steps: u32,
}

impl FadeOperation {
    pub fn new(direction: FadeDirection, from: f32, target: f32, duration: Duration) -> Self {
        Self {
            direction,
            from: from.clamp(0.0, 1.0),
            target: target.clamp(0.0, 1.0),
            duration,
            steps_done: 0,
            total_steps: FADE_STEPS,
        }
    }

    /// Ramp from silence up to `target`
    pub fn fade_in(target: f32) -> Self {
        Self::new(FadeDirection::In, 0.0, target, FADE_IN_DURATION)
    }

    /// Ramp from `from` (the handle's gain when the fade starts) down to silence
    pub fn fade_out(from: f32) -> Self {
        Self::new(FadeDirection::Out, from, 0.0, FADE_OUT_DURATION)
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn steps_done(&self) -> u32 {
        self.steps_done
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn step_interval(&self) -> Duration {
        self.duration / self.total_steps
    }

    /// Gain after `step` of `total_steps`. The last step lands exactly on the target.
    pub fn gain_at(&self, step: u32) -> f32 {
        if step >= self.total_steps {
            return self.target;
        }
        let progress = step as f32 / self.total_steps as f32;
        (self.from + (self.target - self.from) * progress).clamp(0.0, 1.0)
    }

    /// Drive the ramp on `handle` until it completes or `cancel` fires
    pub async fn run(&mut self, handle: &dyn ResourceHandle, cancel: &CancelToken) -> FadeOutcome {
        let interval = self.step_interval();

        while self.steps_done < self.total_steps {
            if cancel.is_cancelled() {
                tracing::debug!(
                    "Fade {:?} cancelled at step {}/{}",
                    self.direction,
                    self.steps_done,
                    self.total_steps
                );
                return FadeOutcome::Cancelled;
            }

            self.steps_done += 1;
            let gain = self.gain_at(self.steps_done);
            if let Err(e) = handle.set_gain(gain) {
                tracing::warn!("Fade {:?} stopped, gain write failed: {}", self.direction, e);
                return FadeOutcome::Aborted;
            }

            if self.steps_done < self.total_steps {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        tracing::debug!("Fade {:?} reached {:.3}", self.direction, self.target);
        FadeOutcome::Completed
    }
}

/// Ramp `handle` from `from` to `to` over `duration`
pub async fn ramp_to(
    handle: &dyn ResourceHandle,
    from: f32,
    to: f32,
    duration: Duration,
    cancel: &CancelToken,
) -> FadeOutcome {
    let direction = if to >= from {
        FadeDirection::In
    } else {
        FadeDirection::Out
    };
    FadeOperation::new(direction, from, to, duration)
        .run(handle, cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AudioBackend, LoadOptions, MockBackend};

    #[test]
    fn test_gain_interpolation() {
        let fade = FadeOperation::fade_in(0.4);
        assert_eq!(fade.gain_at(0), 0.0);
        assert!((fade.gain_at(10) - 0.2).abs() < 1e-6);
        assert_eq!(fade.gain_at(FADE_STEPS), 0.4);
        assert_eq!(fade.step_interval(), Duration::from_millis(100));

        let fade = FadeOperation::fade_out(0.3);
        assert_eq!(fade.gain_at(FADE_STEPS), 0.0);
        assert_eq!(fade.step_interval(), Duration::from_millis(75));
    }

    #[test]
    fn test_gains_are_clamped() {
        let fade = FadeOperation::new(FadeDirection::In, -1.0, 3.0, FADE_IN_DURATION);
        assert_eq!(fade.gain_at(0), 0.0);
        assert_eq!(fade.target(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_is_monotonic_and_reaches_target() {
        let backend = MockBackend::new();
        let handle = backend.load("a.mp3", LoadOptions::looped(0.0)).unwrap();

        let mut fade = FadeOperation::fade_in(0.09);
        let outcome = fade.run(handle.as_ref(), &CancelToken::new()).await;

        assert_eq!(outcome, FadeOutcome::Completed);
        assert_eq!(fade.steps_done(), FADE_STEPS);

        let history = backend.last_handle().unwrap().gain_history();
        assert_eq!(history.len(), FADE_STEPS as usize);
        assert!(history.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*history.last().unwrap(), 0.09);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_is_monotonic_and_reaches_zero() {
        let backend = MockBackend::new();
        let handle = backend.load("a.mp3", LoadOptions::looped(0.5)).unwrap();

        let outcome = ramp_to(
            handle.as_ref(),
            handle.gain(),
            0.0,
            FADE_OUT_DURATION,
            &CancelToken::new(),
        )
        .await;

        assert_eq!(outcome, FadeOutcome::Completed);
        let history = backend.last_handle().unwrap().gain_history();
        assert!(history.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(*history.last().unwrap(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_ramp_leaves_gain_in_place() {
        let backend = MockBackend::new();
        let handle = backend.load("a.mp3", LoadOptions::looped(0.0)).unwrap();
        let cancel = CancelToken::new();

        let task = {
            let handle = handle.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                FadeOperation::fade_in(1.0).run(handle.as_ref(), &cancel).await
            })
        };

        tokio::time::sleep(Duration::from_millis(550)).await;
        cancel.cancel();
        assert_eq!(task.await.unwrap(), FadeOutcome::Cancelled);

        let reached = handle.gain();
        assert!(reached > 0.0 && reached < 1.0);
        assert!(backend.last_handle().unwrap().gain_history().len() < FADE_STEPS as usize);

        // Nothing touches the handle after cancellation
        tokio::time::sleep(FADE_IN_DURATION).await;
        assert_eq!(handle.gain(), reached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_writes_nothing() {
        let backend = MockBackend::new();
        let handle = backend.load("a.mp3", LoadOptions::looped(0.3)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = FadeOperation::fade_out(0.3).run(handle.as_ref(), &cancel).await;
        assert_eq!(outcome, FadeOutcome::Cancelled);
        assert!(backend.last_handle().unwrap().gain_history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_handle_aborts_ramp() {
        let backend = MockBackend::new();
        let handle = backend.load("a.mp3", LoadOptions::looped(0.3)).unwrap();
        handle.release().unwrap();

        let outcome = FadeOperation::fade_out(0.3)
            .run(handle.as_ref(), &CancelToken::new())
            .await;
        assert_eq!(outcome, FadeOutcome::Aborted);
    }

    #[test]
    fn test_token_identity() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&CancelToken::new()));

        b.cancel();
        assert!(a.is_cancelled());
    }
}
