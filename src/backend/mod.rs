//! Platform audio subsystem seam
//!
//! The engine never touches an output device directly. A backend loads an
//! asset into a paused, looping resource handle; the handle exposes gain,
//! transport and release.
//!
//! ```text
//! AudioBackend ──load()──► ResourceHandle (paused, gain preset)
//!                              ├── play / pause / stop
//!                              ├── set_gain / gain
//!                              └── release
//! ```

pub mod mock;
pub mod rodio_backend;

use std::sync::Arc;

use crate::error::AudioError;

pub use mock::{MockBackend, MockEvent, MockHandle};
pub use rodio_backend::{RodioBackend, RodioHandle};

/// How a resource should be prepared by `AudioBackend::load`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Loop the asset indefinitely
    pub looping: bool,

    /// Gain applied before the first audible frame (0.0-1.0)
    pub initial_gain: f32,
}

impl LoadOptions {
    /// Looping resource with the given starting gain
    pub fn looped(initial_gain: f32) -> Self {
        Self {
            looping: true,
            initial_gain: initial_gain.clamp(0.0, 1.0),
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::looped(1.0)
    }
}

/// Platform audio subsystem
pub trait AudioBackend: Send + Sync + 'static {
    /// Prepare the output for background, looping playback. Idempotent.
    fn configure(&self) -> Result<(), AudioError>;

    /// Load and decode `asset` into a handle that is not yet playing.
    /// May block on I/O and decoding.
    fn load(&self, asset: &str, options: LoadOptions) -> Result<SharedHandle, AudioError>;
}

/// One live, loaded sound
pub trait ResourceHandle: Send + Sync {
    fn play(&self) -> Result<(), AudioError>;

    fn pause(&self) -> Result<(), AudioError>;

    /// Set instantaneous gain (0.0-1.0)
    fn set_gain(&self, gain: f32) -> Result<(), AudioError>;

    /// Gain currently applied to the output
    fn gain(&self) -> f32;

    fn stop(&self) -> Result<(), AudioError>;

    /// Free the underlying resource. Every later call fails with `Released`.
    fn release(&self) -> Result<(), AudioError>;

    fn is_released(&self) -> bool;
}

pub type SharedHandle = Arc<dyn ResourceHandle>;
