//! Screen-contextual ambient soundscape engine
//!
//! Plays one looping ambient track at a time, chosen explicitly or by the
//! screen the user is on, crossfades between tracks, and remembers the
//! user's preferences across sessions. Missing or broken audio assets never
//! surface as errors: the engine keeps its logical state and stays silent.
//!
//! ## Architecture
//!
//! ```text
//! SoundscapeEngine (controller)
//!   ├── SettingsStore ──► KeyValueStore (JSON blob)
//!   ├── ResourceResolver ──► AudioBackend ──► ResourceHandle
//!   ├── FadeOperation (stepped, cancellable gain ramps)
//!   └── PlaybackStateMachine (Idle / Starting / Playing / Stopping)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ambient_soundscape::{Context, JsonFileStore, RodioBackend, SoundscapeEngine};
//!
//! let engine = SoundscapeEngine::new(
//!     Arc::new(RodioBackend::new("assets")),
//!     Arc::new(JsonFileStore::in_config_dir()),
//! );
//! engine.initialize();
//!
//! // Entering a screen picks its sound and crossfades to it
//! engine.play_for_context(Context::Reflection).await;
//! engine.set_volume(0.6).await;
//! ```

pub mod backend;
pub mod catalog;
pub mod controller;
pub mod error;
pub mod fade;
pub mod logging;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod storage;

// Re-export commonly used types
pub use backend::{AudioBackend, LoadOptions, MockBackend, ResourceHandle, RodioBackend};
pub use catalog::{Context, SoundCategory, SoundDefinition, SoundId};
pub use controller::{CurrentSoundInfo, PlayOptions, SoundscapeEngine, StopOptions};
pub use error::{AudioError, SettingsError};
pub use settings::{ContextSounds, EngineSettings, SettingsPatch, SettingsStore};
pub use state::PlaybackState;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
