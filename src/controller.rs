//! Playback controller
//!
//! Owns the single live playback session and the in-memory settings, and is
//! the only public surface the UI layer talks to. Every failure below this
//! layer arrives as a `Result`; `absorb` turns it into a warning and a no-op,
//! so no operation here ever surfaces an error. The worst user-visible
//! outcome is silence.
//!
//! ## Exclusivity
//!
//! The session sits behind an async mutex that is held for the whole of a
//! play or stop, so a new sound is only acquired after the previous one has
//! been stopped and released. Before queueing on that mutex every play/stop
//! cancels whatever fade is in flight and bumps a generation counter, so a
//! superseded fade-out ends at its next step (or never starts) instead of
//! running to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::backend::{AudioBackend, SharedHandle};
use crate::catalog::{lookup, Context, SoundDefinition, SoundId};
use crate::fade::{CancelToken, FadeOperation, FadeOutcome};
use crate::resolver::ResourceResolver;
use crate::settings::{EngineSettings, SettingsPatch, SettingsStore};
use crate::state::{PlaybackState, PlaybackStateMachine};
use crate::storage::KeyValueStore;

/// Below this a handle is inaudible and gets no fade-out
const SILENT_GAIN: f32 = 1e-4;

/// Options for `SoundscapeEngine::play_sound`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOptions {
    /// Ramp in from silence, and fade out whatever was playing before.
    /// Only honoured while fades are enabled in the settings. Default: true
    pub fade_in: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self { fade_in: true }
    }
}

impl PlayOptions {
    /// Start at full effective gain, stop the previous sound immediately
    pub fn immediate() -> Self {
        Self { fade_in: false }
    }

    pub fn with_fade_in(mut self, fade_in: bool) -> Self {
        self.fade_in = fade_in;
        self
    }
}

/// Options for `SoundscapeEngine::stop_current_sound`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOptions {
    /// Ramp down to silence before stopping. Only honoured while fades are
    /// enabled in the settings. Default: true
    pub fade_out: bool,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self { fade_out: true }
    }
}

impl StopOptions {
    pub fn immediate() -> Self {
        Self { fade_out: false }
    }

    pub fn with_fade_out(mut self, fade_out: bool) -> Self {
        self.fade_out = fade_out;
        self
    }
}

/// Logical current sound, independent of whether anything is audible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentSoundInfo {
    pub sound: Option<SoundId>,
    pub definition: Option<&'static SoundDefinition>,
}

struct FadeTask {
    cancel: CancelToken,
    join: JoinHandle<FadeOutcome>,
}

impl FadeTask {
    fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Cancel and wait until the ramp has stopped writing
    async fn cancel_and_join(self) -> Option<FadeOutcome> {
        self.cancel.cancel();
        absorb("join fade-in", self.join.await)
    }
}

/// The one live resource, plus its fade-in if one is running
struct PlaybackSession {
    sound: SoundId,
    handle: SharedHandle,
    fade_in: Option<FadeTask>,
}

impl PlaybackSession {
    fn is_fading(&self) -> bool {
        self.fade_in.as_ref().is_some_and(FadeTask::is_running)
    }
}

/// Most recent fade, and how many play/stop calls have superseded fades so far
#[derive(Default)]
struct FadeSlot {
    generation: u64,
    active: Option<CancelToken>,
}

#[derive(Default)]
struct SessionSlot {
    machine: PlaybackStateMachine,
    live: Option<PlaybackSession>,
}

/// Screen-contextual ambient soundscape engine
///
/// Construct one per process and hand it to the UI layer.
pub struct SoundscapeEngine {
    backend: Arc<dyn AudioBackend>,
    resolver: ResourceResolver,
    settings_store: SettingsStore,
    settings: RwLock<EngineSettings>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    session: tokio::sync::Mutex<SessionSlot>,
    fades: Mutex<FadeSlot>,
}

impl SoundscapeEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_settings_store(backend, SettingsStore::new(store))
    }

    pub fn with_settings_store(backend: Arc<dyn AudioBackend>, settings_store: SettingsStore) -> Self {
        Self {
            resolver: ResourceResolver::new(backend.clone()),
            backend,
            settings_store,
            settings: RwLock::new(EngineSettings::default()),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            session: tokio::sync::Mutex::new(SessionSlot::default()),
            fades: Mutex::new(FadeSlot::default()),
        }
    }

    /// Load persisted settings and prepare the audio output. Only the first
    /// call does anything.
    pub fn initialize(&self) {
        let _guard = self.init_lock.lock();
        if self.is_initialized() {
            tracing::debug!("Soundscape engine already initialized");
            return;
        }

        *self.settings.write() = self.settings_store.load();
        absorb("configure audio output", self.backend.configure());

        self.initialized.store(true, Ordering::Release);
        tracing::info!("Soundscape engine initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Play `id` as the only sound, replacing whatever was playing.
    ///
    /// Returns `false` only when the engine is disabled or not initialized.
    /// A sound with no playable asset still returns `true` and becomes the
    /// current sound; nothing is audible.
    pub async fn play_sound(&self, id: SoundId, options: PlayOptions) -> bool {
        if !self.is_initialized() {
            tracing::warn!(sound = %id, "play_sound called before initialize");
            return false;
        }
        let enabled = self.settings.read().enabled;
        if !enabled {
            tracing::debug!(sound = %id, "Soundscape disabled, not playing");
            return false;
        }

        let generation = self.supersede_fades();
        let mut slot = self.session.lock().await;
        self.teardown(&mut slot, options.fade_in, generation).await;

        let (master_volume, fade_enabled) = {
            let settings = self.settings.read();
            (settings.master_volume, settings.fade_enabled)
        };
        let fade_in = options.fade_in && fade_enabled;
        let gain = lookup(id).effective_gain(master_volume);

        absorb("begin start", slot.machine.begin_start(id));
        let start_gain = if fade_in { 0.0 } else { gain };
        let Some(handle) = self.resolver.acquire(id, start_gain).await else {
            tracing::info!(sound = %id, "No playable asset, simulating playback");
            slot.machine.force_idle();
            drop(slot);
            self.persist_current_sound(id);
            return true;
        };

        if absorb("start playback", handle.play()).is_none() {
            absorb("release unplayable resource", handle.release());
            slot.machine.force_idle();
            drop(slot);
            self.persist_current_sound(id);
            return true;
        }

        let fade = fade_in.then(|| self.spawn_fade_in(handle.clone(), gain));
        slot.live = Some(PlaybackSession {
            sound: id,
            handle,
            fade_in: fade,
        });
        absorb("mark playing", slot.machine.mark_playing());
        drop(slot);

        tracing::info!(sound = %id, gain, fade_in, "Playing ambient sound");
        self.persist_current_sound(id);
        true
    }

    /// Stop and release the live sound, if any
    pub async fn stop_current_sound(&self, options: StopOptions) {
        let generation = self.supersede_fades();
        let mut slot = self.session.lock().await;
        if slot.live.is_none() {
            tracing::debug!("No ambient sound to stop");
            return;
        }
        self.teardown(&mut slot, options.fade_out, generation).await;
    }

    /// Set and persist the master volume. A live sound picks up the new
    /// effective gain at once, without a ramp.
    pub async fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            tracing::warn!("Ignoring NaN master volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        {
            let mut settings = self.settings.write();
            let patch = SettingsPatch::new().with_master_volume(volume);
            absorb("persist master volume", self.settings_store.merge(&mut settings, &patch));
        }
        self.apply_master_volume(volume).await;
    }

    /// Play the sound assigned to `context`. Does nothing if the context has
    /// no assignment or its sound is already the current one; `play_sound`
    /// persists the new current sound on success.
    pub async fn play_for_context(&self, context: Context) {
        let (mapped, current) = {
            let settings = self.settings.read();
            (settings.context_sounds.get(context), settings.current_sound)
        };

        let Some(sound) = mapped else {
            tracing::debug!(%context, "No sound assigned to context");
            return;
        };
        if current == Some(sound) {
            tracing::debug!(%context, sound = %sound, "Context sound already current");
            return;
        }

        self.play_sound(sound, PlayOptions::default()).await;
    }

    /// Play the persisted current sound, e.g. to restore the last session's
    /// ambience at startup
    pub async fn play_current(&self) -> bool {
        let current = self.settings.read().current_sound;
        match current {
            Some(sound) => self.play_sound(sound, PlayOptions::default()).await,
            None => false,
        }
    }

    pub async fn pause(&self) {
        let slot = self.session.lock().await;
        if let Some(session) = Self::steady_session(&slot) {
            absorb("pause", session.handle.pause());
        }
    }

    pub async fn resume(&self) {
        let slot = self.session.lock().await;
        if let Some(session) = Self::steady_session(&slot) {
            absorb("resume", session.handle.play());
        }
    }

    /// Persisted current sound and its catalog entry
    pub fn get_current_sound_info(&self) -> CurrentSoundInfo {
        let sound = self.settings.read().current_sound;
        CurrentSoundInfo {
            sound,
            definition: sound.map(lookup),
        }
    }

    pub fn get_settings(&self) -> EngineSettings {
        self.settings.read().clone()
    }

    /// Merge and persist `patch`. Disabling stops the live sound; a master
    /// volume change reaches the live sound like `set_volume`.
    pub async fn update_settings(&self, patch: SettingsPatch) {
        if patch.is_empty() {
            return;
        }

        let (before, after) = {
            let mut settings = self.settings.write();
            let before = settings.clone();
            absorb("persist settings", self.settings_store.merge(&mut settings, &patch));
            (before, settings.clone())
        };

        if before.enabled && !after.enabled {
            tracing::info!("Soundscape disabled");
            self.stop_current_sound(StopOptions::default()).await;
        }
        if before.master_volume != after.master_volume {
            self.apply_master_volume(after.master_volume).await;
        }
    }

    /// Reassign the sound used for `context`
    pub async fn set_context_sound(&self, context: Context, sound: Option<SoundId>) {
        self.update_settings(SettingsPatch::new().with_context_sound(context, sound))
            .await;
    }

    pub async fn state(&self) -> PlaybackState {
        self.session.lock().await.machine.state()
    }

    /// True while a resource is live (never on the simulate path)
    pub async fn is_playing(&self) -> bool {
        self.session.lock().await.live.is_some()
    }

    /// Stop without fading and release everything
    pub async fn shutdown(&self) {
        let generation = self.supersede_fades();
        let mut slot = self.session.lock().await;
        self.teardown(&mut slot, false, generation).await;
        tracing::info!("Soundscape engine shut down");
    }

    /// Session in steady `Playing` with no fade running
    fn steady_session(slot: &SessionSlot) -> Option<&PlaybackSession> {
        let session = slot.live.as_ref()?;
        if !slot.machine.state().is_playing() || session.is_fading() {
            tracing::debug!("Ignoring transport change while fading");
            return None;
        }
        Some(session)
    }

    /// Cancel the running fade and return the new generation. The caller
    /// hands the generation to `teardown`.
    fn supersede_fades(&self) -> u64 {
        let mut fades = self.fades.lock();
        fades.generation += 1;
        if let Some(token) = fades.active.take() {
            token.cancel();
        }
        fades.generation
    }

    /// Publish a new fade token. It starts cancelled when another play/stop
    /// has superseded `generation` in the meantime.
    fn register_fade(&self, generation: Option<u64>) -> CancelToken {
        let token = CancelToken::new();
        let mut fades = self.fades.lock();
        if generation.is_some_and(|g| g != fades.generation) {
            token.cancel();
        }
        fades.active = Some(token.clone());
        token
    }

    fn clear_fade(&self, token: &CancelToken) {
        let mut fades = self.fades.lock();
        if fades.active.as_ref().is_some_and(|current| current.same_as(token)) {
            fades.active = None;
        }
    }

    fn spawn_fade_in(&self, handle: SharedHandle, target: f32) -> FadeTask {
        let cancel = self.register_fade(None);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            FadeOperation::fade_in(target)
                .run(handle.as_ref(), &token)
                .await
        });
        FadeTask { cancel, join }
    }

    /// Fade out (if asked and enabled), stop and release the live session.
    /// The fade-in is cancelled and joined first, so nothing writes gain to
    /// the handle once it has been released.
    ///
    /// The fade-out token is published before that join. A play/stop that
    /// arrives while we wait cancels it; one that arrived earlier leaves the
    /// generation moved on, and the token starts out cancelled.
    async fn teardown(&self, slot: &mut SessionSlot, fade_out: bool, generation: u64) {
        let Some(mut session) = slot.live.take() else {
            slot.machine.force_idle();
            return;
        };
        absorb("begin stop", slot.machine.begin_stop());

        let fade_enabled = self.settings.read().fade_enabled;
        let fade_cancel = (fade_out && fade_enabled).then(|| self.register_fade(Some(generation)));

        if let Some(task) = session.fade_in.take() {
            task.cancel_and_join().await;
        }

        if let Some(cancel) = fade_cancel {
            let from = session.handle.gain();
            if from > SILENT_GAIN {
                let outcome = FadeOperation::fade_out(from)
                    .run(session.handle.as_ref(), &cancel)
                    .await;
                tracing::debug!(sound = %session.sound, ?outcome, "Fade-out finished");
            } else {
                tracing::debug!(sound = %session.sound, "Already silent, skipping fade-out");
            }
            self.clear_fade(&cancel);
        }

        absorb("stop", session.handle.stop());
        absorb("release", session.handle.release());
        absorb("mark idle", slot.machine.mark_idle());
        tracing::info!(sound = %session.sound, "Stopped ambient sound");
    }

    async fn apply_master_volume(&self, master_volume: f32) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.live.as_mut() else {
            return;
        };

        // A running fade-in would overwrite the new level on its next step
        if let Some(task) = session.fade_in.take() {
            task.cancel_and_join().await;
        }

        let gain = lookup(session.sound).effective_gain(master_volume);
        absorb("apply volume", session.handle.set_gain(gain));
        tracing::debug!(sound = %session.sound, gain, "Applied master volume");
    }

    fn persist_current_sound(&self, sound: SoundId) {
        let mut settings = self.settings.write();
        if settings.current_sound == Some(sound) {
            return;
        }
        let patch = SettingsPatch::new().with_current_sound(Some(sound));
        absorb("persist current sound", self.settings_store.merge(&mut settings, &patch));
    }
}

/// Failure policy: log and carry on
fn absorb<T, E: std::fmt::Display>(action: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Soundscape {} failed: {}", action, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::storage::MemoryStore;

    fn engine() -> (Arc<MockBackend>, SoundscapeEngine) {
        let backend = Arc::new(MockBackend::new());
        let engine = SoundscapeEngine::new(backend.clone(), Arc::new(MemoryStore::new()));
        (backend, engine)
    }

    #[test]
    fn test_option_defaults() {
        assert!(PlayOptions::default().fade_in);
        assert!(!PlayOptions::immediate().fade_in);
        assert!(StopOptions::default().fade_out);
        assert!(!StopOptions::default().with_fade_out(false).fade_out);
    }

    #[tokio::test]
    async fn test_play_before_initialize_is_rejected() {
        let (backend, engine) = engine();
        assert!(!engine.play_sound(SoundId::OceanWaves, PlayOptions::default()).await);
        assert_eq!(backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (backend, engine) = engine();
        engine.initialize();
        engine.initialize();
        assert!(engine.is_initialized());
        assert_eq!(backend.events(), vec![crate::backend::MockEvent::Configured]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_follows_session() {
        let (_, engine) = engine();
        engine.initialize();
        assert!(engine.state().await.is_idle());

        engine.play_sound(SoundId::GentleRain, PlayOptions::immediate()).await;
        assert_eq!(engine.state().await.sound(), Some(SoundId::GentleRain));
        assert!(engine.state().await.is_playing());

        engine.stop_current_sound(StopOptions::immediate()).await;
        assert!(engine.state().await.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_ignored_while_fading_in() {
        let (backend, engine) = engine();
        engine.initialize();
        engine.play_sound(SoundId::OceanWaves, PlayOptions::default()).await;

        engine.pause().await;
        assert!(backend.last_handle().unwrap().is_playing());

        tokio::time::sleep(crate::fade::FADE_IN_DURATION * 2).await;
        engine.pause().await;
        assert!(!backend.last_handle().unwrap().is_playing());

        engine.resume().await;
        assert!(backend.last_handle().unwrap().is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_degrades_to_simulation() {
        let (backend, engine) = engine();
        engine.initialize();
        backend.set_fail_transport(true);

        assert!(engine.play_sound(SoundId::LunarTide, PlayOptions::immediate()).await);
        assert!(!engine.is_playing().await);
        assert_eq!(backend.live_count(), 0);
        assert_eq!(engine.get_current_sound_info().sound, Some(SoundId::LunarTide));
    }

    #[test]
    fn test_absorb() {
        assert_eq!(absorb::<_, String>("ok", Ok(3)), Some(3));
        assert_eq!(absorb::<u8, _>("fail", Err("boom")), None);
    }
}
