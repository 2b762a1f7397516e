//! Instrumented in-memory backend
//!
//! Doesn't produce sound. Records every load, gain write and release so the
//! engine's exclusivity and fade behaviour can be asserted without hardware.
//! Also usable by headless hosts that want the engine wired but silent.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{AudioBackend, LoadOptions, ResourceHandle, SharedHandle};
use crate::error::AudioError;

/// Observable backend activity, in order
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Configured,
    Loaded(String),
    Played(String),
    Paused(String),
    Stopped(String),
    Released(String),
}

#[derive(Default)]
struct Activity {
    events: Vec<MockEvent>,
    live: usize,
    peak_live: usize,
}

/// A mock platform audio subsystem
#[derive(Default)]
pub struct MockBackend {
    activity: Arc<Mutex<Activity>>,
    handles: Mutex<Vec<Arc<MockHandle>>>,
    failing_assets: Mutex<HashSet<String>>,
    fail_configure: AtomicBool,
    fail_transport: AtomicBool,
    load_latency: Mutex<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads of `asset` fail as if the file could not be decoded
    pub fn fail_asset(&self, asset: &str) {
        self.failing_assets.lock().insert(asset.to_string());
    }

    pub fn set_fail_configure(&self, fail: bool) {
        self.fail_configure.store(fail, Ordering::Relaxed);
    }

    /// Handles created after this call fail on play/pause/stop
    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::Relaxed);
    }

    /// Block each load for this long (real time, on the blocking pool)
    pub fn set_load_latency(&self, latency: Duration) {
        *self.load_latency.lock() = latency;
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.activity.lock().events.clone()
    }

    pub fn load_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Handles loaded and not yet released
    pub fn live_count(&self) -> usize {
        self.activity.lock().live
    }

    /// Highest number of simultaneously live handles ever observed
    pub fn peak_live(&self) -> usize {
        self.activity.lock().peak_live
    }

    pub fn handles(&self) -> Vec<Arc<MockHandle>> {
        self.handles.lock().clone()
    }

    pub fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.handles.lock().last().cloned()
    }

    /// Gain writes that reached any handle after it was released
    pub fn writes_after_release(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .map(|handle| handle.writes_after_release())
            .sum()
    }
}

impl AudioBackend for MockBackend {
    fn configure(&self) -> Result<(), AudioError> {
        if self.fail_configure.load(Ordering::Relaxed) {
            return Err(AudioError::StreamInitFailed("no output device".into()));
        }
        self.activity.lock().events.push(MockEvent::Configured);
        Ok(())
    }

    fn load(&self, asset: &str, options: LoadOptions) -> Result<SharedHandle, AudioError> {
        let latency = *self.load_latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        if self.failing_assets.lock().contains(asset) {
            return Err(AudioError::DecodeFailed {
                path: asset.to_string(),
                source: "unsupported format".into(),
            });
        }

        let handle = Arc::new(MockHandle {
            asset: asset.to_string(),
            looping: options.looping,
            gain: Mutex::new(options.initial_gain),
            gain_history: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            released: AtomicBool::new(false),
            writes_after_release: AtomicUsize::new(0),
            fail_transport: self.fail_transport.load(Ordering::Relaxed),
            activity: self.activity.clone(),
        });

        {
            let mut activity = self.activity.lock();
            activity.events.push(MockEvent::Loaded(asset.to_string()));
            activity.live += 1;
            activity.peak_live = activity.peak_live.max(activity.live);
        }
        self.handles.lock().push(handle.clone());

        Ok(handle)
    }
}

/// A mock resource handle
pub struct MockHandle {
    asset: String,
    looping: bool,
    gain: Mutex<f32>,
    gain_history: Mutex<Vec<f32>>,
    playing: AtomicBool,
    released: AtomicBool,
    writes_after_release: AtomicUsize,
    fail_transport: bool,
    activity: Arc<Mutex<Activity>>,
}

impl MockHandle {
    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Every gain written through `set_gain`, in order
    pub fn gain_history(&self) -> Vec<f32> {
        self.gain_history.lock().clone()
    }

    pub fn writes_after_release(&self) -> usize {
        self.writes_after_release.load(Ordering::Relaxed)
    }

    fn record(&self, event: MockEvent) {
        self.activity.lock().events.push(event);
    }

    fn transport(&self, event: MockEvent) -> Result<(), AudioError> {
        if self.is_released() {
            return Err(AudioError::Released);
        }
        if self.fail_transport {
            return Err(AudioError::PlaybackFailed("device lost".into()));
        }
        self.record(event);
        Ok(())
    }
}

impl ResourceHandle for MockHandle {
    fn play(&self) -> Result<(), AudioError> {
        self.transport(MockEvent::Played(self.asset.clone()))?;
        self.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&self) -> Result<(), AudioError> {
        self.transport(MockEvent::Paused(self.asset.clone()))?;
        self.playing.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_gain(&self, gain: f32) -> Result<(), AudioError> {
        if self.is_released() {
            self.writes_after_release.fetch_add(1, Ordering::Relaxed);
            return Err(AudioError::Released);
        }
        let gain = gain.clamp(0.0, 1.0);
        *self.gain.lock() = gain;
        self.gain_history.lock().push(gain);
        Ok(())
    }

    fn gain(&self) -> f32 {
        *self.gain.lock()
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.transport(MockEvent::Stopped(self.asset.clone()))?;
        self.playing.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self) -> Result<(), AudioError> {
        if self.released.swap(true, Ordering::Relaxed) {
            return Err(AudioError::Released);
        }
        self.playing.store(false, Ordering::Relaxed);
        let mut activity = self.activity.lock();
        activity.events.push(MockEvent::Released(self.asset.clone()));
        activity.live = activity.live.saturating_sub(1);
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}
