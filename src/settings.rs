//! Engine settings persistence
//!
//! Loads, merges and saves the user-level engine configuration. Loading is
//! fail-open: a missing, unreadable or malformed blob yields the defaults so
//! audio never blocks application startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{Context, SoundId};
use crate::error::SettingsError;
use crate::storage::KeyValueStore;

/// Well-known key the settings blob is stored under
pub const SETTINGS_KEY: &str = "ambient_soundscape_settings";

pub const DEFAULT_MASTER_VOLUME: f32 = 0.3;

/// Persisted, user-mutable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub enabled: bool,

    /// Last sound the user (or a context) selected
    #[serde(deserialize_with = "lenient_sound")]
    pub current_sound: Option<SoundId>,

    /// Master volume (0.0-1.0)
    pub master_volume: f32,

    pub fade_enabled: bool,

    pub context_sounds: ContextSounds,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            current_sound: Some(SoundId::CosmicDrift),
            master_volume: DEFAULT_MASTER_VOLUME,
            fade_enabled: true,
            context_sounds: ContextSounds::default(),
        }
    }
}

impl EngineSettings {
    /// Clamp values a hand-edited or older blob may carry out of range
    pub fn sanitize(&mut self) {
        if self.master_volume.is_nan() {
            self.master_volume = DEFAULT_MASTER_VOLUME;
        }
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
    }
}

/// Sound assigned to each context. Each slot falls back to its own default
/// when absent from the persisted blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextSounds {
    #[serde(deserialize_with = "lenient_sound")]
    pub card_draw: Option<SoundId>,
    #[serde(deserialize_with = "lenient_sound")]
    pub reflection: Option<SoundId>,
    #[serde(deserialize_with = "lenient_sound")]
    pub onboarding: Option<SoundId>,
    #[serde(deserialize_with = "lenient_sound")]
    pub compatibility: Option<SoundId>,
    #[serde(deserialize_with = "lenient_sound")]
    pub astrology: Option<SoundId>,
}

impl Default for ContextSounds {
    fn default() -> Self {
        Self {
            card_draw: Some(SoundId::CosmicDrift),
            reflection: Some(SoundId::SingingBowls),
            onboarding: Some(SoundId::StellarWinds),
            compatibility: Some(SoundId::LunarTide),
            astrology: Some(SoundId::NebulaHum),
        }
    }
}

impl ContextSounds {
    pub fn get(&self, context: Context) -> Option<SoundId> {
        match context {
            Context::CardDraw => self.card_draw,
            Context::Reflection => self.reflection,
            Context::Onboarding => self.onboarding,
            Context::Compatibility => self.compatibility,
            Context::Astrology => self.astrology,
        }
    }

    pub fn set(&mut self, context: Context, sound: Option<SoundId>) {
        let slot = match context {
            Context::CardDraw => &mut self.card_draw,
            Context::Reflection => &mut self.reflection,
            Context::Onboarding => &mut self.onboarding,
            Context::Compatibility => &mut self.compatibility,
            Context::Astrology => &mut self.astrology,
        };
        *slot = sound;
    }
}

/// Unknown ids decode to `None` instead of rejecting the whole record
fn lenient_sound<'de, D>(deserializer: D) -> Result<Option<SoundId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => match s.parse::<SoundId>() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Ignoring persisted sound: {}", e);
                None
            }
        },
        Some(other) => {
            tracing::warn!("Ignoring persisted sound of unexpected type: {}", other);
            None
        }
    })
}

/// Partial settings update. Unset fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub current_sound: Option<Option<SoundId>>,
    pub master_volume: Option<f32>,
    pub fade_enabled: Option<bool>,
    pub context_sounds: BTreeMap<Context, Option<SoundId>>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_current_sound(mut self, sound: Option<SoundId>) -> Self {
        self.current_sound = Some(sound);
        self
    }

    pub fn with_master_volume(mut self, volume: f32) -> Self {
        self.master_volume = Some(volume);
        self
    }

    pub fn with_fade_enabled(mut self, fade_enabled: bool) -> Self {
        self.fade_enabled = Some(fade_enabled);
        self
    }

    pub fn with_context_sound(mut self, context: Context, sound: Option<SoundId>) -> Self {
        self.context_sounds.insert(context, sound);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-wise overwrite of `settings`
    pub fn apply_to(&self, settings: &mut EngineSettings) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(sound) = self.current_sound {
            settings.current_sound = sound;
        }
        if let Some(volume) = self.master_volume {
            settings.master_volume = volume;
        }
        if let Some(fade_enabled) = self.fade_enabled {
            settings.fade_enabled = fade_enabled;
        }
        for (context, sound) in &self.context_sounds {
            settings.context_sounds.set(*context, *sound);
        }
        settings.sanitize();
    }
}

/// Loads and saves `EngineSettings` through a key-value store
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, SETTINGS_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted settings. `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<EngineSettings>, SettingsError> {
        let Some(json) = self.store.read(&self.key)? else {
            return Ok(None);
        };

        let mut settings: EngineSettings =
            serde_json::from_str(&json).map_err(|source| SettingsError::Malformed {
                key: self.key.clone(),
                source,
            })?;
        settings.sanitize();
        Ok(Some(settings))
    }

    /// Read the persisted settings, falling back to defaults on any failure
    pub fn load(&self) -> EngineSettings {
        match self.try_load() {
            Ok(Some(settings)) => {
                tracing::info!("Loaded soundscape settings from {}", self.key);
                settings
            }
            Ok(None) => {
                tracing::debug!("No soundscape settings stored, using defaults");
                EngineSettings::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load soundscape settings, using defaults: {}", e);
                EngineSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &EngineSettings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings).map_err(SettingsError::Serialize)?;
        self.store.write(&self.key, &json)
    }

    /// Apply `patch` to `settings`, then persist. The in-memory value is
    /// updated even when the write fails.
    pub fn merge(
        &self,
        settings: &mut EngineSettings,
        patch: &SettingsPatch,
    ) -> Result<(), SettingsError> {
        patch.apply_to(settings);
        self.save(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn memory_store() -> (Arc<MemoryStore>, SettingsStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = SettingsStore::new(memory.clone());
        (memory, store)
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.current_sound, Some(SoundId::CosmicDrift));
        assert_eq!(settings.master_volume, 0.3);
        assert!(settings.fade_enabled);
        assert_eq!(
            settings.context_sounds.get(Context::Reflection),
            Some(SoundId::SingingBowls)
        );
    }

    #[test]
    fn test_load_absent_returns_defaults() {
        let (_, store) = memory_store();
        assert_eq!(store.load(), EngineSettings::default());
    }

    #[test]
    fn test_load_malformed_returns_defaults() {
        let (memory, store) = memory_store();
        memory.insert_raw(SETTINGS_KEY, "{ not json");
        assert!(store.try_load().is_err());
        assert_eq!(store.load(), EngineSettings::default());
    }

    #[test]
    fn test_load_read_failure_returns_defaults() {
        let (memory, store) = memory_store();
        memory.set_fail_reads(true);
        assert_eq!(store.load(), EngineSettings::default());
    }

    #[test]
    fn test_missing_fields_fall_back_individually() {
        let (memory, store) = memory_store();
        memory.insert_raw(
            SETTINGS_KEY,
            r#"{ "masterVolume": 0.8, "contextSounds": { "astrology": "ocean-waves" } }"#,
        );

        let settings = store.load();
        assert_eq!(settings.master_volume, 0.8);
        assert!(settings.enabled);
        assert_eq!(settings.current_sound, Some(SoundId::CosmicDrift));
        assert_eq!(
            settings.context_sounds.get(Context::Astrology),
            Some(SoundId::OceanWaves)
        );
        assert_eq!(
            settings.context_sounds.get(Context::CardDraw),
            Some(SoundId::CosmicDrift)
        );
    }

    #[test]
    fn test_unknown_sound_and_out_of_range_volume() {
        let (memory, store) = memory_store();
        memory.insert_raw(
            SETTINGS_KEY,
            r#"{ "currentSound": "whale-song", "masterVolume": 4.2, "fadeEnabled": false }"#,
        );

        let settings = store.load();
        assert_eq!(settings.current_sound, None);
        assert_eq!(settings.master_volume, 1.0);
        assert!(!settings.fade_enabled);
    }

    #[test]
    fn test_persisted_shape() {
        let (memory, store) = memory_store();
        store.save(&EngineSettings::default()).unwrap();

        let raw = memory.raw(SETTINGS_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["currentSound"], "cosmic-drift");
        assert_eq!(value["fadeEnabled"], true);
        assert_eq!(value["contextSounds"]["cardDraw"], "cosmic-drift");
    }

    #[test]
    fn test_merge_persists_and_clamps() {
        let (_, store) = memory_store();
        let mut settings = store.load();

        let patch = SettingsPatch::new()
            .with_master_volume(1.7)
            .with_context_sound(Context::Onboarding, None);
        store.merge(&mut settings, &patch).unwrap();

        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.context_sounds.get(Context::Onboarding), None);
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_merge_keeps_memory_when_write_fails() {
        let (memory, store) = memory_store();
        let mut settings = store.load();
        memory.set_fail_writes(true);

        let result = store.merge(&mut settings, &SettingsPatch::new().with_enabled(false));
        assert!(result.is_err());
        assert!(!settings.enabled);
    }

    #[test]
    fn test_empty_patch() {
        assert!(SettingsPatch::new().is_empty());
        assert!(!SettingsPatch::new().with_fade_enabled(false).is_empty());
    }
}
