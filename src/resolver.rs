//! Resource resolution
//!
//! Turns a sound id into a loaded, paused resource handle. A missing asset
//! binding or any load failure resolves to `None`: callers treat that the
//! same as a successful simulation with nothing to play.

use std::sync::Arc;

use crate::backend::{AudioBackend, LoadOptions, SharedHandle};
use crate::catalog::{lookup, SoundId};
use crate::error::AudioError;

pub struct ResourceResolver {
    backend: Arc<dyn AudioBackend>,
}

impl ResourceResolver {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Load the asset bound to `id`. `Ok(None)` when the catalog has no asset.
    pub async fn resolve(
        &self,
        id: SoundId,
        options: LoadOptions,
    ) -> Result<Option<SharedHandle>, AudioError> {
        let Some(asset) = lookup(id).asset else {
            return Ok(None);
        };

        // Decoding blocks, keep it off the scheduler
        let backend = self.backend.clone();
        let handle = tokio::task::spawn_blocking(move || backend.load(asset, options))
            .await
            .map_err(|e| AudioError::LoadFailed {
                path: asset.to_string(),
                source: e.to_string().into(),
            })??;

        Ok(Some(handle))
    }

    /// Looping, paused handle at `initial_gain`, or `None` if there is
    /// nothing playable
    pub async fn acquire(&self, id: SoundId, initial_gain: f32) -> Option<SharedHandle> {
        match self.resolve(id, LoadOptions::looped(initial_gain)).await {
            Ok(Some(handle)) => {
                tracing::debug!(sound = %id, "Acquired audio resource");
                Some(handle)
            }
            Ok(None) => {
                tracing::debug!(sound = %id, "No asset bound");
                None
            }
            Err(e) => {
                tracing::warn!(sound = %id, "Failed to acquire audio resource: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, ResourceHandle};

    fn resolver() -> (Arc<MockBackend>, ResourceResolver) {
        let backend = Arc::new(MockBackend::new());
        let resolver = ResourceResolver::new(backend.clone());
        (backend, resolver)
    }

    #[tokio::test]
    async fn test_acquire_loads_paused_looping_handle() {
        let (backend, resolver) = resolver();
        let handle = resolver.acquire(SoundId::OceanWaves, 0.12).await;

        assert!(handle.is_some());
        let mock = backend.last_handle().unwrap();
        assert_eq!(mock.asset(), "sounds/ocean-waves.mp3");
        assert!(mock.is_looping());
        assert!(!mock.is_playing());
        assert_eq!(handle.unwrap().gain(), 0.12);
    }

    #[tokio::test]
    async fn test_unbound_asset_resolves_to_none() {
        let (backend, resolver) = resolver();
        assert!(resolver
            .resolve(SoundId::TempleBells, LoadOptions::default())
            .await
            .unwrap()
            .is_none());
        assert_eq!(backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_resolves_to_none() {
        let (backend, resolver) = resolver();
        backend.fail_asset("sounds/gentle-rain.mp3");

        assert!(resolver
            .resolve(SoundId::GentleRain, LoadOptions::default())
            .await
            .is_err());
        assert!(resolver.acquire(SoundId::GentleRain, 0.3).await.is_none());
    }
}
