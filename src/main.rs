//! Soundscape demo
//!
//! Walks through every screen context, then optionally plays one named sound.
//!
//! ```text
//! soundscape-demo [ASSET_DIR] [SOUND_ID]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use ambient_soundscape::error::AppResult;
use ambient_soundscape::{
    logging, Context, JsonFileStore, PlayOptions, RodioBackend, SoundId, SoundscapeEngine,
};

const LOG_TARGET_STARTUP: &str = "ambient_soundscape::startup";

const DWELL: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    let _log_guard = logging::init_tracing(None, "info");

    let mut args = std::env::args().skip(1);
    let asset_root = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets"));
    let requested = args
        .next()
        .map(|raw| raw.parse::<SoundId>())
        .transpose()
        .context("invalid sound id argument")?;

    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Starting soundscape demo v{} with assets from {}",
        env!("CARGO_PKG_VERSION"),
        asset_root.display()
    );

    let engine = SoundscapeEngine::new(
        Arc::new(RodioBackend::new(asset_root)),
        Arc::new(JsonFileStore::in_config_dir()),
    );
    engine.initialize();

    for context in Context::ALL {
        engine.play_for_context(context).await;
        let info = engine.get_current_sound_info();
        if let Some(definition) = info.definition {
            tracing::info!("{}: {} ({})", context, definition.display_name, definition.category);
        }
        tokio::time::sleep(DWELL).await;
    }

    if let Some(sound) = requested {
        engine.play_sound(sound, PlayOptions::default()).await;
        tokio::time::sleep(DWELL).await;
    }

    engine.shutdown().await;
    Ok(())
}
