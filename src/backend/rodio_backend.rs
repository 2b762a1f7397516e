//! rodio-backed platform audio
//!
//! The output stream is not `Send`, so it lives on a dedicated thread for the
//! lifetime of the backend. Only its cloneable handle is shared; each loaded
//! sound gets its own `Sink`.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::{AudioBackend, LoadOptions, ResourceHandle, SharedHandle};
use crate::error::AudioError;

struct OutputThread {
    handle: OutputStreamHandle,
    // Dropping the sender lets the output thread exit and close the stream
    _shutdown: Sender<()>,
}

/// Plays catalog assets from a directory through the default output device
pub struct RodioBackend {
    asset_root: PathBuf,
    output: Mutex<Option<OutputThread>>,
}

impl RodioBackend {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            output: Mutex::new(None),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    fn open_output() -> Result<OutputThread, AudioError> {
        let (ready_tx, ready_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        thread::Builder::new()
            .name("soundscape-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Blocks until the backend is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("Soundscape output stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?
            .map_err(|e| AudioError::StreamInitFailed(e.into()))?;

        Ok(OutputThread {
            handle,
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioBackend for RodioBackend {
    fn configure(&self) -> Result<(), AudioError> {
        let mut output = self.output.lock();
        if output.is_none() {
            *output = Some(Self::open_output()?);
            tracing::info!("Soundscape output stream ready");
        }
        Ok(())
    }

    fn load(&self, asset: &str, options: LoadOptions) -> Result<SharedHandle, AudioError> {
        let stream_handle = self
            .output
            .lock()
            .as_ref()
            .map(|output| output.handle.clone())
            .ok_or(AudioError::NotConfigured)?;

        let path = self.asset_root.join(asset);
        let audio_data = std::fs::read(&path).map_err(|e| AudioError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        // Each transformation returns a different type, so we use dynamic dispatch
        let cursor = Cursor::new(audio_data);
        let source: Box<dyn Source<Item = i16> + Send> = if options.looping {
            Box::new(Decoder::new_looped(cursor).map_err(|e| AudioError::DecodeFailed {
                path: path.display().to_string(),
                source: e.to_string().into(),
            })?)
        } else {
            Box::new(Decoder::new(cursor).map_err(|e| AudioError::DecodeFailed {
                path: path.display().to_string(),
                source: e.to_string().into(),
            })?)
        };

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| AudioError::PlaybackFailed(e.to_string().into()))?;
        sink.pause();
        sink.set_volume(options.initial_gain);
        sink.append(source);

        tracing::debug!(
            "Loaded {} (looping={}, gain={:.3})",
            path.display(),
            options.looping,
            options.initial_gain
        );

        Ok(Arc::new(RodioHandle {
            sink: Mutex::new(Some(sink)),
        }))
    }
}

/// A loaded sound backed by its own sink
pub struct RodioHandle {
    sink: Mutex<Option<Sink>>,
}

impl RodioHandle {
    fn with_sink<T>(&self, f: impl FnOnce(&Sink) -> T) -> Result<T, AudioError> {
        self.sink.lock().as_ref().map(f).ok_or(AudioError::Released)
    }
}

impl ResourceHandle for RodioHandle {
    fn play(&self) -> Result<(), AudioError> {
        self.with_sink(|sink| sink.play())
    }

    fn pause(&self) -> Result<(), AudioError> {
        self.with_sink(|sink| sink.pause())
    }

    fn set_gain(&self, gain: f32) -> Result<(), AudioError> {
        self.with_sink(|sink| sink.set_volume(gain.clamp(0.0, 1.0)))
    }

    fn gain(&self) -> f32 {
        self.with_sink(|sink| sink.volume()).unwrap_or(0.0)
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.with_sink(|sink| sink.stop())
    }

    fn release(&self) -> Result<(), AudioError> {
        let sink = self.sink.lock().take().ok_or(AudioError::Released)?;
        sink.stop();
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.sink.lock().is_none()
    }
}
