/// rodio-backed handles
///
/// One output stream per backend, one sink per handle. Asset bytes are kept
/// in memory so a handle can rebuild its source after a stop.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::backend::{AssetSource, AudioBackend};
use super::handle::{AudioHandle, PlayAttempt};
use crate::error::AudioError;

/// Backend playing through the default output device
pub struct RodioBackend {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    assets: Arc<dyn AssetSource>,
}

impl RodioBackend {
    /// Open the default output device
    pub fn try_new(assets: Arc<dyn AssetSource>) -> Result<Self, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Audio output stream opened");

        Ok(Self {
            _stream: stream,
            stream_handle,
            assets,
        })
    }
}

impl AudioBackend for RodioBackend {
    fn assets(&self) -> Arc<dyn AssetSource> {
        Arc::clone(&self.assets)
    }

    fn decode(&self, locator: &str, data: Arc<Vec<u8>>) -> Result<Box<dyn AudioHandle>, AudioError> {
        // Verify the audio can be decoded before handing out a handle
        // Note: rodio's Decoder requires owned data with 'static lifetime
        Decoder::new(Cursor::new((*data).clone())).map_err(|e| AudioError::DecodeFailed {
            locator: locator.to_string(),
            source: Box::new(e),
        })?;

        let handle = RodioHandle::new(locator, self.stream_handle.clone(), data)?;
        tracing::debug!("Created audio handle for {}", locator);
        Ok(Box::new(handle))
    }
}

/// Individual rodio handle
pub struct RodioHandle {
    locator: String,
    stream_handle: OutputStreamHandle,
    sink: Sink,
    audio_data: Arc<Vec<u8>>,
    looping: bool,
    volume: f32,
}

impl RodioHandle {
    fn new(
        locator: &str,
        stream_handle: OutputStreamHandle,
        audio_data: Arc<Vec<u8>>,
    ) -> Result<Self, AudioError> {
        let sink = Self::paused_sink(locator, &stream_handle, 1.0)?;
        Ok(Self {
            locator: locator.to_string(),
            stream_handle,
            sink,
            audio_data,
            looping: false,
            volume: 1.0,
        })
    }

    fn paused_sink(
        locator: &str,
        stream_handle: &OutputStreamHandle,
        volume: f32,
    ) -> Result<Sink, AudioError> {
        let sink = Sink::try_new(stream_handle).map_err(|e| AudioError::PlaybackFailed {
            locator: locator.to_string(),
            source: Box::new(e),
        })?;
        sink.pause();
        sink.set_volume(volume);
        Ok(sink)
    }

    /// Queue a fresh decoder from the preloaded bytes
    fn load_source(&self) -> Result<(), AudioError> {
        let cursor = Cursor::new((*self.audio_data).clone());
        let decode_failed = |e: rodio::decoder::DecoderError| AudioError::DecodeFailed {
            locator: self.locator.clone(),
            source: Box::new(e),
        };

        // Each decoder flavour is a different type, so box behind a trait object
        let source: Box<dyn Source<Item = i16> + Send> = if self.looping {
            Box::new(Decoder::new_looped(cursor).map_err(decode_failed)?)
        } else {
            Box::new(Decoder::new(cursor).map_err(decode_failed)?)
        };

        self.sink.append(source);
        Ok(())
    }

    /// Drop the queued source and start over with an empty sink
    fn reset_sink(&mut self) {
        let was_paused = self.sink.is_paused();
        self.sink.stop();

        match Self::paused_sink(&self.locator, &self.stream_handle, self.volume) {
            Ok(sink) => {
                self.sink = sink;
                if !was_paused {
                    if let Err(e) = self.load_source() {
                        tracing::warn!("Failed to reload {}: {}", self.locator, e);
                    }
                    self.sink.play();
                }
            }
            Err(e) => tracing::warn!("Failed to recreate sink for {}: {}", self.locator, e),
        }
    }
}

impl AudioHandle for RodioHandle {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn set_position(&mut self, position: Duration) {
        if self.sink.empty() {
            // Nothing queued: the next play starts from the beginning anyway
            return;
        }
        if let Err(e) = self.sink.try_seek(position) {
            tracing::debug!("Seek on {} unsupported ({}), rebuilding source", self.locator, e);
            if position.is_zero() {
                self.reset_sink();
            }
        }
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        // Applies the next time the source is rebuilt
        self.looping = looping;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused() || self.sink.empty()
    }

    fn play(&mut self) -> PlayAttempt {
        if self.sink.empty() {
            if let Err(e) = self.load_source() {
                return PlayAttempt::settled(Err(e));
            }
        }
        self.sink.play();
        tracing::debug!("Playing {}", self.locator);
        PlayAttempt::settled(Ok(()))
    }

    fn pause(&mut self) {
        self.sink.pause();
    }
}
