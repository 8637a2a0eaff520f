/// Silent in-memory backend
///
/// Used for headless sessions (no output device) and by the test-suite.
/// Handle state lives behind a shared lock so it can be inspected through a
/// [`HandleProbe`] after the session has taken ownership of the handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::backend::{AssetSource, AudioBackend};
use super::handle::{AudioHandle, PlayAttempt, PlaySettler};
use crate::error::AudioError;

/// How a memory handle answers `play()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayPolicy {
    /// Playback starts, attempt settles Ok
    #[default]
    Accept,
    /// Playback refused, like a browser blocking autoplay
    Reject,
    /// Attempt stays pending until settled through the probe
    Defer,
}

#[derive(Debug)]
struct MemoryState {
    locator: String,
    volume: f32,
    position: Duration,
    looping: bool,
    paused: bool,
    play_calls: usize,
    volume_writes: usize,
    policy: PlayPolicy,
    pending: Vec<PlaySettler>,
}

/// Handle that tracks playback state without producing sound
pub struct MemoryHandle {
    locator: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    pub fn new(locator: &str) -> Self {
        Self::with_policy(locator, PlayPolicy::Accept)
    }

    pub fn with_policy(locator: &str, policy: PlayPolicy) -> Self {
        Self {
            locator: locator.to_string(),
            state: Arc::new(Mutex::new(MemoryState {
                locator: locator.to_string(),
                volume: 1.0,
                position: Duration::ZERO,
                looping: false,
                paused: true,
                play_calls: 0,
                volume_writes: 0,
                policy,
                pending: Vec::new(),
            })),
        }
    }

    pub fn probe(&self) -> HandleProbe {
        HandleProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl AudioHandle for MemoryHandle {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = self.state.lock();
        state.volume = volume.clamp(0.0, 1.0);
        state.volume_writes += 1;
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }

    fn set_position(&mut self, position: Duration) {
        self.state.lock().position = position;
    }

    fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn play(&mut self) -> PlayAttempt {
        let mut state = self.state.lock();
        state.play_calls += 1;

        match state.policy {
            PlayPolicy::Accept => {
                state.paused = false;
                PlayAttempt::settled(Ok(()))
            }
            PlayPolicy::Reject => PlayAttempt::settled(Err(AudioError::PlaybackRejected {
                locator: state.locator.clone(),
            })),
            PlayPolicy::Defer => {
                state.paused = false;
                let (settler, attempt) = PlayAttempt::pending();
                state.pending.push(settler);
                attempt
            }
        }
    }

    fn pause(&mut self) {
        self.state.lock().paused = true;
    }
}

/// Read/poke access to a memory handle owned elsewhere
#[derive(Clone)]
pub struct HandleProbe {
    state: Arc<Mutex<MemoryState>>,
}

impl HandleProbe {
    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn position(&self) -> Duration {
        self.state.lock().position
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn volume_writes(&self) -> usize {
        self.state.lock().volume_writes
    }

    pub fn reset_volume_writes(&self) {
        self.state.lock().volume_writes = 0;
    }

    pub fn set_policy(&self, policy: PlayPolicy) {
        self.state.lock().policy = policy;
    }

    /// Simulate playback progress
    pub fn seek(&self, position: Duration) {
        self.state.lock().position = position;
    }

    /// Simulate the clip reaching its end
    pub fn finish(&self) {
        self.state.lock().paused = true;
    }

    /// Resolve every deferred play attempt
    pub fn settle_pending(&self, ok: bool) -> usize {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        let count = pending.len();
        if !ok {
            state.paused = true;
        }
        let locator = state.locator.clone();
        drop(state);

        for settler in pending {
            if ok {
                settler.settle(Ok(()));
            } else {
                settler.settle(Err(AudioError::PlaybackRejected {
                    locator: locator.clone(),
                }));
            }
        }
        count
    }
}

/// Backend producing [`MemoryHandle`]s
pub struct MemoryBackend {
    assets: Arc<dyn AssetSource>,
    probes: Mutex<HashMap<String, Vec<HandleProbe>>>,
    policies: Mutex<HashMap<String, PlayPolicy>>,
}

impl MemoryBackend {
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        Self {
            assets,
            probes: Mutex::new(HashMap::new()),
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Probe of the most recently created handle for a locator
    pub fn probe(&self, locator: &str) -> Option<HandleProbe> {
        self.probes
            .lock()
            .get(locator)
            .and_then(|probes| probes.last().cloned())
    }

    /// Number of handles created for a locator
    pub fn created_count(&self, locator: &str) -> usize {
        self.probes.lock().get(locator).map(Vec::len).unwrap_or(0)
    }

    /// Set the play policy for existing and future handles of a locator
    pub fn set_policy(&self, locator: &str, policy: PlayPolicy) {
        self.policies.lock().insert(locator.to_string(), policy);
        if let Some(probes) = self.probes.lock().get(locator) {
            for probe in probes {
                probe.set_policy(policy);
            }
        }
    }
}

impl AudioBackend for MemoryBackend {
    fn assets(&self) -> Arc<dyn AssetSource> {
        Arc::clone(&self.assets)
    }

    fn decode(&self, locator: &str, data: Arc<Vec<u8>>) -> Result<Box<dyn AudioHandle>, AudioError> {
        if data.is_empty() {
            return Err(AudioError::DecodeFailed {
                locator: locator.to_string(),
                source: "empty audio data".into(),
            });
        }

        let policy = self.policies.lock().get(locator).copied().unwrap_or_default();
        let handle = MemoryHandle::with_policy(locator, policy);
        self.probes
            .lock()
            .entry(locator.to_string())
            .or_default()
            .push(handle.probe());

        Ok(Box::new(handle))
    }
}

/// Shared probes, so tests can keep inspecting after the backend moves into a session
impl AudioBackend for Arc<MemoryBackend> {
    fn assets(&self) -> Arc<dyn AssetSource> {
        self.as_ref().assets()
    }

    fn decode(&self, locator: &str, data: Arc<Vec<u8>>) -> Result<Box<dyn AudioHandle>, AudioError> {
        self.as_ref().decode(locator, data)
    }
}

#[derive(Debug, Clone)]
enum StaticAsset {
    Bytes(Vec<u8>),
    Delayed(Vec<u8>, Duration),
    Failure,
}

/// In-memory asset table
#[derive(Debug, Clone, Default)]
pub struct StaticAssets {
    assets: HashMap<String, StaticAsset>,
}

impl StaticAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(locator.to_string(), StaticAsset::Bytes(bytes));
        self
    }

    /// Asset that only arrives after `delay`
    pub fn with_delayed(mut self, locator: &str, bytes: Vec<u8>, delay: Duration) -> Self {
        self.assets
            .insert(locator.to_string(), StaticAsset::Delayed(bytes, delay));
        self
    }

    pub fn with_failure(mut self, locator: &str) -> Self {
        self.assets.insert(locator.to_string(), StaticAsset::Failure);
        self
    }
}

impl AssetSource for StaticAssets {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AudioError> {
        match self.assets.get(locator) {
            Some(StaticAsset::Bytes(bytes)) => Ok(bytes.clone()),
            Some(StaticAsset::Delayed(bytes, delay)) => {
                std::thread::sleep(*delay);
                Ok(bytes.clone())
            }
            Some(StaticAsset::Failure) => Err(AudioError::LoadFailed {
                locator: locator.to_string(),
                source: "asset marked as failing".into(),
            }),
            None => Err(AudioError::LoadFailed {
                locator: locator.to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such asset",
                )),
            }),
        }
    }
}
