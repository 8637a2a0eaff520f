/// Playable audio handles
///
/// A handle is the only thing the session knows about a sound: a locator,
/// a mutable position and volume, a loop flag and a paused/playing status.

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::error::AudioError;

/// Identifier of a handle stored in a [`HandleTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u32);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback primitives the session drives
pub trait AudioHandle {
    /// Locator the handle was created from
    fn locator(&self) -> &str;

    /// Current volume (0.0-1.0)
    fn volume(&self) -> f32;

    /// Set volume, clamped to 0.0-1.0
    fn set_volume(&mut self, volume: f32);

    fn position(&self) -> Duration;

    fn set_position(&mut self, position: Duration);

    fn is_looping(&self) -> bool;

    fn set_looping(&mut self, looping: bool);

    /// True when paused or when playback reached the end
    fn is_paused(&self) -> bool;

    /// Begin playback. The outcome settles asynchronously.
    fn play(&mut self) -> PlayAttempt;

    fn pause(&mut self);

    /// Pause and return to the start
    fn stop(&mut self) {
        self.pause();
        self.set_position(Duration::ZERO);
    }
}

/// Pending result of [`AudioHandle::play`]
///
/// Settlement is observed on a later poll, never inside the `play()` call,
/// even when the backend already knows the outcome.
#[derive(Debug)]
pub struct PlayAttempt {
    rx: Receiver<Result<(), AudioError>>,
}

/// Sending half of a pending [`PlayAttempt`]
#[derive(Debug)]
pub struct PlaySettler {
    tx: Sender<Result<(), AudioError>>,
}

impl PlaySettler {
    pub fn settle(self, result: Result<(), AudioError>) {
        // Receiver gone means nobody is waiting any more
        let _ = self.tx.send(result);
    }
}

impl PlayAttempt {
    /// Create an attempt together with the settler that resolves it
    pub fn pending() -> (PlaySettler, Self) {
        let (tx, rx) = bounded(1);
        (PlaySettler { tx }, Self { rx })
    }

    /// Create an attempt whose result is already known
    pub fn settled(result: Result<(), AudioError>) -> Self {
        let (settler, attempt) = Self::pending();
        settler.settle(result);
        attempt
    }

    /// Poll the attempt. `None` while still pending.
    ///
    /// A settler dropped without settling counts as a failed attempt.
    pub fn try_settle(&self) -> Option<Result<(), AudioError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AudioError::PlaybackFailed {
                locator: "<abandoned>".to_string(),
                source: "play attempt dropped before settling".into(),
            })),
        }
    }
}

/// Owner of every handle created during a session
#[derive(Default)]
pub struct HandleTable {
    handles: BTreeMap<HandleId, Box<dyn AudioHandle>>,
    next_id: u32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: Box<dyn AudioHandle>) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: HandleId) -> Option<&dyn AudioHandle> {
        self.handles.get(&id).map(|h| h.as_ref())
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut (dyn AudioHandle + 'static)> {
        self.handles.get_mut(&id).map(|h| h.as_mut())
    }

    pub fn remove(&mut self, id: HandleId) -> Option<Box<dyn AudioHandle>> {
        self.handles.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Pause every handle and drop them all
    pub fn release_all(&mut self) {
        for handle in self.handles.values_mut() {
            handle.pause();
        }
        self.handles.clear();
    }
}
