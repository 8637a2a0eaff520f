/// Sample previews
///
/// At most one preview sounds at a time. Each sample gets its own handle the
/// first time it is previewed; switching samples pauses and rewinds the
/// previous one.

use std::collections::HashMap;
use std::time::Duration;

use super::backend::AudioBackend;
use super::handle::{HandleId, HandleTable, PlayAttempt};
use crate::error::AudioError;

pub struct PreviewPlayer {
    handles: HashMap<String, HandleId>,
    current: Option<String>,
    attempt: Option<PlayAttempt>,
}

impl PreviewPlayer {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            current: None,
            attempt: None,
        }
    }

    /// Sample currently playing, if any
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Play or pause `sample_id`. Returns the sample playing afterwards.
    pub fn toggle(
        &mut self,
        sample_id: &str,
        locator: &str,
        backend: &dyn AudioBackend,
        handles: &mut HandleTable,
    ) -> Result<Option<String>, AudioError> {
        if self.current.as_deref() == Some(sample_id) {
            if let Some(handle) = self.lookup(sample_id).and_then(|id| handles.get_mut(id)) {
                handle.pause();
            }
            self.current = None;
            self.attempt = None;
            tracing::debug!("Preview {} paused", sample_id);
            return Ok(None);
        }

        self.stop(handles);

        let id = match self.lookup(sample_id) {
            Some(id) => id,
            None => {
                let handle = backend.open(locator)?;
                let id = handles.insert(handle);
                self.handles.insert(sample_id.to_string(), id);
                id
            }
        };

        let Some(handle) = handles.get_mut(id) else {
            self.handles.remove(sample_id);
            return Ok(None);
        };
        self.attempt = Some(handle.play());
        self.current = Some(sample_id.to_string());
        tracing::debug!("Preview {} playing ({})", sample_id, locator);
        Ok(self.current.clone())
    }

    /// Pause and rewind the current preview. Returns the sample that stopped.
    pub fn stop(&mut self, handles: &mut HandleTable) -> Option<String> {
        let sample = self.current.take()?;
        self.attempt = None;
        if let Some(handle) = self.lookup(&sample).and_then(|id| handles.get_mut(id)) {
            handle.stop();
        }
        Some(sample)
    }

    /// Settle the play attempt and notice previews that ended on their own.
    ///
    /// Returns true when the current preview was cleared.
    pub fn poll(&mut self, handles: &mut HandleTable) -> bool {
        let Some(sample) = self.current.clone() else {
            return false;
        };

        if let Some(result) = self.attempt.as_ref().and_then(PlayAttempt::try_settle) {
            self.attempt = None;
            if let Err(e) = result {
                tracing::warn!("Preview {} failed to play: {}", sample, e);
                self.current = None;
                return true;
            }
        }

        let Some(handle) = self.lookup(&sample).and_then(|id| handles.get_mut(id)) else {
            self.current = None;
            return true;
        };

        if self.attempt.is_none() && handle.is_paused() {
            // Ended: next toggle starts over
            handle.set_position(Duration::ZERO);
            self.current = None;
            tracing::debug!("Preview {} ended", sample);
            return true;
        }

        false
    }

    pub fn release(&mut self, handles: &mut HandleTable) {
        self.current = None;
        self.attempt = None;
        for (_, id) in self.handles.drain() {
            if let Some(mut handle) = handles.remove(id) {
                handle.pause();
            }
        }
    }

    fn lookup(&self, sample_id: &str) -> Option<HandleId> {
        self.handles.get(sample_id).copied()
    }
}

impl Default for PreviewPlayer {
    fn default() -> Self {
        Self::new()
    }
}
