/// Session volume and mute state
///
/// Independent of any handle. The background handle's effective volume is
/// always `muted ? 0 : volume` outside of a running fade.

use serde::{Deserialize, Serialize};

/// Music volume used when nothing else was configured
pub const DEFAULT_VOLUME: f32 = 0.3;

/// Clamp to 0.0-1.0, treating NaN as silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    /// Persisted target volume (0.0-1.0)
    volume: f32,
    muted: bool,
}

impl VolumeState {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: clamp_volume(volume),
            muted: false,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Store a clamped volume, returning the stored value
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Flip the mute flag, returning the new value
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Volume the background handle should be at
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Apply the mute gate to an arbitrary level (e.g. a fade step)
    pub fn gate(&self, level: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            level
        }
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}
