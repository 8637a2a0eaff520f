/// Audio effects module
///
/// Volume/mute state and the stepped fade controller that ramps handles.

pub mod fade;
pub mod volume;

pub use fade::{
    FadeCallback, FadeCompletion, FadeController, FadeDirection, FadeSettings, FadeTicket,
    FADE_DURATION, FADE_STEPS,
};
pub use volume::{clamp_volume, VolumeState, DEFAULT_VOLUME};
