/// Audio source types
///
/// Categories of sound the session plays, used for logging and exclusivity.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSourceType {
    /// Looped ambient track
    BackgroundMusic,

    /// Splash "enter" cue
    Transition,

    /// Sequential click feedback
    Click,

    /// Sample preview inside a pack modal
    Preview,
}

impl fmt::Display for AudioSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSourceType::BackgroundMusic => write!(f, "Background Music"),
            AudioSourceType::Transition => write!(f, "Transition"),
            AudioSourceType::Click => write!(f, "Click"),
            AudioSourceType::Preview => write!(f, "Preview"),
        }
    }
}

impl AudioSourceType {
    /// Check if this source silences the one-shot cues when it starts
    pub fn is_exclusive(&self) -> bool {
        match self {
            AudioSourceType::BackgroundMusic => false, // Music is ducked by fades instead
            AudioSourceType::Click => false,
            AudioSourceType::Transition => true,
            AudioSourceType::Preview => true,
        }
    }
}
