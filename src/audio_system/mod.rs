pub mod backend;
pub mod cues;
pub mod effects;
pub mod handle;
pub mod memory;
pub mod player;
pub mod preview;
pub mod session;
/// Audio system module
///
/// Everything the site plays goes through one [`AudioSession`]:
/// - Looped background music with cancellable fades
/// - Session-wide volume and mute
/// - Sequential click cues and an exclusive transition cue
/// - Exclusive sample previews
///
/// ## Architecture
///
/// ```text
/// AudioSession
///   ├── VolumeState { volume, muted }
///   ├── FadeController            (one job per handle)
///   ├── HandleTable               (owns every handle)
///   │     ├── background music    (looped, lazy)
///   │     ├── click-01 .. click-05 ─┐ SequentialCuePlayer
///   │     ├── enter               ─┘
///   │     └── previews            ── PreviewPlayer
///   └── AudioBackend
///         ├── RodioBackend        (output device)
///         └── MemoryBackend       (silent)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use audio_system::{AudioSession, SessionSettings, RodioBackend, FileAssetSource};
///
/// let backend = RodioBackend::try_new(Arc::new(FileAssetSource::new("public")))?;
/// let mut session = AudioSession::new(Box::new(backend), SessionSettings::default());
///
/// session.start_music();          // fade-in to the stored volume
/// session.play_click()?;          // next cue in the sequence
///
/// // Drive fades and settle play attempts from the event loop
/// session.advance(session.tick_interval());
/// ```
pub mod source;

// Re-export commonly used types
pub use backend::{AssetSource, AudioBackend, FileAssetSource};
pub use cues::{CuePlayerState, CueSettings, SequentialCuePlayer};
pub use effects::{FadeController, FadeDirection, FadeSettings, VolumeState};
pub use handle::{AudioHandle, HandleId, HandleTable, PlayAttempt};
pub use memory::{MemoryBackend, StaticAssets};
pub use player::{RodioBackend, RodioHandle};
pub use preview::PreviewPlayer;
pub use session::{AudioSession, MusicState, SessionSettings};
pub use source::AudioSourceType;
