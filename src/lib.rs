//! StudioWav audio layer
//!
//! Background music with fades and session-wide volume, sequential click
//! cues, sample previews, and the email-gated pack downloads that sit next
//! to them on the site.

pub mod audio_system;
pub mod catalog;
pub mod config;
pub mod download_gate;
pub mod error;
pub mod messaging;

pub use audio_system::{AudioSession, SessionSettings};
pub use config::AudioConfig;
pub use messaging::{AudioRuntime, Command, Event, SessionHandle};
