/// Shared audio session
///
/// Single owner of every sound on the page: the looped background track,
/// the click cues, the transition cue and sample previews. Volume and mute
/// live here too, independent of any handle, so every surface that talks to
/// the session sees the same state.
///
/// The session never sleeps and never spawns timers. Time only moves when
/// the owner calls [`AudioSession::advance`].

use std::time::{Duration, Instant};

use super::backend::AudioBackend;
use super::cues::{CuePlayerState, CueSettings, CueSettled, SequentialCuePlayer};
use super::effects::{clamp_volume, FadeCallback, FadeController, FadeDirection, FadeSettings, VolumeState};
use super::handle::{HandleId, HandleTable, PlayAttempt};
use super::preview::PreviewPlayer;
use super::source::AudioSourceType;
use crate::config::AudioConfig;
use crate::error::CueError;
use crate::messaging::events::Event;

/// What the background track is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MusicState {
    Stopped,
    FadingIn,
    Playing,
    FadingOut,
}

impl MusicState {
    pub fn description(&self) -> &'static str {
        match self {
            MusicState::Stopped => "Stopped",
            MusicState::FadingIn => "Fading in",
            MusicState::Playing => "Playing",
            MusicState::FadingOut => "Fading out",
        }
    }

    /// Playing or on its way up
    pub fn is_audible(&self) -> bool {
        matches!(self, MusicState::Playing | MusicState::FadingIn)
    }
}

/// Session construction parameters
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub background_track: String,
    pub initial_volume: f32,
    pub fades: FadeSettings,
    pub click_cues: Vec<String>,
    pub transition_cue: Option<String>,
    pub cues: CueSettings,
    pub splash_exit_delay: Duration,
}

impl From<&AudioConfig> for SessionSettings {
    fn from(config: &AudioConfig) -> Self {
        Self {
            background_track: config.background_track.clone(),
            initial_volume: config.default_volume,
            fades: FadeSettings::new(config.fade_duration(), config.fade_steps),
            click_cues: config.click_cues.clone(),
            transition_cue: config.transition_cue.clone(),
            cues: CueSettings {
                volume: config.cue_volume,
                preload_timeout: config.cue_preload_timeout(),
            },
            splash_exit_delay: config.splash_exit_delay(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&AudioConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MusicSlot {
    Unopened,
    Open(HandleId),
    /// Open failed or the session was torn down
    Unavailable,
}

pub struct AudioSession {
    backend: Box<dyn AudioBackend>,
    settings: SessionSettings,
    handles: HandleTable,
    volume: VolumeState,
    fades: FadeController,
    music: MusicSlot,
    music_attempt: Option<PlayAttempt>,
    cues: SequentialCuePlayer,
    previews: PreviewPlayer,
    /// `Some(was_audible)` while the pack modal is open
    modal: Option<bool>,
    /// Time left before music starts after `enter`
    pending_enter: Option<Duration>,
    events: Vec<Event>,
    last_music_state: MusicState,
    last_cue_state: CuePlayerState,
}

impl AudioSession {
    /// Create the session and start preloading cues
    pub fn new(backend: Box<dyn AudioBackend>, settings: SessionSettings) -> Self {
        let mut cues = SequentialCuePlayer::new(
            settings.click_cues.clone(),
            settings.transition_cue.clone(),
            settings.cues,
        );
        cues.begin_preload(backend.assets(), Instant::now());
        let last_cue_state = cues.state();

        tracing::info!(
            "Audio session created: track {}, {} click cues, fade {:?}/{} steps",
            settings.background_track,
            settings.click_cues.len(),
            settings.fades.duration(),
            settings.fades.steps()
        );

        Self {
            backend,
            volume: VolumeState::new(settings.initial_volume),
            fades: FadeController::new(settings.fades),
            settings,
            handles: HandleTable::new(),
            music: MusicSlot::Unopened,
            music_attempt: None,
            cues,
            previews: PreviewPlayer::new(),
            modal: None,
            pending_enter: None,
            events: Vec::new(),
            last_music_state: MusicState::Stopped,
            last_cue_state,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Interval the owner should call `advance` at
    pub fn tick_interval(&self) -> Duration {
        self.fades.settings().interval()
    }

    pub fn volume_state(&self) -> VolumeState {
        self.volume
    }

    pub fn music_state(&self) -> MusicState {
        let Some(id) = self.music_id() else {
            return MusicState::Stopped;
        };

        match self.fades.active_direction(id) {
            Some(FadeDirection::In) => MusicState::FadingIn,
            Some(FadeDirection::Out) => MusicState::FadingOut,
            None => match self.handles.get(id) {
                Some(handle) if !handle.is_paused() => MusicState::Playing,
                _ => MusicState::Stopped,
            },
        }
    }

    /// Current volume of the background handle, if it exists
    pub fn music_volume(&self) -> Option<f32> {
        self.music_id()
            .and_then(|id| self.handles.get(id))
            .map(|handle| handle.volume())
    }

    /// Direction of the fade running on the background handle
    pub fn music_fade(&self) -> Option<FadeDirection> {
        self.music_id().and_then(|id| self.fades.active_direction(id))
    }

    pub fn cue_state(&self) -> CuePlayerState {
        self.cues.state()
    }

    pub fn cue_cursor(&self) -> usize {
        self.cues.cursor()
    }

    pub fn current_preview(&self) -> Option<&str> {
        self.previews.current()
    }

    pub fn is_pack_modal_open(&self) -> bool {
        self.modal.is_some()
    }

    fn music_id(&self) -> Option<HandleId> {
        match self.music {
            MusicSlot::Open(id) => Some(id),
            _ => None,
        }
    }

    /// Background handle, opened on first use
    fn ensure_music(&mut self) -> Option<HandleId> {
        match self.music {
            MusicSlot::Open(id) => Some(id),
            MusicSlot::Unavailable => None,
            MusicSlot::Unopened => match self.backend.open(&self.settings.background_track) {
                Ok(mut handle) => {
                    handle.set_looping(true);
                    handle.set_volume(self.volume.effective());
                    let id = self.handles.insert(handle);
                    self.music = MusicSlot::Open(id);
                    tracing::info!("Background music ready: {}", self.settings.background_track);
                    Some(id)
                }
                Err(e) => {
                    tracing::warn!("Background music unavailable: {}", e);
                    self.music = MusicSlot::Unavailable;
                    None
                }
            },
        }
    }

    /// Start the background track: instantly and silent when muted, with a
    /// fade-in to the stored volume otherwise.
    pub fn start_music(&mut self) {
        let Some(id) = self.ensure_music() else {
            return;
        };

        if self.volume.is_muted() {
            self.fades.cancel(id);
            if let Some(handle) = self.handles.get_mut(id) {
                handle.set_volume(0.0);
                if handle.is_paused() {
                    self.music_attempt = Some(handle.play());
                }
            }
        } else {
            self.fade_in(None);
        }

        self.sync_states();
    }

    /// Stop the background track, either at once or after a fade-out
    pub fn stop_music(&mut self, immediate: bool) {
        let Some(id) = self.music_id() else {
            return;
        };

        if immediate {
            self.fades.cancel(id);
            self.music_attempt = None;
            if let Some(handle) = self.handles.get_mut(id) {
                handle.stop();
            }
        } else {
            self.fade_out(None);
        }

        self.sync_states();
    }

    /// Ramp the background track from silence to `target` (default: the
    /// stored volume), starting playback if needed.
    pub fn fade_in(&mut self, target: Option<f32>) {
        let Some(id) = self.ensure_music() else {
            return;
        };
        let target = target.map(clamp_volume).unwrap_or(self.volume.volume());

        if let Some(handle) = self.handles.get_mut(id) {
            let (_, attempt) = self.fades.fade_in(id, handle, target);
            if attempt.is_some() {
                self.music_attempt = attempt;
            }
        }

        self.sync_states();
    }

    /// Ramp the background track to silence, then pause and rewind it before
    /// running `on_complete`. Without a playing background handle the
    /// callback runs immediately.
    pub fn fade_out(&mut self, on_complete: Option<FadeCallback>) {
        let handle = self
            .music_id()
            .and_then(|id| self.handles.get(id).map(|handle| (id, handle)));

        match handle {
            Some((id, handle)) if !handle.is_paused() => {
                self.fades.fade_out(id, handle, on_complete);
            }
            Some((id, _)) => {
                // Already silent, nothing to ramp
                self.fades.cancel(id);
                if let Some(callback) = on_complete {
                    callback();
                }
            }
            None => {
                if let Some(callback) = on_complete {
                    callback();
                }
            }
        }

        self.sync_states();
    }

    /// Store a clamped volume and apply it to the background track.
    ///
    /// A running fade-in is cancelled in favour of the new value. A running
    /// fade-out keeps going; the value is only stored.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let stored = self.volume.set_volume(volume);

        if let Some(id) = self.music_id() {
            match self.fades.active_direction(id) {
                Some(FadeDirection::Out) => {}
                Some(FadeDirection::In) | None => {
                    self.fades.cancel(id);
                    self.apply_effective(id);
                }
            }
        }

        self.events.push(Event::VolumeChanged { volume: self.volume });
        self.sync_states();
        stored
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.volume.set_muted(muted);
        self.apply_mute();
    }

    /// Flip the mute flag, returning the new value
    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.volume.toggle_mute();
        self.apply_mute();
        muted
    }

    fn apply_mute(&mut self) {
        if let Some(id) = self.music_id() {
            match self.fades.active_direction(id) {
                Some(FadeDirection::Out) => {
                    // The ramp keeps running; its next gated tick takes over
                    self.apply_effective(id);
                }
                Some(FadeDirection::In) | None => {
                    self.fades.cancel(id);
                    self.apply_effective(id);
                }
            }
        }

        tracing::debug!("Muted: {}", self.volume.is_muted());
        self.events.push(Event::VolumeChanged { volume: self.volume });
        self.sync_states();
    }

    fn apply_effective(&mut self, id: HandleId) {
        if let Some(handle) = self.handles.get_mut(id) {
            handle.set_volume(self.volume.effective());
        }
    }

    /// Trigger the next click cue
    pub fn play_click(&mut self) -> Result<usize, CueError> {
        let result = self.cues.play_next(&mut self.handles);
        if let Err(e) = &result {
            tracing::debug!("Click ignored: {}", e);
        }
        self.sync_states();
        result
    }

    /// Play the transition cue, silencing clicks and previews
    pub fn play_transition(&mut self) -> Result<(), CueError> {
        self.make_room_for(AudioSourceType::Transition);
        let result = self.cues.play_transition(&mut self.handles);
        if let Err(e) = &result {
            tracing::debug!("Transition not played: {}", e);
        }
        self.sync_states();
        result
    }

    /// Splash exit: transition cue now, background music once the exit delay
    /// has elapsed.
    pub fn enter(&mut self) {
        if self.pending_enter.is_some() {
            return;
        }
        let _ = self.play_transition();
        self.pending_enter = Some(self.settings.splash_exit_delay);
    }

    pub fn reset_cue_sequence(&mut self) {
        self.cues.reset_sequence();
    }

    /// Play or pause a sample preview. Returns the sample playing afterwards.
    pub fn toggle_preview(&mut self, sample_id: &str, locator: &str) -> Option<String> {
        let previous = self.previews.current().map(str::to_string);
        if previous.as_deref() != Some(sample_id) {
            self.make_room_for(AudioSourceType::Preview);
        }

        let now = match self
            .previews
            .toggle(sample_id, locator, self.backend.as_ref(), &mut self.handles)
        {
            Ok(now) => now,
            Err(e) => {
                tracing::warn!("Preview {} unavailable: {}", sample_id, e);
                None
            }
        };

        if now != previous {
            self.events.push(Event::PreviewChanged { sample: now.clone() });
        }
        now
    }

    pub fn stop_preview(&mut self) {
        if self.previews.stop(&mut self.handles).is_some() {
            self.events.push(Event::PreviewChanged { sample: None });
        }
    }

    fn make_room_for(&mut self, source: AudioSourceType) {
        if !source.is_exclusive() {
            return;
        }

        match source {
            AudioSourceType::Preview => self.cues.stop_all(&mut self.handles),
            _ => self.stop_preview(),
        }
        tracing::debug!("Silenced other cues for {}", source);
    }

    /// Duck the music while a pack modal is shown
    pub fn open_pack_modal(&mut self) {
        if self.modal.is_some() {
            return;
        }

        let was_audible = self.music_state().is_audible();
        self.modal = Some(was_audible);
        self.fade_out(None);
        self.events.push(Event::PackModalChanged { open: true });
    }

    /// Close the pack modal, bringing music back only if it was audible
    /// when the modal opened.
    pub fn close_pack_modal(&mut self) {
        let Some(was_audible) = self.modal.take() else {
            return;
        };

        self.stop_preview();
        if was_audible {
            self.fade_in(None);
        }
        self.events.push(Event::PackModalChanged { open: false });
    }

    /// Event-loop tick
    pub fn advance(&mut self, elapsed: Duration) {
        for completion in self.fades.advance(elapsed, &self.volume, &mut self.handles) {
            self.events.push(Event::FadeCompleted {
                direction: completion.direction,
            });
        }

        if let Some(result) = self.music_attempt.as_ref().and_then(PlayAttempt::try_settle) {
            self.music_attempt = None;
            if let Err(e) = result {
                // Ramp and volume state carry on as if playback had started
                tracing::warn!("Background music did not start: {}", e);
                self.events.push(Event::PlaybackFailed {
                    source: AudioSourceType::BackgroundMusic,
                });
            }
        }

        self.cues
            .poll_preload(Instant::now(), self.backend.as_ref(), &mut self.handles);

        match self.cues.poll_in_flight() {
            Some(CueSettled::Started { index }) => self.events.push(Event::CuePlayed { index }),
            Some(CueSettled::Failed { .. }) => self.events.push(Event::PlaybackFailed {
                source: AudioSourceType::Click,
            }),
            None => {}
        }

        match self.cues.poll_transition() {
            Some(true) => self.events.push(Event::TransitionPlayed),
            Some(false) => self.events.push(Event::PlaybackFailed {
                source: AudioSourceType::Transition,
            }),
            None => {}
        }

        if self.previews.poll(&mut self.handles) {
            self.events.push(Event::PreviewChanged { sample: None });
        }

        if let Some(remaining) = self.pending_enter {
            if remaining <= elapsed {
                self.pending_enter = None;
                tracing::info!("Entering site");
                self.start_music();
                self.events.push(Event::Entered);
            } else {
                self.pending_enter = Some(remaining - elapsed);
            }
        }

        self.sync_states();
    }

    fn sync_states(&mut self) {
        let music = self.music_state();
        if music != self.last_music_state {
            tracing::debug!(
                "Music: {} -> {}",
                self.last_music_state.description(),
                music.description()
            );
            self.events.push(Event::MusicStateChanged {
                old_state: self.last_music_state,
                new_state: music,
            });
            self.last_music_state = music;
        }

        let cues = self.cues.state();
        if cues != self.last_cue_state {
            self.events.push(Event::CuePlayerStateChanged {
                old_state: self.last_cue_state,
                new_state: cues,
            });
            self.last_cue_state = cues;
        }
    }

    /// Events produced since the last call
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Page teardown: pause and release every handle
    pub fn shutdown(&mut self) {
        let dropped = self.fades.cancel_all();
        self.cues.release(&mut self.handles);
        self.previews.release(&mut self.handles);
        self.handles.release_all();
        self.music = MusicSlot::Unavailable;
        self.music_attempt = None;
        self.pending_enter = None;
        self.modal = None;

        tracing::info!("Audio session shut down ({} fades dropped)", dropped);
        self.sync_states();
        self.events.push(Event::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::memory::{MemoryBackend, PlayPolicy, StaticAssets};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const MUSIC: &str = "/sounds/musicsw1.mp3";
    const TICK: Duration = Duration::from_millis(20);

    fn settings() -> SessionSettings {
        SessionSettings {
            click_cues: vec!["/sounds/click-01.wav".to_string()],
            transition_cue: None,
            ..SessionSettings::default()
        }
    }

    fn session_with(assets: StaticAssets) -> (AudioSession, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(Arc::new(assets)));
        let session = AudioSession::new(Box::new(Arc::clone(&backend)), settings());
        (session, backend)
    }

    fn session() -> (AudioSession, Arc<MemoryBackend>) {
        session_with(
            StaticAssets::new()
                .with_asset(MUSIC, vec![1])
                .with_asset("/sounds/click-01.wav", vec![2]),
        )
    }

    #[test]
    fn test_music_opened_lazily_and_looped() {
        let (mut session, backend) = session();
        assert_eq!(backend.created_count(MUSIC), 0);
        assert_eq!(session.music_volume(), None);

        session.start_music();
        let probe = backend.probe(MUSIC).unwrap();
        assert!(probe.is_looping());
        assert!(!probe.is_paused());
        assert_eq!(session.music_state(), MusicState::FadingIn);

        session.advance(Duration::from_secs(1));
        assert_eq!(session.music_state(), MusicState::Playing);
        assert_relative_eq!(probe.volume(), 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_missing_track_makes_music_a_no_op() {
        let (mut session, _backend) = session_with(StaticAssets::new());
        session.start_music();
        session.set_volume(0.9);
        session.stop_music(false);
        assert_eq!(session.music_state(), MusicState::Stopped);
        assert_eq!(session.volume_state().volume(), 0.9);
    }

    #[test]
    fn test_muted_start_plays_silently_without_fade() {
        let (mut session, backend) = session();
        session.set_muted(true);
        session.start_music();

        let probe = backend.probe(MUSIC).unwrap();
        assert!(!probe.is_paused());
        assert_eq!(probe.volume(), 0.0);
        assert_eq!(session.music_fade(), None);
        assert_eq!(session.music_state(), MusicState::Playing);
    }

    #[test]
    fn test_set_volume_during_fade_in_applies_at_once() {
        let (mut session, backend) = session();
        session.start_music();
        session.advance(TICK * 10);

        session.set_volume(0.7);
        assert_eq!(session.music_fade(), None);
        assert_relative_eq!(backend.probe(MUSIC).unwrap().volume(), 0.7);
    }

    #[test]
    fn test_set_volume_during_fade_out_only_stores() {
        let (mut session, backend) = session();
        session.start_music();
        session.advance(Duration::from_secs(1));

        session.stop_music(false);
        session.set_volume(0.9);
        assert_eq!(session.music_fade(), Some(FadeDirection::Out));

        session.advance(Duration::from_secs(1));
        let probe = backend.probe(MUSIC).unwrap();
        assert!(probe.is_paused());
        assert_eq!(probe.volume(), 0.0);
        assert_eq!(session.volume_state().volume(), 0.9);
    }

    #[test]
    fn test_mute_during_fade_out_is_immediate() {
        let (mut session, backend) = session();
        session.start_music();
        session.advance(Duration::from_secs(1));

        session.stop_music(false);
        session.advance(TICK * 5);
        session.toggle_mute();
        assert_eq!(backend.probe(MUSIC).unwrap().volume(), 0.0);
        assert_eq!(session.music_fade(), Some(FadeDirection::Out));
    }

    #[test]
    fn test_unmute_during_fade_out_restores_volume_at_once() {
        let (mut session, backend) = session();
        session.start_music();
        session.advance(Duration::from_secs(1));

        session.stop_music(false);
        session.advance(TICK * 5);
        session.set_muted(true);
        session.set_muted(false);

        let probe = backend.probe(MUSIC).unwrap();
        assert_relative_eq!(probe.volume(), 0.3, epsilon = 1e-5);
        assert_eq!(session.music_fade(), Some(FadeDirection::Out));

        session.advance(TICK);
        assert!(probe.volume() < 0.3);
        session.advance(Duration::from_secs(1));
        assert!(probe.is_paused());
        assert_eq!(probe.volume(), 0.0);
    }

    #[test]
    fn test_fade_out_of_stopped_music_completes_at_once() {
        let (mut session, _backend) = session();
        session.start_music();
        session.advance(Duration::from_secs(1));
        session.stop_music(true);
        session.drain_events();

        let fired = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&fired);
        session.fade_out(Some(Box::new(move || flag.set(true))));
        assert!(fired.get());
        assert_eq!(session.music_fade(), None);

        session.open_pack_modal();
        assert_eq!(session.music_state(), MusicState::Stopped);
        session.advance(Duration::from_secs(1));
        assert!(!session
            .drain_events()
            .iter()
            .any(|event| matches!(event, Event::MusicStateChanged { .. })));
    }

    #[test]
    fn test_immediate_stop_cancels_fade() {
        let (mut session, backend) = session();
        session.start_music();
        session.advance(TICK * 10);

        probe_seek(&backend, Duration::from_secs(3));
        session.stop_music(true);
        let probe = backend.probe(MUSIC).unwrap();
        assert!(probe.is_paused());
        assert_eq!(probe.position(), Duration::ZERO);
        assert_eq!(session.music_fade(), None);

        let level = probe.volume();
        session.advance(Duration::from_secs(1));
        assert_eq!(probe.volume(), level);
        assert!(probe.is_paused());
    }

    fn probe_seek(backend: &MemoryBackend, position: Duration) {
        backend.probe(MUSIC).unwrap().seek(position);
    }

    #[test]
    fn test_fade_out_without_handle_calls_back_immediately() {
        let (mut session, _backend) = session();
        let fired = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&fired);

        session.fade_out(Some(Box::new(move || flag.set(true))));
        assert!(fired.get());
    }

    #[test]
    fn test_rejected_music_is_reported_not_fatal() {
        let (mut session, backend) = session();
        backend.set_policy(MUSIC, PlayPolicy::Reject);

        session.start_music();
        session.advance(TICK);
        let events = session.drain_events();
        assert!(events.contains(&Event::PlaybackFailed {
            source: AudioSourceType::BackgroundMusic
        }));

        session.advance(Duration::from_secs(1));
        assert_relative_eq!(backend.probe(MUSIC).unwrap().volume(), 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_pack_modal_resumes_only_audible_music() {
        let (mut session, backend) = session();

        // Music never started: closing must not start it
        session.open_pack_modal();
        session.close_pack_modal();
        assert_eq!(backend.created_count(MUSIC), 0);

        session.start_music();
        session.advance(Duration::from_secs(1));
        session.open_pack_modal();
        assert!(session.is_pack_modal_open());
        assert_eq!(session.music_state(), MusicState::FadingOut);

        session.advance(TICK * 10);
        session.close_pack_modal();
        assert_eq!(session.music_state(), MusicState::FadingIn);
        session.advance(Duration::from_secs(1));
        assert_eq!(session.music_state(), MusicState::Playing);
    }

    #[test]
    fn test_music_state_events() {
        let (mut session, _backend) = session();
        session.drain_events();

        session.start_music();
        session.advance(Duration::from_secs(1));
        let changes = session
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::MusicStateChanged { new_state, .. } => Some(new_state),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(changes, vec![MusicState::FadingIn, MusicState::Playing]);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (mut session, backend) = session();
        session.start_music();
        session.shutdown();

        assert!(backend.probe(MUSIC).unwrap().is_paused());
        assert_eq!(session.music_state(), MusicState::Stopped);
        assert!(session.drain_events().contains(&Event::Shutdown));

        session.start_music();
        assert_eq!(backend.created_count(MUSIC), 1);
    }
}
