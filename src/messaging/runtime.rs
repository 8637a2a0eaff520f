/// Audio runtime
///
/// Owns the [`AudioSession`] on a dedicated thread: the single event loop
/// that every fade tick, play settlement and command runs on. Other threads
/// only ever hold a [`SessionHandle`].
///
/// ```text
/// SessionHandle ──Command──> runtime thread ──Event──> EventBus
///       ▲                         │
///       └──── snapshot (RwLock) ──┘
/// ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use serde::Serialize;

use super::bus::{EventBus, SubscriberId};
use super::commands::Command;
use super::events::Event;
use crate::audio_system::backend::AudioBackend;
use crate::audio_system::cues::CuePlayerState;
use crate::audio_system::effects::VolumeState;
use crate::audio_system::session::{AudioSession, MusicState, SessionSettings};
use crate::config::AudioConfig;

/// Shortest wait between two loop turns
const MIN_TICK: Duration = Duration::from_millis(5);

/// Point-in-time view of the session, readable from any thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub volume: VolumeState,
    pub music: MusicState,
    pub cues: CuePlayerState,
    pub cue_cursor: usize,
    pub preview: Option<String>,
    pub pack_modal_open: bool,
    pub running: bool,
}

impl SessionSnapshot {
    fn capture(session: &AudioSession) -> Self {
        Self {
            volume: session.volume_state(),
            music: session.music_state(),
            cues: session.cue_state(),
            cue_cursor: session.cue_cursor(),
            preview: session.current_preview().map(str::to_string),
            pack_modal_open: session.is_pack_modal_open(),
            running: true,
        }
    }

    pub fn is_music_playing(&self) -> bool {
        self.music.is_audible()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            volume: VolumeState::default(),
            music: MusicState::Stopped,
            cues: CuePlayerState::Loading,
            cue_cursor: 0,
            preview: None,
            pack_modal_open: false,
            running: false,
        }
    }
}

/// Cloneable access to the running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: Sender<Command>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    bus: EventBus,
}

impl SessionHandle {
    /// Queue a command. Returns false once the runtime has stopped.
    pub fn send(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            tracing::warn!("Audio runtime stopped, command dropped");
            return false;
        }
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    pub fn volume(&self) -> VolumeState {
        self.snapshot.read().volume
    }

    pub fn is_music_playing(&self) -> bool {
        self.snapshot.read().is_music_playing()
    }

    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        self.bus.subscribe()
    }

    pub fn start_music(&self) -> bool {
        self.send(Command::StartMusic)
    }

    pub fn stop_music(&self, immediate: bool) -> bool {
        self.send(Command::StopMusic { immediate })
    }

    pub fn set_volume(&self, volume: f32) -> bool {
        self.send(Command::SetVolume(volume))
    }

    pub fn set_muted(&self, muted: bool) -> bool {
        self.send(Command::SetMuted(muted))
    }

    pub fn toggle_mute(&self) -> bool {
        self.send(Command::ToggleMute)
    }

    pub fn play_click(&self) -> bool {
        self.send(Command::PlayClick)
    }

    pub fn enter(&self) -> bool {
        self.send(Command::Enter)
    }

    pub fn open_pack_modal(&self) -> bool {
        self.send(Command::OpenPackModal)
    }

    pub fn close_pack_modal(&self) -> bool {
        self.send(Command::ClosePackModal)
    }

    pub fn toggle_preview(&self, sample_id: &str, locator: &str) -> bool {
        self.send(Command::TogglePreview {
            sample_id: sample_id.to_string(),
            locator: locator.to_string(),
        })
    }
}

/// The runtime thread and the handle to reach it
pub struct AudioRuntime {
    handle: SessionHandle,
    thread: Option<JoinHandle<()>>,
}

impl AudioRuntime {
    /// Start the event loop.
    ///
    /// `backend_factory` runs on the runtime thread, so backends holding
    /// non-`Send` output streams can be used.
    pub fn spawn<F>(config: AudioConfig, backend_factory: F) -> std::io::Result<Self>
    where
        F: FnOnce(&AudioConfig) -> Box<dyn AudioBackend> + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let snapshot = Arc::new(RwLock::new(SessionSnapshot::default()));
        let bus = EventBus::new();

        let loop_snapshot = Arc::clone(&snapshot);
        let loop_bus = bus.clone();
        let thread = thread::Builder::new()
            .name("audio-runtime".to_string())
            .spawn(move || {
                let backend = backend_factory(&config);
                let session = AudioSession::new(backend, SessionSettings::from(&config));
                run_loop(session, rx, &loop_snapshot, &loop_bus);
            })?;

        Ok(Self {
            handle: SessionHandle {
                commands: tx,
                snapshot,
                bus,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Send `Shutdown` and wait for the thread
    pub fn shutdown(mut self) {
        self.handle.send(Command::Shutdown);
        self.wait();
    }

    /// Wait for the thread to end (after `Shutdown` or once every sender is gone)
    pub fn join(mut self) {
        self.wait();
    }

    fn wait(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Audio runtime thread panicked");
            }
        }
    }
}

impl Drop for AudioRuntime {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.commands.send(Command::Shutdown);
            self.wait();
        }
    }
}

fn run_loop(
    mut session: AudioSession,
    commands: Receiver<Command>,
    snapshot: &RwLock<SessionSnapshot>,
    bus: &EventBus,
) {
    tracing::info!("Audio runtime started");
    let tick = session.tick_interval().max(MIN_TICK);
    let mut last = Instant::now();
    publish(&mut session, snapshot, bus);

    loop {
        let received = commands.recv_timeout(tick);

        let now = Instant::now();
        session.advance(now.duration_since(last));
        last = now;

        match received {
            Ok(Command::Shutdown) => {
                tracing::info!("Shutdown command received");
                break;
            }
            Ok(command) => execute(&mut session, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("All session handles dropped");
                break;
            }
        }

        publish(&mut session, snapshot, bus);
    }

    session.shutdown();
    publish(&mut session, snapshot, bus);
    snapshot.write().running = false;
    tracing::info!("Audio runtime stopped");
}

fn execute(session: &mut AudioSession, command: Command) {
    tracing::debug!("Executing command: {}", command.description());

    match command {
        Command::StartMusic => session.start_music(),
        Command::StopMusic { immediate } => session.stop_music(immediate),
        Command::FadeIn { target } => session.fade_in(target),
        Command::FadeOut => session.fade_out(None),
        Command::SetVolume(volume) => {
            session.set_volume(volume);
        }
        Command::SetMuted(muted) => session.set_muted(muted),
        Command::ToggleMute => {
            session.toggle_mute();
        }
        Command::PlayClick => {
            let _ = session.play_click();
        }
        Command::PlayTransition => {
            let _ = session.play_transition();
        }
        Command::Enter => session.enter(),
        Command::ResetCues => session.reset_cue_sequence(),
        Command::TogglePreview { sample_id, locator } => {
            session.toggle_preview(&sample_id, &locator);
        }
        Command::StopPreview => session.stop_preview(),
        Command::OpenPackModal => session.open_pack_modal(),
        Command::ClosePackModal => session.close_pack_modal(),
        Command::Shutdown => {}
    }
}

fn publish(session: &mut AudioSession, snapshot: &RwLock<SessionSnapshot>, bus: &EventBus) {
    *snapshot.write() = SessionSnapshot::capture(session);
    for event in session.drain_events() {
        tracing::trace!("Event: {}", event.description());
        bus.publish(event);
    }
}
