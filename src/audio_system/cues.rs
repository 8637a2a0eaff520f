/// Sequential cue player
///
/// Plays one short cue per trigger from a fixed list, in order, wrapping at
/// the end. A separate transition cue pre-empts the sequence.
///
/// ```text
/// Loading ──(every asset settled or timed out)──> Ready <──> Busy
/// ```
///
/// `Busy` lasts from `play_next` until the play attempt settles, not until
/// the cue finishes sounding, so rapid triggers overlap audibly but never
/// race on the cursor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use super::backend::{AssetSource, AudioBackend};
use super::handle::{HandleId, HandleTable, PlayAttempt};
use crate::error::{AudioError, CueError};

/// Lifecycle of the cue player
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub enum CuePlayerState {
    /// Assets are still being fetched
    Loading,

    /// Accepting triggers
    Ready,

    /// A triggered cue has not settled yet
    Busy,
}

impl CuePlayerState {
    pub fn description(&self) -> &'static str {
        match self {
            CuePlayerState::Loading => "Loading...",
            CuePlayerState::Ready => "Ready",
            CuePlayerState::Busy => "Busy",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CueSettings {
    /// Volume applied to every cue handle
    pub volume: f32,

    /// Per-asset preload deadline
    pub preload_timeout: Duration,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            preload_timeout: Duration::from_millis(2000),
        }
    }
}

/// Result of a settled `play_next`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueSettled {
    Started { index: usize },
    Failed { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueSlot {
    Loaded(HandleId),
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
enum CueTarget {
    Sequence(usize),
    Transition,
}

struct PendingAsset {
    target: CueTarget,
    locator: String,
    rx: Receiver<Result<Vec<u8>, AudioError>>,
    deadline: Instant,
}

struct InFlightCue {
    index: usize,
    attempt: PlayAttempt,
}

pub struct SequentialCuePlayer {
    locators: Vec<String>,
    transition_locator: Option<String>,
    settings: CueSettings,
    slots: Vec<CueSlot>,
    transition: Option<CueSlot>,
    pending: Vec<PendingAsset>,
    loading: bool,
    cursor: usize,
    in_flight: Option<InFlightCue>,
    transition_attempt: Option<PlayAttempt>,
}

impl SequentialCuePlayer {
    pub fn new(locators: Vec<String>, transition: Option<String>, settings: CueSettings) -> Self {
        let slots = vec![CueSlot::Unavailable; locators.len()];
        let transition_slot = transition.as_ref().map(|_| CueSlot::Unavailable);

        Self {
            locators,
            transition_locator: transition,
            settings,
            slots,
            transition: transition_slot,
            pending: Vec::new(),
            loading: true,
            cursor: 0,
            in_flight: None,
            transition_attempt: None,
        }
    }

    /// Fetch every cue concurrently, each bounded by the preload timeout
    pub fn begin_preload(&mut self, assets: Arc<dyn AssetSource>, now: Instant) {
        let deadline = now + self.settings.preload_timeout;

        let targets = self
            .locators
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, locator)| (CueTarget::Sequence(index), locator))
            .chain(
                self.transition_locator
                    .clone()
                    .map(|locator| (CueTarget::Transition, locator)),
            )
            .collect::<Vec<_>>();

        for (target, locator) in targets {
            let (tx, rx) = bounded(1);
            let worker_assets = Arc::clone(&assets);
            let worker_locator = locator.clone();

            let spawned = std::thread::Builder::new()
                .name("cue-preload".to_string())
                .spawn(move || {
                    let _ = tx.send(worker_assets.fetch(&worker_locator));
                });

            match spawned {
                Ok(_) => self.pending.push(PendingAsset {
                    target,
                    locator,
                    rx,
                    deadline,
                }),
                Err(e) => {
                    tracing::warn!("Could not spawn preload for {}: {}", locator, e);
                    self.set_slot(target, CueSlot::Unavailable);
                }
            }
        }

        tracing::debug!("Preloading {} cue assets", self.pending.len());
        if self.pending.is_empty() {
            self.loading = false;
        }
    }

    /// Collect finished or expired preloads. Returns true on the poll that
    /// moves the player to Ready.
    pub fn poll_preload(
        &mut self,
        now: Instant,
        backend: &dyn AudioBackend,
        handles: &mut HandleTable,
    ) -> bool {
        if !self.loading {
            return false;
        }

        let pending = std::mem::take(&mut self.pending);
        for asset in pending {
            let outcome = match asset.rx.try_recv() {
                Ok(Ok(bytes)) => Some(backend.decode(&asset.locator, Arc::new(bytes))),
                Ok(Err(e)) => Some(Err(e)),
                Err(TryRecvError::Empty) if now >= asset.deadline => Some(Err(AudioError::Timeout {
                    locator: asset.locator.clone(),
                })),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(AudioError::LoadFailed {
                    locator: asset.locator.clone(),
                    source: "preload worker exited without a result".into(),
                })),
            };

            match outcome {
                None => self.pending.push(asset),
                Some(Ok(mut handle)) => {
                    handle.set_volume(self.settings.volume);
                    let id = handles.insert(handle);
                    self.set_slot(asset.target, CueSlot::Loaded(id));
                }
                Some(Err(e)) => {
                    tracing::warn!("Cue unavailable: {}", e);
                    self.set_slot(asset.target, CueSlot::Unavailable);
                }
            }
        }

        if !self.pending.is_empty() {
            return false;
        }

        self.loading = false;
        tracing::info!(
            "Cue player ready: {}/{} cues loaded",
            self.loaded_count(),
            self.slots.len()
        );
        true
    }

    fn set_slot(&mut self, target: CueTarget, slot: CueSlot) {
        match target {
            CueTarget::Sequence(index) => self.slots[index] = slot,
            CueTarget::Transition => self.transition = Some(slot),
        }
    }

    /// Trigger the cue under the cursor.
    ///
    /// Returns the index whose play attempt was started. An unavailable cue
    /// fails the trigger and leaves the cursor on it.
    pub fn play_next(&mut self, handles: &mut HandleTable) -> Result<usize, CueError> {
        if self.loading {
            return Err(CueError::NotReady);
        }
        if self.in_flight.is_some() {
            return Err(CueError::Busy);
        }
        if self.slots.is_empty() {
            return Err(CueError::Empty);
        }

        let index = self.cursor;
        match self.slots[index] {
            CueSlot::Unavailable => Err(CueError::Unavailable { index }),
            CueSlot::Loaded(id) => {
                let handle = handles.get_mut(id).ok_or(CueError::UnknownHandle)?;
                handle.set_position(Duration::ZERO);
                let attempt = handle.play();
                self.in_flight = Some(InFlightCue { index, attempt });
                Ok(index)
            }
        }
    }

    /// Settle the in-flight cue, advancing the cursor only if playback began
    pub fn poll_in_flight(&mut self) -> Option<CueSettled> {
        let result = self.in_flight.as_ref()?.attempt.try_settle()?;
        let cue = self.in_flight.take()?;

        match result {
            Ok(()) => {
                self.cursor = (self.cursor + 1) % self.slots.len();
                Some(CueSettled::Started { index: cue.index })
            }
            Err(e) => {
                tracing::warn!("Cue {} failed to play: {}", cue.index, e);
                Some(CueSettled::Failed { index: cue.index })
            }
        }
    }

    /// Play the transition cue alone, silencing any sequence cue first
    pub fn play_transition(&mut self, handles: &mut HandleTable) -> Result<(), CueError> {
        if self.loading {
            return Err(CueError::NotReady);
        }
        let id = match self.transition {
            None => return Err(CueError::Empty),
            Some(CueSlot::Unavailable) => return Err(CueError::TransitionUnavailable),
            Some(CueSlot::Loaded(id)) => id,
        };

        self.stop_sequence(handles);

        let handle = handles.get_mut(id).ok_or(CueError::UnknownHandle)?;
        handle.set_position(Duration::ZERO);
        self.transition_attempt = Some(handle.play());
        Ok(())
    }

    /// Settle the transition attempt. `Some(true)` once it started playing.
    pub fn poll_transition(&mut self) -> Option<bool> {
        let result = self.transition_attempt.as_ref()?.try_settle()?;
        self.transition_attempt = None;

        match result {
            Ok(()) => Some(true),
            Err(e) => {
                tracing::warn!("Transition cue failed to play: {}", e);
                Some(false)
            }
        }
    }

    /// Pause and rewind every sequence cue
    pub fn stop_sequence(&mut self, handles: &mut HandleTable) {
        for slot in &self.slots {
            if let CueSlot::Loaded(id) = slot {
                if let Some(handle) = handles.get_mut(*id) {
                    handle.stop();
                }
            }
        }
    }

    /// Silence the sequence and the transition cue
    pub fn stop_all(&mut self, handles: &mut HandleTable) {
        self.stop_sequence(handles);
        if let Some(CueSlot::Loaded(id)) = self.transition {
            if let Some(handle) = handles.get_mut(id) {
                handle.stop();
            }
        }
        self.transition_attempt = None;
    }

    pub fn reset_sequence(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, CueSlot::Loaded(_)))
            .count()
    }

    pub fn state(&self) -> CuePlayerState {
        if self.loading {
            CuePlayerState::Loading
        } else if self.in_flight.is_some() {
            CuePlayerState::Busy
        } else {
            CuePlayerState::Ready
        }
    }

    /// Drop every cue handle (page teardown)
    pub fn release(&mut self, handles: &mut HandleTable) {
        let ids = self
            .slots
            .iter()
            .chain(self.transition.iter())
            .filter_map(|slot| match slot {
                CueSlot::Loaded(id) => Some(*id),
                CueSlot::Unavailable => None,
            })
            .collect::<Vec<_>>();

        for id in ids {
            if let Some(mut handle) = handles.remove(id) {
                handle.pause();
            }
        }

        self.slots.iter_mut().for_each(|slot| *slot = CueSlot::Unavailable);
        self.transition = self.transition.map(|_| CueSlot::Unavailable);
        self.pending.clear();
        self.in_flight = None;
        self.transition_attempt = None;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::memory::{MemoryBackend, PlayPolicy, StaticAssets};

    const CLICKS: [&str; 3] = ["/sounds/click-01.wav", "/sounds/click-02.wav", "/sounds/click-03.wav"];
    const ENTER: &str = "/sounds/enter.wav";

    fn assets() -> StaticAssets {
        CLICKS
            .iter()
            .fold(StaticAssets::new(), |assets, locator| assets.with_asset(locator, vec![1, 2, 3]))
            .with_asset(ENTER, vec![4, 5, 6])
    }

    fn player(transition: bool) -> SequentialCuePlayer {
        SequentialCuePlayer::new(
            CLICKS.iter().map(|s| s.to_string()).collect(),
            transition.then(|| ENTER.to_string()),
            CueSettings::default(),
        )
    }

    fn wait_ready(player: &mut SequentialCuePlayer, backend: &MemoryBackend, table: &mut HandleTable) {
        let started = Instant::now();
        while !player.poll_preload(Instant::now(), backend, table) {
            assert!(player.state() == CuePlayerState::Loading);
            assert!(started.elapsed() < Duration::from_secs(5), "preload never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn ready_player(backend: &MemoryBackend, table: &mut HandleTable, transition: bool) -> SequentialCuePlayer {
        let mut player = player(transition);
        player.begin_preload(backend.assets(), Instant::now());
        wait_ready(&mut player, backend, table);
        player
    }

    #[test]
    fn test_not_ready_while_loading() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = player(false);

        assert_eq!(player.state(), CuePlayerState::Loading);
        assert_eq!(player.play_next(&mut table), Err(CueError::NotReady));

        player.begin_preload(backend.assets(), Instant::now());
        wait_ready(&mut player, &backend, &mut table);
        assert_eq!(player.state(), CuePlayerState::Ready);
        assert_eq!(player.loaded_count(), 3);
    }

    #[test]
    fn test_cursor_visits_each_cue_then_wraps() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);

        let mut visited = Vec::new();
        for _ in 0..4 {
            visited.push(player.play_next(&mut table).unwrap());
            assert!(matches!(player.poll_in_flight(), Some(CueSettled::Started { .. })));
        }
        assert_eq!(visited, vec![0, 1, 2, 0]);
        assert_eq!(player.cursor(), 1);
        assert_eq!(backend.probe(CLICKS[0]).unwrap().play_calls(), 2);
    }

    #[test]
    fn test_trigger_while_busy_fails_without_advancing() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        backend.set_policy(CLICKS[0], PlayPolicy::Defer);
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);

        assert_eq!(player.play_next(&mut table), Ok(0));
        assert_eq!(player.state(), CuePlayerState::Busy);
        assert!(player.poll_in_flight().is_none());

        assert_eq!(player.play_next(&mut table), Err(CueError::Busy));
        assert_eq!(player.cursor(), 0);

        backend.probe(CLICKS[0]).unwrap().settle_pending(true);
        assert_eq!(player.poll_in_flight(), Some(CueSettled::Started { index: 0 }));
        assert_eq!(player.cursor(), 1);
        assert_eq!(player.state(), CuePlayerState::Ready);
    }

    #[test]
    fn test_even_immediate_results_settle_on_poll() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);

        assert_eq!(player.play_next(&mut table), Ok(0));
        assert_eq!(player.play_next(&mut table), Err(CueError::Busy));
        assert_eq!(player.cursor(), 0);
    }

    #[test]
    fn test_rejected_play_keeps_cursor() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        backend.set_policy(CLICKS[0], PlayPolicy::Reject);
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);

        assert_eq!(player.play_next(&mut table), Ok(0));
        assert_eq!(player.poll_in_flight(), Some(CueSettled::Failed { index: 0 }));
        assert_eq!(player.cursor(), 0);
        assert_eq!(player.state(), CuePlayerState::Ready);
    }

    #[test]
    fn test_cue_is_rewound_before_play() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);

        let probe = backend.probe(CLICKS[0]).unwrap();
        assert_eq!(probe.volume(), 0.5);
        probe.seek(Duration::from_millis(80));

        player.play_next(&mut table).unwrap();
        assert_eq!(probe.position(), Duration::ZERO);
        assert!(!probe.is_paused());
    }

    #[test]
    fn test_failed_asset_fails_trigger_without_advancing() {
        let backend = MemoryBackend::new(Arc::new(assets().with_failure(CLICKS[1])));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);
        assert_eq!(player.loaded_count(), 2);

        assert_eq!(player.play_next(&mut table), Ok(0));
        player.poll_in_flight();
        assert_eq!(player.play_next(&mut table), Err(CueError::Unavailable { index: 1 }));
        assert_eq!(player.cursor(), 1);
        assert_eq!(player.play_next(&mut table), Err(CueError::Unavailable { index: 1 }));
        assert_eq!(player.cursor(), 1);
    }

    #[test]
    fn test_slow_asset_times_out() {
        let slow = assets().with_delayed(CLICKS[2], vec![7], Duration::from_secs(30));
        let backend = MemoryBackend::new(Arc::new(slow));
        let mut table = HandleTable::new();
        let mut player = player(false);

        let start = Instant::now();
        player.begin_preload(backend.assets(), start);

        // Wait for the fast assets, then jump past the deadline
        let mut polls = 0;
        while player.loaded_count() < 2 && polls < 5000 {
            player.poll_preload(Instant::now(), &backend, &mut table);
            std::thread::sleep(Duration::from_millis(1));
            polls += 1;
        }
        assert_eq!(player.state(), CuePlayerState::Loading);

        let past_deadline = start + CueSettings::default().preload_timeout + Duration::from_millis(1);
        assert!(player.poll_preload(past_deadline, &backend, &mut table));
        assert_eq!(player.loaded_count(), 2);
        assert_eq!(player.state(), CuePlayerState::Ready);
    }

    #[test]
    fn test_transition_stops_sequence_and_keeps_cursor() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, true);

        player.play_next(&mut table).unwrap();
        player.poll_in_flight();
        player.play_next(&mut table).unwrap();
        player.poll_in_flight();
        assert_eq!(player.cursor(), 2);

        let first = backend.probe(CLICKS[0]).unwrap();
        first.seek(Duration::from_millis(40));
        assert!(!first.is_paused());

        player.play_transition(&mut table).unwrap();
        assert!(first.is_paused());
        assert_eq!(first.position(), Duration::ZERO);
        assert!(backend.probe(CLICKS[1]).unwrap().is_paused());
        assert!(!backend.probe(ENTER).unwrap().is_paused());
        assert_eq!(player.poll_transition(), Some(true));
        assert_eq!(player.cursor(), 2);
    }

    #[test]
    fn test_transition_not_configured() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, false);
        assert_eq!(player.play_transition(&mut table), Err(CueError::Empty));
    }

    #[test]
    fn test_empty_list_is_ready_immediately() {
        let backend = MemoryBackend::new(Arc::new(StaticAssets::new()));
        let mut table = HandleTable::new();
        let mut player = SequentialCuePlayer::new(Vec::new(), None, CueSettings::default());

        player.begin_preload(backend.assets(), Instant::now());
        assert_eq!(player.state(), CuePlayerState::Ready);
        assert_eq!(player.play_next(&mut table), Err(CueError::Empty));
    }

    #[test]
    fn test_reset_and_release() {
        let backend = MemoryBackend::new(Arc::new(assets()));
        let mut table = HandleTable::new();
        let mut player = ready_player(&backend, &mut table, true);

        player.play_next(&mut table).unwrap();
        player.poll_in_flight();
        player.reset_sequence();
        assert_eq!(player.cursor(), 0);

        player.release(&mut table);
        assert!(table.is_empty());
        assert_eq!(player.loaded_count(), 0);
    }
}
