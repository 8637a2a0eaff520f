/// Fade controller
///
/// Linear, stepped volume ramps driven by the session's event-loop tick.
/// One job per handle: starting a fade on a handle replaces whatever fade was
/// running there, and the replaced job never runs again or calls back.

use std::collections::HashMap;
use std::time::Duration;

use crate::audio_system::handle::{AudioHandle, HandleId, HandleTable, PlayAttempt};

use super::volume::{clamp_volume, VolumeState};

/// Full fade length
pub const FADE_DURATION: Duration = Duration::from_millis(1000);

/// Discrete steps per fade (50 steps over 1000 ms gives a 20 ms tick)
pub const FADE_STEPS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// Fade timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    duration: Duration,
    steps: u32,
}

impl FadeSettings {
    pub fn new(duration: Duration, steps: u32) -> Self {
        Self {
            duration,
            steps: steps.max(1),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Time between two volume steps
    pub fn interval(&self) -> Duration {
        self.duration / self.steps
    }
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self::new(FADE_DURATION, FADE_STEPS)
    }
}

/// Cancellation handle for a started fade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FadeTicket {
    handle: HandleId,
    generation: u64,
}

impl FadeTicket {
    pub fn handle(&self) -> HandleId {
        self.handle
    }
}

/// A fade that ran to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeCompletion {
    pub ticket: FadeTicket,
    pub direction: FadeDirection,
}

/// Runs after a completed fade-out has paused and rewound its handle
pub type FadeCallback = Box<dyn FnOnce()>;

struct FadeJob {
    ticket: FadeTicket,
    direction: FadeDirection,
    start_volume: f32,
    target_volume: f32,
    step_size: f32,
    steps_elapsed: u32,
    steps_total: u32,
    carry: Duration,
    on_complete: Option<FadeCallback>,
}

impl FadeJob {
    fn level_at(&self, step: u32) -> f32 {
        if step >= self.steps_total {
            return self.target_volume;
        }
        let raw = self.start_volume + self.step_size * step as f32;
        // Bound toward the target so float drift never overshoots
        if self.target_volume >= self.start_volume {
            raw.min(self.target_volume)
        } else {
            raw.max(self.target_volume)
        }
    }

    fn is_done(&self) -> bool {
        self.steps_elapsed >= self.steps_total
    }
}

pub struct FadeController {
    settings: FadeSettings,
    jobs: HashMap<HandleId, FadeJob>,
    next_generation: u64,
}

impl FadeController {
    pub fn new(settings: FadeSettings) -> Self {
        Self {
            settings,
            jobs: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn settings(&self) -> FadeSettings {
        self.settings
    }

    /// Ramp `handle` from silence up to `target`.
    ///
    /// Playback is started at the beginning of the ramp if the handle was
    /// paused. The returned attempt may still fail (output policy); the ramp
    /// carries on regardless.
    pub fn fade_in(
        &mut self,
        id: HandleId,
        handle: &mut dyn AudioHandle,
        target: f32,
    ) -> (FadeTicket, Option<PlayAttempt>) {
        let ticket = self.install(id, FadeDirection::In, 0.0, clamp_volume(target), None);

        handle.set_volume(0.0);
        let attempt = handle.is_paused().then(|| handle.play());
        (ticket, attempt)
    }

    /// Ramp `handle` from its current volume down to silence, then pause and
    /// rewind it before `on_complete` runs.
    pub fn fade_out(
        &mut self,
        id: HandleId,
        handle: &dyn AudioHandle,
        on_complete: Option<FadeCallback>,
    ) -> FadeTicket {
        self.install(id, FadeDirection::Out, handle.volume(), 0.0, on_complete)
    }

    fn install(
        &mut self,
        id: HandleId,
        direction: FadeDirection,
        start_volume: f32,
        target_volume: f32,
        on_complete: Option<FadeCallback>,
    ) -> FadeTicket {
        if let Some(previous) = self.jobs.remove(&id) {
            tracing::debug!(
                "Fade {:?} on {} superseded at step {}/{}",
                previous.direction,
                id,
                previous.steps_elapsed,
                previous.steps_total
            );
        }

        let ticket = FadeTicket {
            handle: id,
            generation: self.next_generation,
        };
        self.next_generation += 1;

        let steps_total = self.settings.steps;
        self.jobs.insert(
            id,
            FadeJob {
                ticket,
                direction,
                start_volume,
                target_volume,
                step_size: (target_volume - start_volume) / steps_total as f32,
                steps_elapsed: 0,
                steps_total,
                carry: Duration::ZERO,
                on_complete,
            },
        );

        tracing::debug!(
            "Fade {:?} on {}: {:.2} -> {:.2} over {:?}",
            direction,
            id,
            start_volume,
            target_volume,
            self.settings.duration
        );
        ticket
    }

    /// Stop the fade on a handle, leaving its volume where it is
    pub fn cancel(&mut self, id: HandleId) -> Option<FadeDirection> {
        self.jobs.remove(&id).map(|job| {
            tracing::debug!("Fade {:?} on {} cancelled", job.direction, id);
            job.direction
        })
    }

    /// Drop every fade without running callbacks
    pub fn cancel_all(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }

    /// Whether the fade behind `ticket` is still the one running
    pub fn is_active(&self, ticket: FadeTicket) -> bool {
        self.jobs
            .get(&ticket.handle)
            .is_some_and(|job| job.ticket == ticket)
    }

    pub fn active_direction(&self, id: HandleId) -> Option<FadeDirection> {
        self.jobs.get(&id).map(|job| job.direction)
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    /// Advance every running fade by `elapsed`.
    ///
    /// Each elapsed interval is one step; every step writes the mute-gated
    /// level to the handle.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        volume: &VolumeState,
        handles: &mut HandleTable,
    ) -> Vec<FadeCompletion> {
        let interval = self.settings.interval();
        let mut finished = Vec::new();
        let mut orphaned = Vec::new();

        for (id, job) in self.jobs.iter_mut() {
            let Some(handle) = handles.get_mut(*id) else {
                orphaned.push(*id);
                continue;
            };

            job.carry += elapsed;
            while !job.is_done() && (interval.is_zero() || job.carry >= interval) {
                job.carry = job.carry.saturating_sub(interval);
                job.steps_elapsed += 1;
                handle.set_volume(volume.gate(job.level_at(job.steps_elapsed)));
            }

            if job.is_done() {
                finished.push(*id);
            }
        }

        for id in orphaned {
            self.jobs.remove(&id);
            tracing::debug!("Dropped fade on released handle {}", id);
        }

        let mut completions = Vec::with_capacity(finished.len());
        for id in finished {
            let Some(mut job) = self.jobs.remove(&id) else {
                continue;
            };

            if job.direction == FadeDirection::Out {
                if let Some(handle) = handles.get_mut(id) {
                    handle.stop();
                }
            }
            if let Some(callback) = job.on_complete.take() {
                callback();
            }

            tracing::debug!("Fade {:?} on {} complete", job.direction, id);
            completions.push(FadeCompletion {
                ticket: job.ticket,
                direction: job.direction,
            });
        }

        completions
    }
}

impl Default for FadeController {
    fn default() -> Self {
        Self::new(FadeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::memory::{HandleProbe, MemoryHandle, PlayPolicy};
    use approx::assert_relative_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_millis(20);

    fn table_with(locator: &str, policy: PlayPolicy) -> (HandleTable, HandleId, HandleProbe) {
        let handle = MemoryHandle::with_policy(locator, policy);
        let probe = handle.probe();
        let mut table = HandleTable::new();
        let id = table.insert(Box::new(handle));
        (table, id, probe)
    }

    #[test]
    fn test_default_settings_tick() {
        let settings = FadeSettings::default();
        assert_eq!(settings.steps(), 50);
        assert_eq!(settings.interval(), TICK);
        assert_eq!(FadeSettings::new(FADE_DURATION, 0).steps(), 1);
    }

    #[test]
    fn test_fade_in_ramps_linearly_and_starts_playback() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(0.5);

        let (ticket, attempt) = fades.fade_in(id, table.get_mut(id).unwrap(), 0.5);
        assert!(attempt.is_some());
        assert!(!probe.is_paused());
        assert_eq!(probe.volume(), 0.0);

        fades.advance(TICK * 10, &volume, &mut table);
        assert_relative_eq!(probe.volume(), 0.1, epsilon = 1e-5);
        assert!(fades.is_active(ticket));

        let done = fades.advance(TICK * 40, &volume, &mut table);
        assert_relative_eq!(probe.volume(), 0.5, epsilon = 1e-5);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].direction, FadeDirection::In);
        assert!(!fades.is_active(ticket));
        assert_eq!(fades.active_count(), 0);
    }

    #[test]
    fn test_partial_interval_carries_over() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(1.0);

        fades.fade_in(id, table.get_mut(id).unwrap(), 1.0);
        fades.advance(Duration::from_millis(15), &volume, &mut table);
        assert_eq!(probe.volume(), 0.0);

        fades.advance(Duration::from_millis(5), &volume, &mut table);
        assert_relative_eq!(probe.volume(), 0.02, epsilon = 1e-5);
    }

    #[test]
    fn test_fade_out_pauses_and_rewinds_before_callback() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(0.4);

        let handle = table.get_mut(id).unwrap();
        handle.set_volume(0.4);
        let _ = handle.play();
        probe.seek(Duration::from_secs(12));

        let observed = Rc::new(Cell::new(None));
        let observer = Rc::clone(&observed);
        let callback_probe = probe.clone();
        let callback: FadeCallback = Box::new(move || {
            observer.set(Some((
                callback_probe.is_paused(),
                callback_probe.position(),
                callback_probe.volume(),
            )));
        });

        fades.fade_out(id, table.get(id).unwrap(), Some(callback));
        fades.advance(TICK * 25, &volume, &mut table);
        assert_relative_eq!(probe.volume(), 0.2, epsilon = 1e-5);
        assert!(observed.get().is_none());

        fades.advance(TICK * 25, &volume, &mut table);
        assert_eq!(observed.get(), Some((true, Duration::ZERO, 0.0)));
    }

    #[test]
    fn test_second_fade_replaces_first() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(0.8);

        let handle = table.get_mut(id).unwrap();
        handle.set_volume(0.8);
        let _ = handle.play();

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let first = fades.fade_out(id, table.get(id).unwrap(), Some(Box::new(move || flag.set(true))));
        fades.advance(TICK * 5, &volume, &mut table);

        let (second, _) = fades.fade_in(id, table.get_mut(id).unwrap(), 0.8);
        assert!(!fades.is_active(first));
        assert!(fades.is_active(second));
        assert_eq!(fades.active_count(), 1);

        // One write per tick, not one per fade
        probe.reset_volume_writes();
        fades.advance(TICK, &volume, &mut table);
        assert_eq!(probe.volume_writes(), 1);

        fades.advance(FADE_DURATION, &volume, &mut table);
        assert!(!fired.get());
        assert!(!probe.is_paused());
        assert_relative_eq!(probe.volume(), 0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_rejected_play_does_not_stop_ramp() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Reject);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(0.3);

        let (_, attempt) = fades.fade_in(id, table.get_mut(id).unwrap(), 0.3);
        assert!(attempt.unwrap().try_settle().unwrap().is_err());

        fades.advance(FADE_DURATION, &volume, &mut table);
        assert_relative_eq!(probe.volume(), 0.3, epsilon = 1e-5);
        assert!(probe.is_paused());
    }

    #[test]
    fn test_muted_ticks_write_silence() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let mut volume = VolumeState::new(0.6);
        volume.set_muted(true);

        fades.fade_in(id, table.get_mut(id).unwrap(), 0.6);
        fades.advance(TICK * 20, &volume, &mut table);
        assert_eq!(probe.volume(), 0.0);
        assert!(probe.volume_writes() > 1);
    }

    #[test]
    fn test_zero_duration_completes_on_next_advance() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::new(FadeSettings::new(Duration::ZERO, 10));
        let volume = VolumeState::new(0.9);

        fades.fade_in(id, table.get_mut(id).unwrap(), 0.9);
        let done = fades.advance(Duration::ZERO, &volume, &mut table);
        assert_eq!(done.len(), 1);
        assert_relative_eq!(probe.volume(), 0.9, epsilon = 1e-5);
    }

    #[test]
    fn test_released_handle_drops_job() {
        let (mut table, id, _probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();

        fades.fade_in(id, table.get_mut(id).unwrap(), 0.5);
        table.remove(id);

        let done = fades.advance(TICK, &VolumeState::default(), &mut table);
        assert!(done.is_empty());
        assert_eq!(fades.active_count(), 0);
    }

    #[test]
    fn test_cancel_leaves_volume() {
        let (mut table, id, probe) = table_with("/music.mp3", PlayPolicy::Accept);
        let mut fades = FadeController::default();
        let volume = VolumeState::new(1.0);

        fades.fade_in(id, table.get_mut(id).unwrap(), 1.0);
        fades.advance(TICK * 10, &volume, &mut table);
        assert_eq!(fades.cancel(id), Some(FadeDirection::In));
        assert_eq!(fades.cancel(id), None);

        let level = probe.volume();
        fades.advance(TICK * 10, &volume, &mut table);
        assert_eq!(probe.volume(), level);
    }
}
