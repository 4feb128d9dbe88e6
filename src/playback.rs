use std::time::Duration;

use crate::{
    audio::{AudioBackend, PlayAttempt, PlayTrigger, PlaybackError, Timeline},
    tracks::{Track, TrackRegistry},
};

pub const DEFAULT_VOLUME: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub current_track_index: usize,
    pub is_playing: bool,
    pub volume: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current_track_index: 0,
            is_playing: false,
            volume: DEFAULT_VOLUME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayOrigin {
    Autoplay,
    Unlock,
    Toggle,
    Select,
}

/// One-shot deferred start, armed when autoplay is refused.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct AutoplayUnlock {
    armed: bool,
}

impl AutoplayUnlock {
    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Returns `true` exactly once per arming.
    fn fire(&mut self) -> bool {
        std::mem::take(&mut self.armed)
    }
}

struct PendingPlay {
    intent: u64,
    origin: PlayOrigin,
    attempt: PlayAttempt,
}

/// Owns the audio handle and mediates every transport operation.
///
/// Every explicit action bumps `intent`; play outcomes that belong to an older
/// intent are dropped so the most recent user action decides what the widget
/// shows.
pub struct PlaybackController<B> {
    backend: B,
    registry: TrackRegistry,
    state: PlayerState,
    highlighted: Option<usize>,
    intent: u64,
    pending: Vec<PendingPlay>,
    unlock: AutoplayUnlock,
    timeline: Option<Timeline>,
    interruptions_seen: u64,
}

impl<B: AudioBackend> PlaybackController<B> {
    /// Binds the backend to the first track (or `override_first`), enables
    /// looping, applies `volume` and attempts to autoplay.
    pub fn initialize(
        backend: B,
        mut registry: TrackRegistry,
        override_first: Option<Track>,
        volume: f32,
    ) -> Self {
        if let Some(track) = override_first {
            registry.override_first(track.audio_locator, track.display_name);
        }

        let mut controller = Self {
            backend,
            registry,
            state: PlayerState::default(),
            highlighted: None,
            intent: 0,
            pending: Vec::new(),
            unlock: AutoplayUnlock::default(),
            timeline: None,
            interruptions_seen: 0,
        };

        controller.backend.set_looping(true);
        controller.set_volume(volume);

        let Ok(first) = controller.registry.get(0) else {
            tracing::warn!("playlist is empty, nothing to play");
            return controller;
        };
        tracing::info!(track = %first, "loading first track");
        let locator = first.audio_locator.clone();
        controller.backend.load(&locator);
        controller.registry.seal();

        let attempt = controller.backend.play(PlayTrigger::Autoplay);
        controller.track(PlayOrigin::Autoplay, attempt);
        controller
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn unlock_armed(&self) -> bool {
        self.unlock.armed
    }

    fn has_pending_play(&self) -> bool {
        self.pending.iter().any(|p| p.intent == self.intent)
    }

    fn track(&mut self, origin: PlayOrigin, attempt: PlayAttempt) {
        self.pending.push(PendingPlay {
            intent: self.intent,
            origin,
            attempt,
        });
    }

    pub fn toggle_play_pause(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        let play_in_flight = self.has_pending_play();
        self.intent += 1;
        self.unlock.disarm();

        // A toggle while a play request is in flight counts as a pause.
        if self.state.is_playing || play_in_flight {
            self.backend.pause();
            self.state.is_playing = false;
            tracing::debug!("paused");
        } else {
            let attempt = self.backend.play(PlayTrigger::User);
            self.track(PlayOrigin::Toggle, attempt);
        }
    }

    pub fn select_track(&mut self, index: usize) {
        let locator = match self.registry.get(index) {
            Ok(track) => track.audio_locator.clone(),
            Err(err) => {
                debug_assert!(false, "{err}");
                tracing::error!("ignoring track selection: {err}");
                return;
            }
        };

        self.intent += 1;
        self.unlock.disarm();
        self.backend.load(&locator);
        let attempt = self.backend.play(PlayTrigger::User);
        self.track(PlayOrigin::Select, attempt);

        self.state.current_track_index = index;
        self.state.is_playing = true;
        self.highlighted = Some(index);
        self.timeline = None;
        tracing::info!(index, %locator, "track selected");
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            self.state.volume
        };
        self.state.volume = volume;
        self.backend.set_volume(volume);
    }

    /// Seeks inside the current track. Ignored when the length is unknown.
    pub fn seek(&mut self, position_secs: f64) {
        let Some(timeline) = self.timeline.as_mut() else {
            return;
        };
        if !timeline.can_seek || !position_secs.is_finite() {
            return;
        }
        let target = position_secs.clamp(0.0, timeline.duration_secs());
        timeline.position_secs = target;
        self.backend.seek(Duration::from_secs_f64(target));
    }

    /// First pointer press anywhere in the window. Starts playback if
    /// autoplay was refused earlier; fires at most once.
    pub fn on_user_interaction(&mut self) -> bool {
        if !self.unlock.fire() {
            return false;
        }
        tracing::info!("user interaction received, starting deferred playback");
        self.intent += 1;
        let attempt = self.backend.play(PlayTrigger::User);
        self.track(PlayOrigin::Unlock, attempt);
        true
    }

    /// Applies settled play attempts and the latest progress report.
    /// Returns `true` when anything visible changed.
    pub fn poll(&mut self) -> bool {
        // Reports are read before outcomes: a stop reported earlier than a
        // later successful play must not override it.
        let mut changed = false;
        if let Some(timeline) = self.backend.poll_timeline() {
            if timeline.interruptions > self.interruptions_seen {
                self.interruptions_seen = timeline.interruptions;
                if self.state.is_playing {
                    tracing::warn!("playback stopped by the audio output");
                    self.state.is_playing = false;
                    changed = true;
                }
            }
            changed |= self.timeline.as_ref() != Some(&timeline);
            self.timeline = Some(timeline);
        }

        let mut settled = Vec::new();
        self.pending.retain_mut(|pending| match pending.attempt.try_recv() {
            Ok(None) => true,
            Ok(Some(result)) => {
                settled.push((pending.intent, pending.origin, result));
                false
            }
            Err(_) => {
                settled.push((pending.intent, pending.origin, Err(PlaybackError::WorkerGone)));
                false
            }
        });
        settled.sort_by_key(|(intent, _, _)| *intent);

        changed |= !settled.is_empty();
        for (intent, origin, result) in settled {
            self.resolve(intent, origin, result);
        }
        changed
    }

    fn resolve(&mut self, intent: u64, origin: PlayOrigin, result: Result<(), PlaybackError>) {
        if intent != self.intent {
            tracing::debug!(?origin, ?result, "stale play outcome ignored");
            return;
        }

        match result {
            Ok(()) => {
                self.state.is_playing = true;
                self.highlighted = Some(self.state.current_track_index);
            }
            Err(PlaybackError::AutoplayBlocked) if origin == PlayOrigin::Autoplay => {
                tracing::info!("autoplay prevented, waiting for interaction");
                self.unlock.arm();
            }
            Err(err) => {
                tracing::warn!(?origin, "play request failed: {err}");
                self.state.is_playing = false;
            }
        }
    }

    #[cfg(test)]
    fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String),
        Play(PlayTrigger),
        Pause,
        Volume(f32),
        Looping(bool),
        Seek(Duration),
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Vec<Call>,
        replies: VecDeque<oneshot::Sender<Result<(), PlaybackError>>>,
        timeline: Option<Timeline>,
    }

    impl FakeBackend {
        fn resolve_next(&mut self, result: Result<(), PlaybackError>) {
            let reply = self.replies.pop_front().expect("no pending play");
            reply.send(result).expect("attempt dropped");
        }

        fn plays(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Play(_)))
                .count()
        }

        fn last_load(&self) -> Option<&str> {
            self.calls.iter().rev().find_map(|c| match c {
                Call::Load(locator) => Some(locator.as_str()),
                _ => None,
            })
        }
    }

    impl AudioBackend for FakeBackend {
        fn load(&mut self, locator: &str) {
            self.calls.push(Call::Load(locator.to_owned()));
        }

        fn play(&mut self, trigger: PlayTrigger) -> PlayAttempt {
            self.calls.push(Call::Play(trigger));
            let (tx, rx) = oneshot::channel();
            self.replies.push_back(tx);
            rx
        }

        fn pause(&mut self) {
            self.calls.push(Call::Pause);
        }

        fn set_volume(&mut self, volume: f32) {
            self.calls.push(Call::Volume(volume));
        }

        fn set_looping(&mut self, looping: bool) {
            self.calls.push(Call::Looping(looping));
        }

        fn seek(&mut self, position: Duration) {
            self.calls.push(Call::Seek(position));
        }

        fn poll_timeline(&mut self) -> Option<Timeline> {
            self.timeline.take()
        }
    }

    fn controller() -> PlaybackController<FakeBackend> {
        PlaybackController::initialize(
            FakeBackend::default(),
            TrackRegistry::default(),
            None,
            DEFAULT_VOLUME,
        )
    }

    fn playing_controller() -> PlaybackController<FakeBackend> {
        let mut controller = controller();
        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(controller.state().is_playing);
        controller
    }

    #[test]
    fn initialize_binds_first_track_and_attempts_autoplay() {
        let controller = controller();
        let calls = &controller.backend.calls;
        assert_eq!(calls[0], Call::Looping(true));
        assert_eq!(calls[1], Call::Volume(0.5));
        assert_eq!(
            calls[2],
            Call::Load("https://cdn.pixabay.com/audio/2022/08/02/audio_884fe92c21.mp3".into())
        );
        assert_eq!(calls[3], Call::Play(PlayTrigger::Autoplay));
        assert!(!controller.state().is_playing);
        assert_eq!(controller.highlighted(), None);
        assert!(controller.tracks().is_sealed());
    }

    #[test]
    fn autoplay_success_highlights_first_track() {
        let controller = playing_controller();
        assert_eq!(controller.highlighted(), Some(0));
        assert!(!controller.unlock_armed());
    }

    #[test]
    fn override_replaces_first_locator() {
        let controller = PlaybackController::initialize(
            FakeBackend::default(),
            TrackRegistry::default(),
            Some(Track::new("Chủ Đề", "file:///srv/theme.ogg")),
            0.5,
        );
        assert_eq!(controller.backend.last_load(), Some("file:///srv/theme.ogg"));
        assert_eq!(controller.tracks().get(0).unwrap().display_name, "Chủ Đề");
    }

    #[test]
    fn blocked_autoplay_starts_on_first_interaction_only_once() {
        let mut controller = controller();
        controller
            .backend_mut()
            .resolve_next(Err(PlaybackError::AutoplayBlocked));
        controller.poll();
        assert!(controller.unlock_armed());
        assert!(!controller.state().is_playing);

        assert!(controller.on_user_interaction());
        assert!(!controller.on_user_interaction());
        assert_eq!(controller.backend.plays(), 2);
        assert_eq!(
            controller.backend.calls.last(),
            Some(&Call::Play(PlayTrigger::User))
        );

        controller.backend_mut().resolve_next(Ok(()));
        assert!(controller.poll());
        assert!(controller.state().is_playing);
        assert_eq!(controller.highlighted(), Some(0));
    }

    #[test]
    fn interaction_without_blocked_autoplay_does_nothing() {
        let mut controller = playing_controller();
        assert!(!controller.on_user_interaction());
        assert_eq!(controller.backend.plays(), 1);
    }

    #[test]
    fn explicit_play_disarms_unlock() {
        let mut controller = controller();
        controller
            .backend_mut()
            .resolve_next(Err(PlaybackError::AutoplayBlocked));
        controller.poll();

        controller.toggle_play_pause();
        assert!(!controller.unlock_armed());
        assert!(!controller.on_user_interaction());
    }

    #[test]
    fn toggle_pauses_immediately_when_playing() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        assert!(!controller.state().is_playing);
        assert_eq!(controller.backend.calls.last(), Some(&Call::Pause));
    }

    #[test]
    fn toggle_plays_only_after_resolution() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        assert!(!controller.state().is_playing);

        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(controller.state().is_playing);
    }

    #[test]
    fn double_toggle_restores_paused_state() {
        let mut controller = controller();
        controller
            .backend_mut()
            .resolve_next(Err(PlaybackError::AutoplayBlocked));
        controller.poll();

        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn double_toggle_restores_playing_state() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(controller.state().is_playing);
    }

    #[test]
    fn rejected_toggle_leaves_state_unchanged() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller
            .backend_mut()
            .resolve_next(Err(PlaybackError::OutputUnavailable("no device".into())));
        controller.poll();
        assert!(!controller.state().is_playing);
        assert!(!controller.unlock_armed());
    }

    #[test]
    fn late_outcome_does_not_override_newer_action() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn selecting_a_row_switches_source_and_highlight() {
        let mut controller = playing_controller();
        controller.select_track(2);

        assert_eq!(
            controller.backend.last_load(),
            Some("https://cdn.pixabay.com/audio/2023/01/01/audio_8162594411.mp3")
        );
        assert_eq!(
            controller.backend.calls.last(),
            Some(&Call::Play(PlayTrigger::User))
        );
        let state = controller.state();
        assert_eq!(state.current_track_index, 2);
        assert!(state.is_playing);
        let highlighted: Vec<_> = (0..controller.tracks().len())
            .filter(|&row| controller.highlighted() == Some(row))
            .collect();
        assert_eq!(highlighted, vec![2]);
    }

    #[test]
    fn every_valid_selection_highlights_exactly_that_row() {
        let mut controller = controller();
        for index in [1, 0, 2, 2, 1] {
            controller.select_track(index);
            assert_eq!(controller.state().current_track_index, index);
            assert_eq!(controller.highlighted(), Some(index));
        }
    }

    #[test]
    fn failed_selection_reverts_playing_flag() {
        let mut controller = playing_controller();
        controller.select_track(1);
        controller.backend_mut().resolve_next(Err(PlaybackError::Decode {
            locator: "x".into(),
            reason: "bad header".into(),
        }));
        controller.poll();
        assert!(!controller.state().is_playing);
        assert_eq!(controller.highlighted(), Some(1));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn out_of_range_selection_is_a_noop_in_release() {
        let mut controller = playing_controller();
        controller.select_track(7);
        assert_eq!(controller.state().current_track_index, 0);
        assert_eq!(controller.highlighted(), Some(0));
    }

    #[test]
    fn volume_is_clamped() {
        let mut controller = controller();
        controller.set_volume(3.0);
        assert_eq!(controller.state().volume, 1.0);
        controller.set_volume(-0.2);
        assert_eq!(controller.state().volume, 0.0);
        controller.set_volume(0.7);
        assert_eq!(controller.state().volume, 0.7);
        controller.set_volume(f32::NAN);
        assert_eq!(controller.state().volume, 0.7);
        assert_eq!(controller.backend.calls.last(), Some(&Call::Volume(0.7)));
    }

    #[test]
    fn seek_clamps_to_track_length() {
        let mut controller = playing_controller();
        controller.backend_mut().timeline = Some(Timeline {
            position_secs: 3.0,
            end_secs: 120.0,
            can_seek: true,
            ..Default::default()
        });
        assert!(controller.poll());

        controller.seek(500.0);
        assert_eq!(
            controller.backend.calls.last(),
            Some(&Call::Seek(Duration::from_secs(120)))
        );
        assert_eq!(controller.timeline().unwrap().position_secs, 120.0);
    }

    #[test]
    fn output_stop_clears_playing_flag() {
        let mut controller = playing_controller();
        controller.backend_mut().timeline = Some(Timeline {
            position_secs: 30.0,
            end_secs: 30.0,
            can_seek: true,
            interruptions: 1,
        });
        assert!(controller.poll());
        assert!(!controller.state().is_playing);

        // The same report again changes nothing.
        controller.backend_mut().timeline = Some(Timeline {
            position_secs: 30.0,
            end_secs: 30.0,
            can_seek: true,
            interruptions: 1,
        });
        controller.poll();
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn stop_reported_before_a_new_play_does_not_override_it() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.backend_mut().timeline = Some(Timeline {
            interruptions: 1,
            ..Default::default()
        });
        controller.backend_mut().resolve_next(Ok(()));
        controller.poll();
        assert!(controller.state().is_playing);
    }

    #[test]
    fn seek_without_timeline_is_ignored() {
        let mut controller = playing_controller();
        controller.seek(10.0);
        assert!(!controller
            .backend
            .calls
            .iter()
            .any(|c| matches!(c, Call::Seek(_))));
    }

    #[test]
    fn dropped_attempt_counts_as_failure() {
        let mut controller = playing_controller();
        controller.toggle_play_pause();
        controller.toggle_play_pause();
        controller.backend_mut().replies.clear();
        controller.poll();
        assert!(!controller.state().is_playing);
    }
}
