use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    announce::Announcer,
    counter::RepCounter,
    error::{Error, Result},
    exercise::{ExerciseKind, Gender, ReferenceAverages, reference_averages},
    recorder::{HistoryRow, ResultRecorder},
    types::LandmarkSet,
};

pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_MAX_DURATION_SECS: u64 = 3_600;
const COUNTDOWN_FROM: i64 = 3;

/// Body of a start request, still unvalidated.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub exercise: String,
    #[serde(default)]
    pub duration: Option<u64>,
}

impl StartRequest {
    pub fn new(gender: &str, exercise: &str, duration: u64) -> Self {
        Self {
            gender: gender.to_string(),
            exercise: exercise.to_string(),
            duration: Some(duration),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSettings {
    pub exercise: ExerciseKind,
    pub gender: Gender,
    pub duration_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionResult {
    pub exercise: ExerciseKind,
    pub gender: Gender,
    pub reps: u32,
    pub duration_secs: u64,
    pub averages: Option<ReferenceAverages>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Countdown(u64),
    Completed(SessionResult),
}

impl SessionEvent {
    pub fn announcement(&self) -> String {
        match self {
            SessionEvent::Countdown(second) => second.to_string(),
            SessionEvent::Completed(_) => "Stop! Time's up".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepCounts {
    pub pushups: u32,
    pub squats: u32,
    pub crunches: u32,
}

/// Point-in-time view of the session for the overlay and status endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    pub exercise: Option<ExerciseKind>,
    pub gender: Option<Gender>,
    pub elapsed_secs: u64,
    pub remaining_secs: i64,
    pub counts: RepCounts,
}

struct Counters([RepCounter; 3]);

impl Counters {
    fn fresh() -> Self {
        Counters(ExerciseKind::ALL.map(RepCounter::new))
    }

    fn get(&self, kind: ExerciseKind) -> &RepCounter {
        &self.0[slot(kind)]
    }

    fn get_mut(&mut self, kind: ExerciseKind) -> &mut RepCounter {
        &mut self.0[slot(kind)]
    }

    fn counts(&self) -> RepCounts {
        RepCounts {
            pushups: self.get(ExerciseKind::Pushups).count(),
            squats: self.get(ExerciseKind::Squats).count(),
            crunches: self.get(ExerciseKind::Crunches).count(),
        }
    }
}

fn slot(kind: ExerciseKind) -> usize {
    match kind {
        ExerciseKind::Pushups => 0,
        ExerciseKind::Squats => 1,
        ExerciseKind::Crunches => 2,
    }
}

/// Timed assessment state machine.
///
/// Idle until a valid start request arrives, then Active until the wall clock
/// passes the configured duration. Completion happens exactly once per start
/// and leaves the session Idle with `last_result` set.
pub struct ExerciseSession {
    active: bool,
    settings: Option<SessionSettings>,
    started_at: Option<Instant>,
    counters: Counters,
    announced: BTreeSet<u64>,
    last_result: Option<SessionResult>,
    max_duration_secs: u64,
}

impl Default for ExerciseSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DURATION_SECS)
    }
}

impl ExerciseSession {
    pub fn new(max_duration_secs: u64) -> Self {
        Self {
            active: false,
            settings: None,
            started_at: None,
            counters: Counters::fresh(),
            announced: BTreeSet::new(),
            last_result: None,
            max_duration_secs,
        }
    }

    pub fn validate(&self, request: &StartRequest) -> Result<SessionSettings> {
        let gender: Gender = request.gender.parse()?;
        let exercise: ExerciseKind = request.exercise.parse()?;
        let duration_secs = request.duration.unwrap_or(DEFAULT_DURATION_SECS);
        if duration_secs == 0 || duration_secs > self.max_duration_secs {
            return Err(Error::InvalidParams(format!(
                "duration must be between 1 and {} seconds",
                self.max_duration_secs
            )));
        }
        Ok(SessionSettings {
            exercise,
            gender,
            duration_secs,
        })
    }

    /// Validates and starts a new session. A rejected request leaves the
    /// session exactly as it was.
    pub fn start(&mut self, request: &StartRequest, now: Instant) -> Result<SessionSettings> {
        let settings = self.validate(request)?;
        self.counters = Counters::fresh();
        self.announced.clear();
        self.settings = Some(settings);
        self.started_at = Some(now);
        self.active = true;
        Ok(settings)
    }

    /// Advances the session by one processed frame.
    pub fn tick(
        &mut self,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Option<SessionEvent> {
        if !self.active {
            return None;
        }
        let settings = self.settings?;
        let remaining = self.remaining_secs(now);

        if remaining <= 0 {
            self.active = false;
            let reps = self.counters.get(settings.exercise).count();
            let result = SessionResult {
                exercise: settings.exercise,
                gender: settings.gender,
                reps,
                duration_secs: settings.duration_secs,
                averages: reference_averages(settings.exercise, settings.gender),
            };
            self.last_result = Some(result.clone());
            return Some(SessionEvent::Completed(result));
        }

        if remaining <= COUNTDOWN_FROM {
            let second = remaining as u64;
            return self
                .announced
                .insert(second)
                .then_some(SessionEvent::Countdown(second));
        }

        self.counters
            .get_mut(settings.exercise)
            .step(landmarks, width, height);
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn settings(&self) -> Option<SessionSettings> {
        self.settings
    }

    pub fn count(&self, kind: ExerciseKind) -> u32 {
        self.counters.get(kind).count()
    }

    pub fn last_result(&self) -> Option<&SessionResult> {
        self.last_result.as_ref()
    }

    pub fn snapshot(&self, now: Instant) -> SessionStatus {
        SessionStatus {
            active: self.active,
            exercise: self.settings.map(|s| s.exercise),
            gender: self.settings.map(|s| s.gender),
            elapsed_secs: if self.active {
                self.elapsed(now).as_secs()
            } else {
                0
            },
            // Stays active past the deadline until a tick with landmarks arrives.
            remaining_secs: if self.active {
                self.remaining_secs(now).max(0)
            } else {
                0
            },
            counts: self.counters.counts(),
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Whole seconds left, truncated toward zero.
    fn remaining_secs(&self, now: Instant) -> i64 {
        let duration = self.settings.map_or(0, |s| s.duration_secs) as f64;
        (duration - self.elapsed(now).as_secs_f64()).trunc() as i64
    }
}

/// Shared, serialized access to the process-wide session.
///
/// Every operation takes the session lock once; announcements and history
/// writes happen after the lock is released.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<ExerciseSession>>,
    announcer: Announcer,
    recorder: Arc<dyn ResultRecorder>,
}

impl SessionHandle {
    pub fn new(
        session: ExerciseSession,
        announcer: Announcer,
        recorder: Arc<dyn ResultRecorder>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
            announcer,
            recorder,
        }
    }

    pub fn start(&self, request: &StartRequest) -> Result<SessionSettings> {
        self.start_at(request, Instant::now())
    }

    pub fn start_at(&self, request: &StartRequest, now: Instant) -> Result<SessionSettings> {
        let settings = self.inner.lock().start(request, now)?;
        log::info!(
            "{} test started for {} ({}s)",
            settings.exercise,
            settings.gender,
            settings.duration_secs
        );
        self.announcer.announce(format!(
            "{} test started. Go!",
            settings.exercise.display_name()
        ));
        Ok(settings)
    }

    pub fn tick(&self, landmarks: &LandmarkSet, width: u32, height: u32) -> Option<SessionEvent> {
        self.tick_at(landmarks, width, height, Instant::now())
    }

    pub fn tick_at(
        &self,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Option<SessionEvent> {
        let event = self.inner.lock().tick(landmarks, width, height, now)?;
        if let SessionEvent::Completed(result) = &event {
            log::info!(
                "{} test finished: {} reps in {}s",
                result.exercise,
                result.reps,
                result.duration_secs
            );
            if let Err(err) = self.recorder.record(result) {
                log::error!("failed to record session result: {err}");
            }
        }
        self.announcer.announce(event.announcement());
        Some(event)
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().is_active()
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> SessionStatus {
        self.inner.lock().snapshot(now)
    }

    pub fn last_result(&self) -> Option<SessionResult> {
        self.inner.lock().last_result().cloned()
    }

    pub fn history(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        self.recorder.recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, PoseLandmark};

    fn elbow_pose(angle_deg: f32) -> LandmarkSet {
        let mut points = vec![Landmark::new(0.5, 0.5, 1.0); PoseLandmark::COUNT];
        let elbow = (0.5, 0.5);
        let rad = angle_deg.to_radians();
        points[PoseLandmark::RightElbow.index()] = Landmark::new(elbow.0, elbow.1, 1.0);
        points[PoseLandmark::RightShoulder.index()] = Landmark::new(elbow.0 + 0.2, elbow.1, 1.0);
        points[PoseLandmark::RightWrist.index()] =
            Landmark::new(elbow.0 + 0.2 * rad.cos(), elbow.1 + 0.2 * rad.sin(), 1.0);
        LandmarkSet::new(points)
    }

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn rejected_start_leaves_state_alone() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "pushups", 30), t0)
            .unwrap();
        session.tick(&elbow_pose(80.0), 100, 100, at(t0, 1.0));
        session.tick(&elbow_pose(170.0), 100, 100, at(t0, 2.0));
        assert_eq!(session.count(ExerciseKind::Pushups), 1);

        for bad in [
            StartRequest::new("male", "lunges", 30),
            StartRequest::new("robot", "squats", 30),
            StartRequest::new("female", "squats", 0),
            StartRequest::new("female", "squats", DEFAULT_MAX_DURATION_SECS + 1),
        ] {
            assert!(matches!(
                session.start(&bad, at(t0, 3.0)),
                Err(Error::InvalidParams(_))
            ));
        }

        assert!(session.is_active());
        assert_eq!(session.settings().unwrap().exercise, ExerciseKind::Pushups);
        assert_eq!(session.count(ExerciseKind::Pushups), 1);
    }

    #[test]
    fn missing_duration_defaults_to_a_minute() {
        let mut session = ExerciseSession::default();
        let request = StartRequest {
            gender: "female".into(),
            exercise: "crunches".into(),
            duration: None,
        };
        let settings = session.start(&request, Instant::now()).unwrap();
        assert_eq!(settings.duration_secs, DEFAULT_DURATION_SECS);
    }

    #[test]
    fn start_resets_counters_and_countdown() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "pushups", 5), t0)
            .unwrap();
        session.tick(&elbow_pose(80.0), 100, 100, at(t0, 0.5));
        session.tick(&elbow_pose(170.0), 100, 100, at(t0, 1.0));
        assert_eq!(
            session.tick(&elbow_pose(170.0), 100, 100, at(t0, 2.5)),
            Some(SessionEvent::Countdown(2))
        );

        let t1 = at(t0, 2.6);
        session
            .start(&StartRequest::new("male", "pushups", 5), t1)
            .unwrap();
        assert_eq!(session.snapshot(t1).counts, RepCounts::default());
        // Second 2 may be announced again in the new session.
        assert_eq!(
            session.tick(&elbow_pose(170.0), 100, 100, at(t1, 2.5)),
            Some(SessionEvent::Countdown(2))
        );
    }

    #[test]
    fn countdown_fires_once_per_second_and_completion_once() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("female", "squats", 5), t0)
            .unwrap();

        let mut events = Vec::new();
        let mut t = 0.0;
        while t < 8.0 {
            if let Some(event) = session.tick(&LandmarkSet::default(), 640, 480, at(t0, t)) {
                events.push(event);
            }
            t += 0.1;
        }

        let countdown: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Countdown(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![3, 2, 1]);

        let completions = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
        assert!(!session.is_active());
    }

    #[test]
    fn only_the_selected_exercise_counts() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "squats", 60), t0)
            .unwrap();
        // Elbow motion only; the knee never opens past the squat up threshold.
        for (i, angle) in [170.0, 80.0, 170.0, 80.0, 170.0].iter().enumerate() {
            session.tick(&elbow_pose(*angle), 100, 100, at(t0, i as f64));
        }
        assert_eq!(session.snapshot(at(t0, 5.0)).counts, RepCounts::default());
    }

    #[test]
    fn no_counting_during_the_countdown() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "pushups", 10), t0)
            .unwrap();
        session.tick(&elbow_pose(80.0), 100, 100, at(t0, 7.5));
        session.tick(&elbow_pose(170.0), 100, 100, at(t0, 8.5));
        assert_eq!(session.count(ExerciseKind::Pushups), 0);
    }

    #[test]
    fn completion_snapshots_result_with_averages() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "pushups", 10), t0)
            .unwrap();
        for cycle in 0..3 {
            let base = cycle as f64 * 2.0;
            session.tick(&elbow_pose(170.0), 100, 100, at(t0, base));
            session.tick(&elbow_pose(80.0), 100, 100, at(t0, base + 0.5));
            session.tick(&elbow_pose(170.0), 100, 100, at(t0, base + 1.0));
        }

        let event = session.tick(&elbow_pose(170.0), 100, 100, at(t0, 10.2));
        let Some(SessionEvent::Completed(result)) = event else {
            panic!("expected completion, got {event:?}");
        };
        assert_eq!(result.reps, 3);
        assert_eq!(result.duration_secs, 10);
        assert_eq!(
            result.averages,
            Some(ReferenceAverages {
                normal: 25,
                athlete: 60
            })
        );
        assert_eq!(session.last_result(), Some(&result));

        // Idle sessions ignore further ticks.
        assert_eq!(session.tick(&elbow_pose(80.0), 100, 100, at(t0, 11.0)), None);
    }

    #[test]
    fn last_result_survives_a_new_start() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("female", "crunches", 1), t0)
            .unwrap();
        session.tick(&LandmarkSet::default(), 10, 10, at(t0, 1.0));
        assert!(session.last_result().is_some());

        session
            .start(&StartRequest::new("female", "crunches", 30), at(t0, 2.0))
            .unwrap();
        assert_eq!(
            session.last_result().map(|r| r.exercise),
            Some(ExerciseKind::Crunches)
        );
    }

    #[test]
    fn status_reports_remaining_time() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        assert!(!session.snapshot(t0).active);

        session
            .start(&StartRequest::new("male", "squats", 30), t0)
            .unwrap();
        let status = session.snapshot(at(t0, 12.4));
        assert!(status.active);
        assert_eq!(status.elapsed_secs, 12);
        assert_eq!(status.remaining_secs, 17);
        assert_eq!(status.exercise, Some(ExerciseKind::Squats));
    }

    #[test]
    fn overdue_session_reports_zero_remaining() {
        let mut session = ExerciseSession::default();
        let t0 = Instant::now();
        session
            .start(&StartRequest::new("male", "pushups", 5), t0)
            .unwrap();
        // No tick has happened, so the session has not completed yet.
        let status = session.snapshot(at(t0, 9.0));
        assert!(status.active);
        assert_eq!(status.remaining_secs, 0);
    }
}
