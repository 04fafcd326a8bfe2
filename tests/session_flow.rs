use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rep_counter::{
    announce::{Announcer, SpeechSink},
    exercise::ExerciseKind,
    recorder::{CsvRecorder, HISTORY_HEADER, ResultRecorder},
    session::{ExerciseSession, SessionEvent, SessionHandle, StartRequest},
    types::{Landmark, LandmarkSet, PoseLandmark},
};

#[derive(Clone, Default)]
struct Transcript(Arc<Mutex<Vec<String>>>);

impl SpeechSink for Transcript {
    fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        self.0.lock().push(text.to_string());
        Ok(())
    }
}

/// Right arm with the elbow bent to `angle_deg`.
fn arm(angle_deg: f32) -> LandmarkSet {
    let mut points = vec![Landmark::new(0.5, 0.5, 1.0); PoseLandmark::COUNT];
    let rad = angle_deg.to_radians();
    points[PoseLandmark::RightShoulder.index()] = Landmark::new(0.7, 0.5, 1.0);
    points[PoseLandmark::RightElbow.index()] = Landmark::new(0.5, 0.5, 1.0);
    points[PoseLandmark::RightWrist.index()] =
        Landmark::new(0.5 + 0.2 * rad.cos(), 0.5 + 0.2 * rad.sin(), 1.0);
    LandmarkSet::new(points)
}

fn at(start: Instant, secs: f64) -> Instant {
    start + Duration::from_secs_f64(secs)
}

#[test]
fn pushup_session_is_counted_announced_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("history.csv");
    let recorder = Arc::new(CsvRecorder::open(&log_path).unwrap());

    let transcript = Transcript::default();
    let (announcer, worker) = Announcer::spawn(transcript.clone());
    let session = SessionHandle::new(ExerciseSession::default(), announcer, recorder.clone());

    let t0 = Instant::now();
    session
        .start_at(&StartRequest::new("male", "pushups", 10), t0)
        .unwrap();

    let mut events = Vec::new();
    let mut tick = |angle: f32, secs: f64| {
        if let Some(event) = session.tick_at(&arm(angle), 640, 480, at(t0, secs)) {
            events.push(event);
        }
    };

    for cycle in 0..3 {
        let base = cycle as f64 * 2.0;
        tick(170.0, base);
        tick(80.0, base + 0.5);
        tick(170.0, base + 1.0);
    }
    for secs in [6.5, 6.9, 7.5, 8.5, 9.5, 9.8, 10.5] {
        tick(170.0, secs);
    }

    let countdown: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Countdown(n) => Some(*n),
            SessionEvent::Completed(_) => None,
        })
        .collect();
    assert_eq!(countdown, vec![3, 2, 1]);

    let results: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Completed(result) => Some(result.clone()),
            SessionEvent::Countdown(_) => None,
        })
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].exercise, ExerciseKind::Pushups);
    assert_eq!(results[0].reps, 3);
    assert_eq!(session.last_result(), Some(results[0].clone()));
    assert!(!session.is_active());

    let rows = recorder.recent(30).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].gender, "male");
    assert_eq!(rows[0].exercise, "pushups");
    assert_eq!(rows[0].reps, 3);
    assert_eq!(rows[0].duration_secs, 10);

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.starts_with(&HISTORY_HEADER.join(",")));

    drop(session);
    assert!(worker.join());
    assert_eq!(
        *transcript.0.lock(),
        vec![
            "Pushups test started. Go!",
            "3",
            "2",
            "1",
            "Stop! Time's up",
        ]
    );
}

#[test]
fn reopening_the_log_keeps_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("history.csv");

    let (announcer, _worker) = Announcer::spawn(Transcript::default());
    let session = SessionHandle::new(
        ExerciseSession::default(),
        announcer,
        Arc::new(CsvRecorder::open(&log_path).unwrap()),
    );
    let t0 = Instant::now();
    session
        .start_at(&StartRequest::new("female", "squats", 1), t0)
        .unwrap();
    session.tick_at(&LandmarkSet::default(), 640, 480, at(t0, 1.5));

    let reopened = CsvRecorder::open(&log_path).unwrap();
    let rows = reopened.recent(30).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].exercise, "squats");
    assert_eq!(rows[0].reps, 0);

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(content.matches("DateTime").count(), 1);
}
