use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    exercise::ExerciseKind,
    types::LandmarkSet,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepPhase {
    Up,
    Down,
}

/// Hysteresis rep counter for one exercise.
///
/// A rep is one full excursion from at or below `down_threshold` back to at
/// or above `up_threshold`. Samples that stay inside the gap change nothing.
#[derive(Clone, Debug)]
pub struct RepCounter {
    kind: ExerciseKind,
    up_threshold: f32,
    down_threshold: f32,
    phase: RepPhase,
    count: u32,
}

impl RepCounter {
    pub fn new(kind: ExerciseKind) -> Self {
        let (up, down) = kind.thresholds();
        Self {
            kind,
            up_threshold: up,
            down_threshold: down,
            phase: RepPhase::Up,
            count: 0,
        }
    }

    pub fn with_thresholds(kind: ExerciseKind, up: f32, down: f32) -> Result<Self> {
        if up.partial_cmp(&down) != Some(Ordering::Greater) {
            return Err(Error::InvalidThresholds { up, down });
        }
        Ok(Self {
            kind,
            up_threshold: up,
            down_threshold: down,
            phase: RepPhase::Up,
            count: 0,
        })
    }

    /// Feeds one angle sample. `None` leaves the counter untouched.
    pub fn observe(&mut self, angle: Option<f32>) {
        let Some(angle) = angle else {
            return;
        };
        match self.phase {
            RepPhase::Up if angle <= self.down_threshold => {
                self.phase = RepPhase::Down;
            }
            RepPhase::Down if angle >= self.up_threshold => {
                self.phase = RepPhase::Up;
                self.count += 1;
            }
            _ => {}
        }
    }

    /// Extracts this exercise's joint angle and feeds it. Returns the angle
    /// that was sampled, if any.
    pub fn step(&mut self, landmarks: &LandmarkSet, width: u32, height: u32) -> Option<f32> {
        let angle = self.kind.joint_angle(landmarks, width, height);
        self.observe(angle);
        angle
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
