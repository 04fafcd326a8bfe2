use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    geometry::angle_between,
    types::{LandmarkSet, PoseLandmark},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Pushups,
    Squats,
    Crunches,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [
        ExerciseKind::Pushups,
        ExerciseKind::Squats,
        ExerciseKind::Crunches,
    ];

    /// Name used on the wire and in the history log.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Pushups => "pushups",
            ExerciseKind::Squats => "squats",
            ExerciseKind::Crunches => "crunches",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExerciseKind::Pushups => "Pushups",
            ExerciseKind::Squats => "Squats",
            ExerciseKind::Crunches => "Crunches",
        }
    }

    /// Short label for the overlay banner.
    pub fn short_label(&self) -> &'static str {
        match self {
            ExerciseKind::Pushups => "Push",
            ExerciseKind::Squats => "Squat",
            ExerciseKind::Crunches => "Crunch",
        }
    }

    /// `(up, down)` hysteresis thresholds in degrees.
    pub fn thresholds(&self) -> (f32, f32) {
        match self {
            ExerciseKind::Pushups => (160.0, 90.0),
            ExerciseKind::Squats => (160.0, 100.0),
            ExerciseKind::Crunches => (150.0, 100.0),
        }
    }

    /// The three landmarks whose middle point is the measured joint.
    pub fn joint(&self) -> [PoseLandmark; 3] {
        match self {
            ExerciseKind::Pushups => [
                PoseLandmark::RightShoulder,
                PoseLandmark::RightElbow,
                PoseLandmark::RightWrist,
            ],
            ExerciseKind::Squats => [
                PoseLandmark::RightHip,
                PoseLandmark::RightKnee,
                PoseLandmark::RightAnkle,
            ],
            // Torso flexion proxy.
            ExerciseKind::Crunches => [
                PoseLandmark::LeftHip,
                PoseLandmark::LeftShoulder,
                PoseLandmark::Nose,
            ],
        }
    }

    /// Joint angle for this exercise in frame pixel space, or `None` when
    /// any of the three landmarks is missing.
    pub fn joint_angle(&self, landmarks: &LandmarkSet, width: u32, height: u32) -> Option<f32> {
        let [a, b, c] = self.joint();
        let a = landmarks.get(a)?.to_pixels(width, height);
        let b = landmarks.get(b)?.to_pixels(width, height);
        let c = landmarks.get(c)?.to_pixels(width, height);
        Some(angle_between(a, b, c))
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pushups" => Ok(ExerciseKind::Pushups),
            "squats" => Ok(ExerciseKind::Squats),
            "crunches" => Ok(ExerciseKind::Crunches),
            other => Err(Error::InvalidParams(format!("unknown exercise {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(Error::InvalidParams(format!("unknown gender {other:?}"))),
        }
    }
}

/// Typical rep counts for a one-minute test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAverages {
    pub normal: u32,
    pub athlete: u32,
}

pub fn reference_averages(exercise: ExerciseKind, gender: Gender) -> Option<ReferenceAverages> {
    let (normal, athlete) = match (exercise, gender) {
        (ExerciseKind::Pushups, Gender::Male) => (25, 60),
        (ExerciseKind::Pushups, Gender::Female) => (15, 45),
        (ExerciseKind::Squats, _) => (40, 100),
        (ExerciseKind::Crunches, _) => (30, 70),
    };
    Some(ReferenceAverages { normal, athlete })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    fn set_with(points: &[(PoseLandmark, (f32, f32))]) -> LandmarkSet {
        let mut all = vec![Landmark::new(0.0, 0.0, 0.0); PoseLandmark::COUNT];
        for (landmark, (x, y)) in points {
            all[landmark.index()] = Landmark::new(*x, *y, 0.99);
        }
        LandmarkSet::new(all)
    }

    #[test]
    fn thresholds_keep_a_hysteresis_gap() {
        for kind in ExerciseKind::ALL {
            let (up, down) = kind.thresholds();
            assert!(up > down, "{kind}");
        }
    }

    #[test]
    fn pushup_uses_right_elbow() {
        let set = set_with(&[
            (PoseLandmark::RightShoulder, (0.5, 0.2)),
            (PoseLandmark::RightElbow, (0.5, 0.5)),
            (PoseLandmark::RightWrist, (0.8, 0.5)),
        ]);
        // Square frame keeps the right angle right.
        let angle = ExerciseKind::Pushups.joint_angle(&set, 100, 100).unwrap();
        assert!((angle - 90.0).abs() < 0.01, "{angle}");
    }

    #[test]
    fn squat_straight_leg_is_180() {
        let set = set_with(&[
            (PoseLandmark::RightHip, (0.5, 0.3)),
            (PoseLandmark::RightKnee, (0.5, 0.6)),
            (PoseLandmark::RightAnkle, (0.5, 0.9)),
        ]);
        let angle = ExerciseKind::Squats.joint_angle(&set, 640, 480).unwrap();
        assert!((angle - 180.0).abs() < 0.01, "{angle}");
    }

    #[test]
    fn missing_landmarks_are_unavailable() {
        let truncated = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0); 12]);
        for kind in ExerciseKind::ALL {
            assert_eq!(kind.joint_angle(&truncated, 640, 480), None, "{kind}");
        }
        assert_eq!(
            ExerciseKind::Crunches.joint_angle(&LandmarkSet::default(), 640, 480),
            None
        );
    }

    #[test]
    fn parses_wire_names_only() {
        assert_eq!("squats".parse::<ExerciseKind>().unwrap(), ExerciseKind::Squats);
        assert!("lunges".parse::<ExerciseKind>().is_err());
        assert!("Pushups".parse::<ExerciseKind>().is_err());
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn reference_table_matches_gender() {
        let male = reference_averages(ExerciseKind::Pushups, Gender::Male).unwrap();
        let female = reference_averages(ExerciseKind::Pushups, Gender::Female).unwrap();
        assert_eq!((male.normal, male.athlete), (25, 60));
        assert_eq!((female.normal, female.athlete), (15, 45));
    }
}
