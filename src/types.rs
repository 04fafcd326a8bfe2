#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
        }
    }

    /// Solid black frame, used when a source has nothing better to offer.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self::new(rgba, width, height)
    }
}

/// One body keypoint. `x`/`y` are normalized to the frame (0..1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// BlazePose topology. Discriminants are indices into a [`LandmarkSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Limb segments drawn by the overlay.
pub const POSE_CONNECTIONS: &[(PoseLandmark, PoseLandmark)] = &[
    (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
    (PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
    (PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    (PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftHip),
    (PoseLandmark::RightShoulder, PoseLandmark::RightHip),
    (PoseLandmark::LeftHip, PoseLandmark::RightHip),
    (PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    (PoseLandmark::RightHip, PoseLandmark::RightKnee),
    (PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
    (PoseLandmark::LeftAnkle, PoseLandmark::LeftHeel),
    (PoseLandmark::LeftHeel, PoseLandmark::LeftFootIndex),
    (PoseLandmark::RightAnkle, PoseLandmark::RightHeel),
    (PoseLandmark::RightHeel, PoseLandmark::RightFootIndex),
    (PoseLandmark::Nose, PoseLandmark::LeftEye),
    (PoseLandmark::Nose, PoseLandmark::RightEye),
    (PoseLandmark::LeftEye, PoseLandmark::LeftEar),
    (PoseLandmark::RightEye, PoseLandmark::RightEar),
];

/// Landmarks detected on a single frame.
///
/// Landmarks whose visibility falls below `min_visibility` are reported as
/// missing by [`LandmarkSet::get`].
#[derive(Clone, Debug, Default)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
    min_visibility: f32,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self {
            points,
            min_visibility: 0.0,
        }
    }

    pub fn with_min_visibility(mut self, min_visibility: f32) -> Self {
        self.min_visibility = min_visibility;
        self
    }

    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.points
            .get(landmark.index())
            .filter(|point| point.visibility >= self.min_visibility)
            .filter(|point| point.x.is_finite() && point.y.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.points.iter()
    }
}
