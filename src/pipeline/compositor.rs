use std::path::Path;

use ab_glyph::FontVec;
use image::{DynamicImage, Rgba, RgbaImage, codecs::jpeg::JpegEncoder};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut,
    },
    rect::Rect,
};
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    exercise::ExerciseKind,
    session::SessionStatus,
    types::{Frame, LandmarkSet, POSE_CONNECTIONS},
};

const BANNER_ORIGIN: (i32, i32) = (5, 5);
const BANNER_SIZE: (u32, u32) = (475, 35);
const TEXT_ORIGIN: (i32, i32) = (10, 14);
const TEXT_SCALE: f32 = 20.0;
const JOINT_RADIUS: i32 = 4;

const BANNER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LIMB_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const JOINT_COLOR: Rgba<u8> = Rgba([255, 64, 64, 255]);

/// Draws the status banner and skeleton onto frames and encodes them.
pub struct Compositor {
    font: Option<FontVec>,
    jpeg_quality: u8,
}

impl Compositor {
    pub fn new(font: Option<FontVec>, jpeg_quality: u8) -> Self {
        Self {
            font,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Loads the banner font. A missing or unreadable font only disables the
    /// banner text.
    pub fn with_font_file(path: &Path, jpeg_quality: u8) -> Self {
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(err) => {
                    log::warn!("invalid font {}: {err}", path.display());
                    None
                }
            },
            Err(err) => {
                log::warn!("banner text disabled, cannot read font {}: {err}", path.display());
                None
            }
        };
        Self::new(font, jpeg_quality)
    }

    pub fn render(
        &self,
        frame: Frame,
        landmarks: Option<&LandmarkSet>,
        status: &SessionStatus,
    ) -> Result<Vec<u8>> {
        let (width, height, len) = (frame.width, frame.height, frame.rgba.len());
        let mut canvas = RgbaImage::from_raw(width, height, frame.rgba)
            .ok_or(Error::InvalidFrame { width, height, len })?;

        if let Some(landmarks) = landmarks {
            draw_skeleton(&mut canvas, landmarks);
        }

        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(BANNER_ORIGIN.0, BANNER_ORIGIN.1).of_size(BANNER_SIZE.0, BANNER_SIZE.1),
            BANNER_COLOR,
        );
        if let (Some(font), Some(text)) = (&self.font, banner_text(status)) {
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                TEXT_ORIGIN.0,
                TEXT_ORIGIN.1,
                TEXT_SCALE,
                font,
                &text,
            );
        }

        self.encode(canvas)
    }

    fn encode(&self, canvas: RgbaImage) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(canvas).into_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality).encode_image(&rgb)?;
        Ok(jpeg)
    }
}

/// Banner line shown while a session is running.
pub fn banner_text(status: &SessionStatus) -> Option<String> {
    if !status.active {
        return None;
    }
    let counts = status.counts;
    Some(format!(
        "Time: {}s | {}: {} {}: {} {}: {}",
        status.remaining_secs,
        ExerciseKind::Pushups.short_label(),
        counts.pushups,
        ExerciseKind::Squats.short_label(),
        counts.squats,
        ExerciseKind::Crunches.short_label(),
        counts.crunches,
    ))
}

fn draw_skeleton(canvas: &mut RgbaImage, landmarks: &LandmarkSet) {
    let (width, height) = canvas.dimensions();

    for (from, to) in POSE_CONNECTIONS {
        if let (Some(a), Some(b)) = (landmarks.get(*from), landmarks.get(*to)) {
            draw_line_segment_mut(
                canvas,
                a.to_pixels(width, height),
                b.to_pixels(width, height),
                LIMB_COLOR,
            );
        }
    }

    for point in landmarks.iter() {
        let (x, y) = point.to_pixels(width, height);
        if x.is_finite() && y.is_finite() {
            draw_filled_circle_mut(canvas, (x as i32, y as i32), JOINT_RADIUS, JOINT_COLOR);
        }
    }
}

/// Flips the frame left to right in place, for a selfie view.
pub fn mirror(frame: &mut Frame) {
    let row_len = frame.width as usize * 4;
    if row_len == 0 {
        return;
    }
    frame.rgba.par_chunks_mut(row_len).for_each(|row| {
        let pixels = row.len() / 4;
        for x in 0..pixels / 2 {
            let (left, right) = (x * 4, (pixels - 1 - x) * 4);
            for c in 0..4 {
                row.swap(left + c, right + c);
            }
        }
    });
}
