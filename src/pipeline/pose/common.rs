use fast_image_resize::{PixelType, ResizeOptions, Resizer, images::Image, images::ImageRef};

use crate::{
    error::{Error, Result},
    types::{Frame, Landmark, PoseLandmark},
};

pub const INPUT_SIZE: u32 = 256;
/// x, y, z, visibility, presence per landmark.
pub const VALUES_PER_LANDMARK: usize = 5;
/// The full model emits 33 body landmarks followed by 6 auxiliary ones.
pub const MODEL_LANDMARKS: usize = 39;

/// How a frame was fitted into the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Letterbox {
    pub fn fit(frame_width: u32, frame_height: u32, input_size: u32) -> Self {
        let longest = frame_width.max(frame_height).max(1) as f32;
        let scale = input_size as f32 / longest;
        let scaled_w = (frame_width as f32 * scale).round();
        let scaled_h = (frame_height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((input_size as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - scaled_h) / 2.0).floor(),
            frame_width,
            frame_height,
        }
    }

    fn scaled_size(&self) -> (u32, u32) {
        (
            ((self.frame_width as f32 * self.scale).round() as u32).max(1),
            ((self.frame_height as f32 * self.scale).round() as u32).max(1),
        )
    }

    /// Maps a point in model input pixels to normalized frame coordinates.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let fx = (x - self.pad_x) / self.scale;
        let fy = (y - self.pad_y) / self.scale;
        (
            fx / self.frame_width.max(1) as f32,
            fy / self.frame_height.max(1) as f32,
        )
    }
}

/// Resizes the frame into a letterboxed `INPUT_SIZE` square and returns it
/// as NHWC float RGB in `[0, 1]`.
pub fn prepare_input(
    frame: &Frame,
    resizer: &mut Resizer,
) -> anyhow::Result<(Vec<f32>, Letterbox)> {
    let letterbox = Letterbox::fit(frame.width, frame.height, INPUT_SIZE);
    let (scaled_w, scaled_h) = letterbox.scaled_size();

    let src = ImageRef::new(frame.width, frame.height, &frame.rgba, PixelType::U8x4)?;
    let mut dst = Image::new(scaled_w, scaled_h, PixelType::U8x4);
    resizer.resize(&src, &mut dst, &ResizeOptions::new())?;

    let side = INPUT_SIZE as usize;
    let mut input = vec![0.0f32; side * side * 3];
    let pad_x = letterbox.pad_x as usize;
    let pad_y = letterbox.pad_y as usize;
    let scaled = dst.buffer();
    for y in 0..scaled_h as usize {
        for x in 0..scaled_w as usize {
            let (tx, ty) = (x + pad_x, y + pad_y);
            if tx >= side || ty >= side {
                continue;
            }
            let src_idx = (y * scaled_w as usize + x) * 4;
            let dst_idx = (ty * side + tx) * 3;
            for c in 0..3 {
                input[dst_idx + c] = f32::from(scaled[src_idx + c]) / 255.0;
            }
        }
    }

    Ok((input, letterbox))
}

/// Turns the flat landmark tensor into the 33 body landmarks in normalized
/// frame coordinates.
pub fn decode_landmarks(flat: &[f32], letterbox: &Letterbox) -> Result<Vec<Landmark>> {
    let needed = PoseLandmark::COUNT * VALUES_PER_LANDMARK;
    if flat.len() < needed {
        return Err(Error::Inference(format!(
            "expected at least {needed} landmark values, got {}",
            flat.len()
        )));
    }

    Ok(flat
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(PoseLandmark::COUNT)
        .map(|values| {
            let (x, y) = letterbox.to_frame(values[0], values[1]);
            Landmark {
                x,
                y,
                z: values[2] / letterbox.scale,
                visibility: sigmoid(values[3]),
            }
        })
        .collect())
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}
