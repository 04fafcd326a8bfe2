use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};
use rayon::prelude::*;

use super::FrameSource;
use crate::types::Frame;

// Built-in webcams often reject YUYV even when it is advertised.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::NV12,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
];

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Local webcam read through nokhwa.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let index = CameraIndex::Index(index);
        let mut last_err = None;

        for requested in requested_formats() {
            match Camera::new(index.clone(), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => {
                        log::info!(
                            "camera {} streaming {:?}",
                            camera.info().human_name(),
                            camera.camera_format()
                        );
                        return Ok(Self { camera });
                    }
                    Err(err) => last_err = Some(err.into()),
                },
                Err(err) => last_err = Some(err.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
    }
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<Frame> {
        let decoded = self.camera.frame()?.decode_image::<RgbFormat>()?;
        let (width, height) = decoded.dimensions();
        let rgb = decoded.into_raw();
        if rgb.is_empty() {
            return Err(anyhow!("camera returned an empty frame"));
        }
        Ok(Frame::new(rgb_to_rgba(&rgb), width, height))
    }
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let pixel_count = rgb.len() / 3;
    let mut rgba = vec![0u8; pixel_count * 4];
    rgba.par_chunks_mut(4)
        .zip(rgb.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            dst[0] = src[0];
            dst[1] = src[1];
            dst[2] = src[2];
            dst[3] = 255;
        });
    rgba
}
