use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Start request rejected; the message says which field was wrong.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("up threshold {up} must be greater than down threshold {down}")]
    InvalidThresholds { up: f32, down: f32 },

    #[error("camera error: {0}")]
    Camera(String),

    #[error("frame buffer of {len} bytes does not match {width}x{height} RGBA")]
    InvalidFrame { width: u32, height: u32, len: usize },

    #[error("inference error: {0}")]
    Inference(String),

    #[error("image encoding error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("history log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
