use std::{fs, net::SocketAddr, path::{Path, PathBuf}, time::Duration};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    pipeline::PipelineOptions,
    session::DEFAULT_MAX_DURATION_SECS,
};

#[derive(Parser, Debug, Default)]
#[command(name = "rep-counter", about = "Timed push-up, squat and crunch assessment from a webcam")]
pub struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address the HTTP server listens on
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Camera device index
    #[arg(long)]
    pub camera_index: Option<u32>,

    /// BlazePose landmark model (ONNX)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Workout history CSV
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Text-to-speech command, e.g. "espeak -s 160"
    #[arg(long)]
    pub speech_command: Option<String>,

    /// TrueType font for the overlay banner
    #[arg(long)]
    pub font: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub camera_index: u32,
    pub model_path: PathBuf,
    pub history_path: PathBuf,
    pub speech_command: Option<String>,
    pub font_path: PathBuf,
    pub jpeg_quality: u8,
    pub mirror: bool,
    pub min_visibility: f32,
    pub max_duration_secs: u64,
    pub retry_delay_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            camera_index: 0,
            model_path: PathBuf::from("models/pose_landmark_full.onnx"),
            history_path: PathBuf::from("workout_history.csv"),
            speech_command: None,
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            jpeg_quality: 80,
            mirror: true,
            min_visibility: 0.0,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            retry_delay_ms: 50,
            idle_poll_ms: 100,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| Error::Config(err.to_string()))
    }

    /// Loads the optional config file, then applies command line overrides.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(bind) = args.bind {
            config.bind_addr = bind;
        }
        if let Some(index) = args.camera_index {
            config.camera_index = index;
        }
        if let Some(model) = &args.model {
            config.model_path = model.clone();
        }
        if let Some(history) = &args.history {
            config.history_path = history.clone();
        }
        if let Some(command) = &args.speech_command {
            config.speech_command = Some(command.clone());
        }
        if let Some(font) = &args.font {
            config.font_path = font.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_duration_secs == 0 {
            return Err(Error::Config("max_duration_secs must be positive".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(Error::Config(format!(
                "min_visibility must be in 0..=1, got {}",
                self.min_visibility
            )));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            mirror: self.mirror,
            min_visibility: self.min_visibility,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            idle_poll: Duration::from_millis(self.idle_poll_ms),
        }
    }
}
