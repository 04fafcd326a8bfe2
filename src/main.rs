use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use rep_counter::{
    announce::{Announcer, AnnouncerWorker, CommandSpeechSink, LogSpeechSink},
    config::{Args, Config},
    pipeline::{FrameHub, FramePipeline},
    recorder::CsvRecorder,
    server::{self, AppState},
    session::{ExerciseSession, SessionHandle},
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_args(&args).context("invalid configuration")?;

    let recorder = CsvRecorder::open(&config.history_path).with_context(|| {
        format!("failed to open history log {}", config.history_path.display())
    })?;
    let (announcer, announcer_worker) = spawn_announcer(&config);
    let session = SessionHandle::new(
        ExerciseSession::new(config.max_duration_secs),
        announcer,
        Arc::new(recorder),
    );
    let hub = FrameHub::new();

    let pipeline = start_capture(&config, session.clone(), hub.clone())?;

    let app = server::router(AppState {
        session: session.clone(),
        hub: hub.clone(),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    log::info!("serving on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await
        .context("http server failed")?;

    pipeline.stop();
    drop(session);
    announcer_worker.join();
    log::info!("bye");
    Ok(())
}

async fn shutdown_signal(hub: FrameHub) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received");
    hub.close();
}

fn spawn_announcer(config: &Config) -> (Announcer, AnnouncerWorker) {
    match config
        .speech_command
        .as_deref()
        .and_then(CommandSpeechSink::from_command_line)
    {
        Some(sink) => Announcer::spawn(sink),
        None => {
            log::info!("no speech command configured, announcements go to the log");
            Announcer::spawn(LogSpeechSink)
        }
    }
}

#[cfg(feature = "camera-nokhwa")]
fn start_capture(config: &Config, session: SessionHandle, hub: FrameHub) -> Result<FramePipeline> {
    use rep_counter::pipeline::{
        camera::CameraSource, compositor::Compositor, pose::OrtPoseEngine, start_frame_pipeline,
    };

    let camera_index = config.camera_index;
    let model_path = config.model_path.clone();

    Ok(start_frame_pipeline(
        move || CameraSource::open(camera_index),
        move || OrtPoseEngine::new(&model_path),
        session,
        Compositor::with_font_file(&config.font_path, config.jpeg_quality),
        hub,
        config.pipeline_options(),
    ))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn start_capture(
    _config: &Config,
    _session: SessionHandle,
    _hub: FrameHub,
) -> Result<FramePipeline> {
    Err(rep_counter::error::Error::Camera(
        "built without the camera-nokhwa feature".into(),
    )
    .into())
}
