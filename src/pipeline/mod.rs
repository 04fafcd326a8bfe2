#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod compositor;
pub mod pose;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::{error::Result, session::SessionHandle, types::Frame};

use self::{compositor::Compositor, pose::PoseEngine};

const HUB_CAPACITY: usize = 4;

/// Anything that yields video frames, one at a time.
pub trait FrameSource {
    fn read_frame(&mut self) -> anyhow::Result<Frame>;
}

/// Fans encoded frames out to every connected stream client.
#[derive(Clone, Debug)]
pub struct FrameHub {
    tx: broadcast::Sender<Bytes>,
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, jpeg: Bytes) {
        // No receivers is not an error: the frame is simply unobserved.
        let _ = self.tx.send(jpeg);
    }

    /// Ends every open stream. Subscribers treat an empty frame as end of stream.
    pub fn close(&self) {
        let _ = self.tx.send(Bytes::new());
    }
}

/// Timing knobs for the frame worker.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    pub mirror: bool,
    pub min_visibility: f32,
    pub retry_delay: Duration,
    pub idle_poll: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            min_visibility: 0.0,
            retry_delay: Duration::from_millis(50),
            idle_poll: Duration::from_millis(100),
        }
    }
}

/// One frame's worth of work: pose inference, session tick, overlay, encode.
pub struct FrameProcessor<E: PoseEngine> {
    engine: E,
    session: SessionHandle,
    compositor: Compositor,
    options: PipelineOptions,
}

impl<E: PoseEngine> FrameProcessor<E> {
    pub fn new(
        engine: E,
        session: SessionHandle,
        compositor: Compositor,
        options: PipelineOptions,
    ) -> Self {
        Self {
            engine,
            session,
            compositor,
            options,
        }
    }

    pub fn process(&mut self, mut frame: Frame) -> Result<Vec<u8>> {
        if self.options.mirror {
            compositor::mirror(&mut frame);
        }

        let landmarks = match self.engine.infer(&frame) {
            Ok(found) => found.map(|set| set.with_min_visibility(self.options.min_visibility)),
            Err(err) => {
                log::warn!("pose inference failed: {err:?}");
                None
            }
        };

        if let Some(landmarks) = &landmarks {
            self.session.tick(landmarks, frame.width, frame.height);
        }

        let status = self.session.snapshot();
        self.compositor.render(frame, landmarks.as_ref(), &status)
    }
}

/// Handle to the running frame worker. Dropping it stops the worker.
#[derive(Debug)]
pub struct FramePipeline {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FramePipeline {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("frame pipeline worker panicked");
            }
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns the frame worker.
///
/// Both the source and the engine are built on the worker thread, so neither
/// has to be `Send`. Frames are only read while at least one client is
/// subscribed to `hub`.
pub fn start_frame_pipeline<S, E, OpenSource, OpenEngine>(
    open_source: OpenSource,
    open_engine: OpenEngine,
    session: SessionHandle,
    compositor: Compositor,
    hub: FrameHub,
    options: PipelineOptions,
) -> FramePipeline
where
    S: FrameSource,
    E: PoseEngine,
    OpenSource: FnOnce() -> anyhow::Result<S> + Send + 'static,
    OpenEngine: FnOnce() -> anyhow::Result<E> + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut source = match open_source() {
            Ok(source) => source,
            Err(err) => {
                log::error!("failed to open video source: {err:?}");
                return;
            }
        };
        let engine = match open_engine() {
            Ok(engine) => engine,
            Err(err) => {
                log::error!("failed to load pose engine: {err:?}");
                return;
            }
        };
        let processor = FrameProcessor::new(engine, session, compositor, options);

        pipeline_loop(&mut source, processor, &hub, &stop_flag, options);
        log::info!("frame pipeline stopped");
    });

    FramePipeline {
        stop,
        handle: Some(handle),
    }
}

fn pipeline_loop<S: FrameSource, E: PoseEngine>(
    source: &mut S,
    mut processor: FrameProcessor<E>,
    hub: &FrameHub,
    stop: &AtomicBool,
    options: PipelineOptions,
) {
    let mut streaming = false;

    while !stop.load(Ordering::Relaxed) {
        if !hub.has_subscribers() {
            if streaming {
                log::info!("no stream clients left, pausing frame capture");
                streaming = false;
            }
            thread::sleep(options.idle_poll);
            continue;
        }
        if !streaming {
            log::info!("stream client connected, resuming frame capture");
            streaming = true;
        }

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame read failed: {err:?}");
                thread::sleep(options.retry_delay);
                continue;
            }
        };

        match processor.process(frame) {
            Ok(jpeg) => hub.publish(Bytes::from(jpeg)),
            Err(err) => log::warn!("failed to compose frame: {err}"),
        }
    }
}
