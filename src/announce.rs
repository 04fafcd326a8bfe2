use std::{
    process::{Command, Stdio},
    thread,
};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, Sender, TrySendError};

const QUEUE_DEPTH: usize = 8;

/// Where voice prompts end up.
pub trait SpeechSink: Send + 'static {
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Runs an external text-to-speech program with the prompt as its last
/// argument, e.g. `espeak -s 160`.
pub struct CommandSpeechSink {
    program: String,
    args: Vec<String>,
}

impl CommandSpeechSink {
    /// Splits `command_line` on whitespace into program and leading args.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl SpeechSink for CommandSpeechSink {
    fn speak(&mut self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .with_context(|| format!("failed to run speech command {}", self.program))?;
        if !status.success() {
            bail!("speech command {} exited with {status}", self.program);
        }
        Ok(())
    }
}

/// Fallback sink when no speech command is configured.
pub struct LogSpeechSink;

impl SpeechSink for LogSpeechSink {
    fn speak(&mut self, text: &str) -> Result<()> {
        log::info!("announcement: {text}");
        Ok(())
    }
}

/// Non-blocking handle for queueing voice prompts.
///
/// Prompts are spoken one at a time in the order they were queued. When the
/// queue is full the new prompt is dropped. The worker exits once every
/// clone of the handle is gone.
#[derive(Clone, Debug)]
pub struct Announcer {
    tx: Sender<String>,
}

impl Announcer {
    pub fn spawn<S: SpeechSink>(sink: S) -> (Self, AnnouncerWorker) {
        let (tx, rx) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let handle = thread::spawn(move || announcer_loop(sink, rx));
        (Self { tx }, AnnouncerWorker { handle })
    }

    pub fn announce(&self, text: impl Into<String>) {
        match self.tx.try_send(text.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => {
                log::debug!("announcement queue full, dropping {text:?}");
            }
            Err(TrySendError::Disconnected(text)) => {
                log::debug!("announcer stopped, dropping {text:?}");
            }
        }
    }
}

/// The thread draining an [`Announcer`] queue.
#[derive(Debug)]
pub struct AnnouncerWorker {
    handle: thread::JoinHandle<()>,
}

impl AnnouncerWorker {
    /// Waits for the queue to drain once every `Announcer` clone is dropped.
    /// Returns `false` if the worker panicked.
    pub fn join(self) -> bool {
        match self.handle.join() {
            Ok(()) => true,
            Err(_) => {
                log::error!("announcement worker panicked");
                false
            }
        }
    }
}

fn announcer_loop<S: SpeechSink>(mut sink: S, rx: Receiver<String>) {
    while let Ok(text) = rx.recv() {
        if let Err(err) = sink.speak(&text) {
            log::warn!("failed to speak {text:?}: {err:?}");
        }
    }
}
