//! Running the engine as a child process.
//!
//! The engine writes G-code to the `-o` file and reports progress and
//! statistics as text lines. Both stdout and stderr are read line by line;
//! unrecognized stderr lines are kept for the failure report.

use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use slicekit_core::{AppEvent, EventBus, SlicerEvent};

use super::command::SlicerCommand;
use super::result::{EngineLine, EngineResult, ProgressTracker};
use super::SlicerError;
use crate::postprocess::PostProcessPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Reading engine {:?} failed: {}", stream, e);
                    break;
                }
            }
        }
    })
}

/// Publishes slicer events when a bus is attached
#[derive(Clone, Default)]
struct Events(Option<Arc<EventBus>>);

impl Events {
    fn publish(&self, event: SlicerEvent) {
        if let Some(bus) = &self.0 {
            if bus.publish(AppEvent::Slicer(event)).is_err() {
                tracing::trace!("Slicer event had no subscribers");
            }
        }
    }
}

/// A running engine invocation
pub struct SlicerProcess {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<Result<EngineResult, SlicerError>>,
}

impl std::fmt::Debug for SlicerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlicerProcess")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl SlicerProcess {
    /// Spawn the engine.
    ///
    /// Must be called from within a tokio runtime. On a zero exit status the
    /// pipeline runs over the output before the result is returned.
    ///
    /// # Errors
    /// `SlicerError::Spawn` when the binary cannot be started
    pub fn start(
        command: SlicerCommand,
        pipeline: PostProcessPipeline,
        bus: Option<Arc<EventBus>>,
    ) -> Result<Self, SlicerError> {
        tracing::info!("Running: {}", command.display());
        let child = Command::new(&command.binary)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SlicerError::Spawn {
                binary: command.binary.clone(),
                source,
            })?;

        let events = Events(bus);
        events.publish(SlicerEvent::Started {
            output: command.output.clone(),
        });

        let (cancel, cancel_rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let outcome = watch(child, command, pipeline, cancel_rx, events.clone()).await;
            match &outcome {
                Ok(result) => events.publish(SlicerEvent::Finished {
                    print_time_seconds: result.print_time_seconds().unwrap_or(0),
                }),
                Err(SlicerError::Cancelled) => events.publish(SlicerEvent::Cancelled),
                Err(e) => events.publish(SlicerEvent::Failed { error: e.to_string() }),
            }
            outcome
        });
        Ok(Self { cancel, handle })
    }

    /// Ask the run to stop; the engine is killed and its output removed
    pub async fn cancel(&self) {
        if self.cancel.send(()).await.is_err() {
            tracing::debug!("Cancel requested after the engine finished");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> Result<EngineResult, SlicerError> {
        let Self { cancel, handle } = self;
        let outcome = handle.await.map_err(|e| SlicerError::Join(e.to_string()))?;
        drop(cancel);
        outcome
    }
}

async fn abort(child: &mut Child, command: &SlicerCommand) -> SlicerError {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill engine: {}", e);
    }
    match tokio::fs::remove_file(&command.output).await {
        Ok(()) => tracing::debug!("Removed partial output {}", command.output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", command.output.display(), e),
    }
    tracing::info!("Slicing cancelled");
    SlicerError::Cancelled
}

async fn watch(
    mut child: Child,
    command: SlicerCommand,
    pipeline: PostProcessPipeline,
    mut cancel_rx: mpsc::Receiver<()>,
    events: Events,
) -> Result<EngineResult, SlicerError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, Stream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, Stream::Stderr, tx.clone()));
    }
    drop(tx);

    let mut result = EngineResult::new(&command.output);
    let mut tracker = ProgressTracker::new(command.objects.len());
    let mut stderr_lines = Vec::new();
    events.publish(SlicerEvent::Progress { fraction: 0.0 });

    let mut cancelled = false;
    while !cancelled {
        tokio::select! {
            Some(()) = cancel_rx.recv() => cancelled = true,
            line = rx.recv() => {
                let Some((stream, line)) = line else { break };
                match EngineLine::parse(&line) {
                    EngineLine::Progress { step, current, total } => {
                        if let Some(fraction) = tracker.update(&step, current, total) {
                            events.publish(SlicerEvent::Progress { fraction });
                        }
                    }
                    EngineLine::Log(text) => {
                        tracing::debug!(target: "slicekit::engine", "{}", text);
                        if stream == Stream::Stderr {
                            stderr_lines.push(text.clone());
                        }
                        result.record(EngineLine::Log(text), command.volumetric_diameter);
                    }
                    other => result.record(other, command.volumetric_diameter),
                }
            }
        }
    }
    if cancelled {
        return Err(abort(&mut child, &command).await);
    }
    for reader in readers {
        let _ = reader.await;
    }

    let status = tokio::select! {
        Some(()) = cancel_rx.recv() => None,
        status = child.wait() => Some(status),
    };
    let Some(status) = status else {
        return Err(abort(&mut child, &command).await);
    };
    let status = status?;

    if !status.success() {
        tracing::error!("Engine exited with {}", status);
        return Err(SlicerError::Failed {
            status: status.code(),
            stderr: stderr_lines.join("\n"),
        });
    }

    if !pipeline.is_empty() {
        let target = command.output.clone();
        let outcome = tokio::task::spawn_blocking(move || pipeline.run(&target))
            .await
            .map_err(|e| SlicerError::Join(e.to_string()))?;
        if let Err(message) = outcome {
            result.log.push(message.clone());
            result.post_process_error = Some(message);
        }
    }

    events.publish(SlicerEvent::Progress { fraction: 1.0 });
    tracing::info!(
        "Slicing finished: {} ({:.2} m filament)",
        result.print_time_text(),
        result.filament_mm(0) / 1000.0
    );
    Ok(result)
}
