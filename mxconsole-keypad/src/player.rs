//! Per-key animation playback
//!
//! Every key with an active animation gets its own tokio task. A task walks
//! the frames in order: encode (once, then cached), packetize, push each
//! packet through the shared [`SerializedWriter`], pause briefly between
//! packets, then hold the frame for its duration.
//!
//! Cancellation goes through a `watch` channel per task and is checked
//! before every packet and raced against every pause, so a stop takes
//! effect within one packet write. `stop` and `stop_all` wait for the
//! affected tasks to exit; once they return nothing more is written for
//! those keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use mxconsole_transport::{packetize, KeySlot, SerializedWriter};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::animation::{Animation, AnimationFrame};
use crate::error::KeypadError;
use crate::jpeg;
use crate::settings::KeypadSettings;

/// Playback state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Snapshot of a key's playback
#[derive(Debug, Clone)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Frame currently being sent or held
    pub frame_index: usize,
    pub looping: bool,
    /// When the last complete frame went out
    pub last_sent: Option<Instant>,
    /// Completed passes over the animation
    pub loops_completed: u64,
}

#[derive(Debug, Default)]
struct Progress {
    frame_index: usize,
    last_sent: Option<Instant>,
    loops_completed: u64,
}

/// State shared between a playback task and the scheduler
#[derive(Default)]
struct TaskShared {
    progress: Mutex<Progress>,
    outcome: Mutex<Option<Result<(), KeypadError>>>,
}

struct PlaybackTask {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<bool>,
    shared: Arc<TaskShared>,
    join: JoinHandle<()>,
    looping: bool,
}

impl PlaybackTask {
    fn is_running(&self) -> bool {
        !*self.done.borrow()
    }

    /// Signal cancellation without waiting
    fn signal(&self) {
        // Fails only when the task already exited
        let _ = self.cancel.send(true);
    }

    async fn join(self, key: KeySlot) {
        if let Err(e) = self.join.await {
            warn!("Playback task for key {} panicked: {}", key, e);
        }
    }
}

/// Frame payload cache entry
#[derive(Clone)]
enum FrameSlot {
    Pending,
    Encoded(Arc<Vec<u8>>),
    Failed,
}

/// Runs animations on keys, one task per key
pub struct PlaybackScheduler {
    writer: Arc<SerializedWriter>,
    settings: KeypadSettings,
    tasks: Mutex<HashMap<KeySlot, PlaybackTask>>,
}

impl PlaybackScheduler {
    pub fn new(writer: Arc<SerializedWriter>, settings: KeypadSettings) -> Self {
        Self {
            writer,
            settings,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &KeypadSettings {
        &self.settings
    }

    /// Start (or restart) an animation on `key`
    ///
    /// An animation already playing on the key is stopped first. Must be
    /// called from within a tokio runtime.
    pub async fn start(
        &self,
        key: KeySlot,
        animation: Arc<Animation>,
        looping: bool,
    ) -> Result<(), KeypadError> {
        if !animation.fits_tile(self.settings.tile_size) {
            return Err(KeypadError::InvalidParameter(format!(
                "animation is {}x{}, key tiles are {}x{}",
                animation.width(),
                animation.height(),
                self.settings.tile_size,
                self.settings.tile_size
            )));
        }

        self.stop(key).await;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let shared = Arc::new(TaskShared::default());

        info!(
            "Starting {}-frame animation on key {} (loop={})",
            animation.frame_count(),
            key,
            looping
        );

        let player = KeyPlayer {
            key,
            animation,
            looping,
            writer: Arc::clone(&self.writer),
            settings: self.settings,
            cancel: cancel_rx,
            shared: Arc::clone(&shared),
        };
        let task_shared = Arc::clone(&shared);
        let join = tokio::spawn(async move {
            let result = player.run().await;
            *task_shared.outcome.lock() = Some(result);
            let _ = done_tx.send(true);
        });

        let previous = self.tasks.lock().insert(
            key,
            PlaybackTask {
                cancel: cancel_tx,
                done: done_rx,
                shared,
                join,
                looping,
            },
        );
        // A concurrent start for the same key raced us; its task sees the
        // dropped sender and exits on its own
        if let Some(previous) = previous {
            previous.signal();
        }

        Ok(())
    }

    /// Stop playback on one key; returns whether it was playing
    pub async fn stop(&self, key: KeySlot) -> bool {
        let task = self.tasks.lock().remove(&key);
        match task {
            Some(task) => {
                let was_running = task.is_running();
                task.signal();
                task.join(key).await;
                if was_running {
                    debug!("Stopped playback on key {}", key);
                }
                was_running
            }
            None => false,
        }
    }

    /// Stop playback on every key; returns how many were playing
    ///
    /// When this returns no playback task is left to write packets.
    pub async fn stop_all(&self) -> usize {
        let tasks: Vec<(KeySlot, PlaybackTask)> = self.tasks.lock().drain().collect();
        let running = tasks.iter().filter(|(_, t)| t.is_running()).count();

        // Signal everyone before waiting on anyone
        for (_, task) in &tasks {
            task.signal();
        }
        join_all(tasks.into_iter().map(|(key, task)| task.join(key))).await;

        if running > 0 {
            info!("Stopped playback on {} keys", running);
        }
        running
    }

    /// Wait for the task on `key` to end and take its result
    ///
    /// Returns None when no task was started on the key or its result was
    /// already taken. Waiting on a looping animation only returns once it
    /// is stopped or fails.
    pub async fn wait(&self, key: KeySlot) -> Option<Result<(), KeypadError>> {
        let (mut done, shared) = {
            let tasks = self.tasks.lock();
            let task = tasks.get(&key)?;
            (task.done.clone(), Arc::clone(&task.shared))
        };
        // Err means the task dropped its sender without finishing (panic)
        let _ = done.wait_for(|finished| *finished).await;
        let outcome = shared.outcome.lock().take();
        outcome
    }

    pub fn state(&self, key: KeySlot) -> PlaybackState {
        match self.tasks.lock().get(&key) {
            Some(task) if task.is_running() => PlaybackState::Playing,
            _ => PlaybackState::Idle,
        }
    }

    pub fn status(&self, key: KeySlot) -> Option<PlaybackStatus> {
        let tasks = self.tasks.lock();
        let task = tasks.get(&key)?;
        let progress = task.shared.progress.lock();
        Some(PlaybackStatus {
            state: if task.is_running() {
                PlaybackState::Playing
            } else {
                PlaybackState::Idle
            },
            frame_index: progress.frame_index,
            looping: task.looping,
            last_sent: progress.last_sent,
            loops_completed: progress.loops_completed,
        })
    }

    /// Keys with a running task, in index order
    pub fn active_keys(&self) -> Vec<KeySlot> {
        let mut keys: Vec<KeySlot> = self
            .tasks
            .lock()
            .iter()
            .filter(|(_, t)| t.is_running())
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        // Tasks also exit once their cancel sender is gone
        for task in self.tasks.get_mut().values() {
            task.signal();
        }
    }
}

/// The body of one key's playback task
struct KeyPlayer {
    key: KeySlot,
    animation: Arc<Animation>,
    looping: bool,
    writer: Arc<SerializedWriter>,
    settings: KeypadSettings,
    cancel: watch::Receiver<bool>,
    shared: Arc<TaskShared>,
}

impl KeyPlayer {
    async fn run(mut self) -> Result<(), KeypadError> {
        let result = self.play().await;
        match &result {
            Ok(()) => debug!("Playback on key {} finished", self.key),
            Err(e) if e.is_cancelled() => debug!("Playback on key {} cancelled", self.key),
            Err(e) => warn!("Playback on key {} aborted: {}", self.key, e),
        }
        result
    }

    async fn play(&mut self) -> Result<(), KeypadError> {
        let animation = Arc::clone(&self.animation);
        let frames = animation.frames();
        let mut cache = vec![FrameSlot::Pending; frames.len()];

        loop {
            let mut sent_any = false;

            for (index, frame) in frames.iter().enumerate() {
                check_cancelled(&self.cancel)?;
                self.shared.progress.lock().frame_index = index;

                let Some(payload) = self.encoded(&mut cache, index, frame) else {
                    continue;
                };
                self.send_frame(&payload).await?;
                sent_any = true;
                self.shared.progress.lock().last_sent = Some(Instant::now());

                let hold = Duration::from_millis(u64::from(frame.duration_ms()));
                cancellable_sleep(&mut self.cancel, hold).await?;
            }

            if !sent_any {
                return Err(KeypadError::NoPlayableFrames);
            }
            self.shared.progress.lock().loops_completed += 1;
            if !self.looping {
                return Ok(());
            }
        }
    }

    /// Encoded payload for a frame, encoding on first use
    ///
    /// Frames that fail to encode are skipped for the rest of the task.
    fn encoded(
        &self,
        cache: &mut [FrameSlot],
        index: usize,
        frame: &AnimationFrame,
    ) -> Option<Arc<Vec<u8>>> {
        if let FrameSlot::Pending = cache[index] {
            cache[index] = match jpeg::encode_rgba(
                frame.rgba(),
                self.animation.width(),
                self.animation.height(),
                self.settings.quality,
            ) {
                Ok(data) => {
                    debug!(
                        "Key {} frame {} encoded to {} bytes",
                        self.key,
                        index,
                        data.len()
                    );
                    FrameSlot::Encoded(Arc::new(data))
                }
                Err(e) => {
                    warn!("Skipping frame {} on key {}: {}", index, self.key, e);
                    FrameSlot::Failed
                }
            };
        }

        match &cache[index] {
            FrameSlot::Encoded(data) => Some(Arc::clone(data)),
            _ => None,
        }
    }

    async fn send_frame(&mut self, payload: &[u8]) -> Result<(), KeypadError> {
        let packets = packetize(self.key, self.settings.tile_size, payload)?;
        let pause = self.settings.timings.inter_packet_delay();
        for packet in packets {
            check_cancelled(&self.cancel)?;
            self.writer.write(packet.into_bytes()).await?;
            cancellable_sleep(&mut self.cancel, pause).await?;
        }
        Ok(())
    }
}

/// Cancelled when flagged or when the scheduler side went away
fn check_cancelled(cancel: &watch::Receiver<bool>) -> Result<(), KeypadError> {
    if *cancel.borrow() || cancel.has_changed().is_err() {
        Err(KeypadError::Cancelled)
    } else {
        Ok(())
    }
}

async fn cancellable_sleep(
    cancel: &mut watch::Receiver<bool>,
    duration: Duration,
) -> Result<(), KeypadError> {
    check_cancelled(cancel)?;
    let stopped = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancel.wait_for(|stop| *stop) => true,
    };
    if stopped {
        Err(KeypadError::Cancelled)
    } else {
        check_cancelled(cancel)
    }
}
