//! Notify-driven log watcher.
//!
//! Owns the active [`WatchSession`], wakes it on filesystem changes or on a
//! fallback timer, and publishes [`WatchEvent`]s on a tokio channel.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use notify_debouncer_full::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::WatchError;
use super::events::{WatchEvent, WatchStatus};
use super::session::{PollOutcome, WatchSession};
use crate::alert::{AlertNotice, AlertThrottle, SharedThrottle};
use crate::config::{AlertConfig, WatchConfig};

/// Empty the file at `path` without removing it.
///
/// # Errors
///
/// Returns an error if the file cannot be opened for writing.
pub async fn truncate_file(path: &Path) -> Result<(), WatchError> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| WatchError::from_io(path, e))?;
    tracing::info!(path = %path.display(), "Log file emptied");
    Ok(())
}

/// Sends a session's poll results to the consumer.
#[derive(Debug, Clone)]
struct Publisher {
    path: PathBuf,
    events: mpsc::UnboundedSender<WatchEvent>,
    throttle: SharedThrottle,
    alerts: AlertConfig,
}

impl Publisher {
    fn send(&self, event: WatchEvent) -> Result<(), WatchError> {
        self.events.send(event).map_err(|_| WatchError::ChannelClosed)
    }

    fn publish(&self, outcome: PollOutcome) -> Result<(), WatchError> {
        if let Some(condition) = outcome.status {
            self.send(WatchEvent::Status {
                path: self.path.clone(),
                condition,
            })?;
        }
        if outcome.reset {
            self.send(WatchEvent::Reset {
                path: self.path.clone(),
            })?;
        }
        if outcome.entries.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        let alerts: Vec<AlertNotice> = if self.alerts.enabled {
            outcome
                .entries
                .iter()
                .filter(|entry| self.throttle.should_alert(entry, now))
                .map(|entry| AlertNotice::new(entry.clone(), self.alerts.body_limit))
                .collect()
        } else {
            Vec::new()
        };

        self.send(WatchEvent::EntriesAppended {
            path: self.path.clone(),
            entries: outcome.entries,
        })?;
        for notice in alerts {
            self.send(WatchEvent::Alert { notice })?;
        }
        Ok(())
    }
}

/// Queue a poll. A full channel means one is already queued, so bursts
/// collapse into a single follow-up poll.
fn wake(wake_tx: &mpsc::Sender<()>) {
    let _ = wake_tx.try_send(());
}

/// Poll once and publish while holding the session lock, so batches from
/// concurrent polls can never interleave.
async fn poll_and_publish(
    session: &Mutex<WatchSession>,
    publisher: &Publisher,
) -> Result<(), WatchError> {
    let mut session = session.lock().await;
    let outcome = session.poll().await;
    publisher.publish(outcome)
}

/// The running session and the task driving it.
struct ActiveWatch {
    path: PathBuf,
    session: Arc<Mutex<WatchSession>>,
    publisher: Publisher,
    wake_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ActiveWatch {
    /// Stop the driving task and wait for an in-flight poll to finish.
    async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(path = %self.path.display(), error = %e, "Watch task failed");
            }
        }
        tracing::info!(path = %self.path.display(), "Watch session stopped");
    }
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Watches one PHP log file at a time and streams its entries.
///
/// Filesystem notifications and the fallback timer both feed a wake
/// channel of capacity one, so wake-ups that arrive during a poll collapse
/// into a single follow-up poll and bytes are consumed strictly in order.
pub struct LogWatcher {
    config: WatchConfig,
    throttle: SharedThrottle,
    events: mpsc::UnboundedSender<WatchEvent>,
    active: Mutex<Option<ActiveWatch>>,
}

impl LogWatcher {
    /// Create a watcher with its own alert throttle.
    ///
    /// Returns the watcher and a receiver for watch events.
    #[must_use]
    pub fn new(config: WatchConfig) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let throttle = SharedThrottle::new(AlertThrottle::new(config.alerts.cooldown()));
        Self::with_throttle(config, throttle)
    }

    /// Create a watcher sharing an existing alert throttle.
    #[must_use]
    pub fn with_throttle(
        config: WatchConfig,
        throttle: SharedThrottle,
    ) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                throttle,
                events,
                active: Mutex::new(None),
            },
            event_rx,
        )
    }

    /// Path of the active session, if any.
    pub async fn watched_path(&self) -> Option<PathBuf> {
        self.active.lock().await.as_ref().map(|a| a.path.clone())
    }

    /// Begin watching `path`, replacing any active session.
    ///
    /// Honours the configured `from_beginning`. Emits `reset` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a regular file or is unreadable.
    pub async fn watch(&self, path: PathBuf) -> Result<(), WatchError> {
        self.start(path, self.config.from_beginning).await
    }

    /// Switch to `path`, reading it from the beginning. Emits `reset` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a regular file or is unreadable.
    pub async fn switch_to(&self, path: PathBuf) -> Result<(), WatchError> {
        self.start(path, true).await
    }

    /// Stop watching. Safe to call at any time, including when idle.
    pub async fn stop(&self) {
        let previous = self.active.lock().await.take();
        if let Some(active) = previous {
            active.shutdown().await;
        }
    }

    /// Poll the active session immediately.
    ///
    /// # Errors
    ///
    /// Returns `NotWatching` when no session is active, or `ChannelClosed`
    /// when the event receiver was dropped.
    pub async fn poll_now(&self) -> Result<(), WatchError> {
        let active = self.active.lock().await;
        let active = active.as_ref().ok_or(WatchError::NotWatching)?;
        poll_and_publish(&active.session, &active.publisher).await
    }

    /// Publish the active session's open entry without waiting for it to
    /// settle.
    ///
    /// # Errors
    ///
    /// Returns `NotWatching` when no session is active, or `ChannelClosed`
    /// when the event receiver was dropped.
    pub async fn flush(&self) -> Result<(), WatchError> {
        let active = self.active.lock().await;
        let active = active.as_ref().ok_or(WatchError::NotWatching)?;
        let mut session = active.session.lock().await;
        let outcome = PollOutcome {
            entries: session.flush().into_iter().collect(),
            ..PollOutcome::default()
        };
        active.publisher.publish(outcome)
    }

    /// Empty the file at `path`.
    ///
    /// When `path` is the watched file, the session restarts from offset 0
    /// and its next poll emits `reset`, however much is written in between.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for writing.
    pub async fn truncate(&self, path: &Path) -> Result<(), WatchError> {
        let guard = self.active.lock().await;
        let Some(active) = guard.as_ref().filter(|a| a.path == path) else {
            return truncate_file(path).await;
        };

        // Held across truncation so no poll sees the emptied file first.
        let mut session = active.session.lock().await;
        truncate_file(path).await?;
        session.mark_truncated();
        drop(session);

        wake(&active.wake_tx);
        Ok(())
    }

    async fn start(&self, path: PathBuf, from_beginning: bool) -> Result<(), WatchError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.shutdown().await;
        }

        let session = WatchSession::start(path.clone(), from_beginning, self.config.settle()).await?;
        let session = Arc::new(Mutex::new(session));

        let publisher = Publisher {
            path: path.clone(),
            events: self.events.clone(),
            throttle: self.throttle.clone(),
            alerts: self.config.alerts.clone(),
        };
        publisher.send(WatchEvent::Reset { path: path.clone() })?;

        let (wake_tx, wake_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let debouncer = match self.spawn_notify(&path, wake_tx.clone()) {
            Ok(debouncer) => Some(debouncer),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "File notifications unavailable, polling on timer only"
                );
                publisher.send(WatchEvent::Status {
                    path: path.clone(),
                    condition: WatchStatus::WatchUnavailable {
                        reason: e.to_string(),
                    },
                })?;
                None
            }
        };

        let task = tokio::spawn(drive(
            Arc::clone(&session),
            publisher.clone(),
            wake_rx,
            cancel.clone(),
            self.config.poll_interval(),
            debouncer,
        ));

        *active = Some(ActiveWatch {
            path,
            session,
            publisher,
            wake_tx,
            cancel,
            task: Some(task),
        });
        Ok(())
    }

    /// Watch the file's parent directory so creation and replacement are
    /// seen too.
    fn spawn_notify(
        &self,
        path: &Path,
        wake_tx: mpsc::Sender<()>,
    ) -> Result<impl Send + 'static, WatchError> {
        let file_name: Option<OsString> = path.file_name().map(OsString::from);
        let watch_target = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let mut debouncer = new_debouncer(
            self.config.debounce(),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let relevant = events.iter().any(|event| {
                        event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref())
                    });
                    if relevant {
                        wake(&wake_tx);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(error = %error, "File watcher error");
                    }
                }
            },
        )?;

        debouncer.watch(&watch_target, RecursiveMode::NonRecursive)?;
        tracing::debug!(target_dir = %watch_target.display(), "Watching directory");
        Ok(debouncer)
    }
}

/// Poll loop for one session. Runs until cancelled or the consumer goes
/// away. Cancellation is only observed between polls.
async fn drive<D: Send + 'static>(
    session: Arc<Mutex<WatchSession>>,
    publisher: Publisher,
    mut wake_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
    poll_interval: std::time::Duration,
    debouncer: Option<D>,
) {
    // Dropping the debouncer stops notifications.
    let _debouncer = debouncer;

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Some(()) = wake_rx.recv() => {}
            _ = interval.tick() => {}
        }

        if let Err(e) = poll_and_publish(&session, &publisher).await {
            tracing::debug!(path = %publisher.path.display(), error = %e, "Stopping watch task");
            break;
        }
    }
}
