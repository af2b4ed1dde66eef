//! Watcher lifecycle and the background polling loop
//!
//! `Created -> Running -> Stopped`, with no restart. The loop owns the
//! baseline cache; the watched-root set is shared with `add()` behind a
//! mutex and cloned once per tick.

use crate::config::WatcherConfig;
use crate::error::WatchError;
use crate::event::Event;
use crate::ignore::Ignore;
use crate::poller::Poller;
use crate::snapshot::{self, Node};
use crate::Result;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, roots may be added, no loop yet
    Created,
    /// Polling loop is active
    Running,
    /// Terminal; both streams are (or are about to be) closed
    Stopped,
}

/// Sending halves of the output streams
struct Streams {
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<WatchError>,
}

impl Streams {
    /// Close the error stream, then the event stream
    fn close(self) {
        let Self { events, errors } = self;
        drop(errors);
        drop(events);
    }
}

enum State {
    Created(Streams),
    Running { shutdown: oneshot::Sender<()> },
    Stopped,
}

/// Polling file system watcher
///
/// Dropping a running watcher also stops its loop.
pub struct Watcher {
    config: WatcherConfig,
    ignore: Arc<dyn Ignore>,
    roots: Arc<Mutex<BTreeSet<PathBuf>>>,
    state: Mutex<State>,
    events: Mutex<Option<mpsc::Receiver<Event>>>,
    errors: Mutex<Option<mpsc::Receiver<WatchError>>>,
}

impl Watcher {
    /// Create a watcher; nothing is scanned until `start()`
    pub fn new(config: WatcherConfig, ignore: impl Ignore + 'static) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity.max(1));

        Self {
            config,
            ignore: Arc::new(ignore),
            roots: Arc::new(Mutex::new(BTreeSet::new())),
            state: Mutex::new(State::Created(Streams {
                events: events_tx,
                errors: errors_tx,
            })),
            events: Mutex::new(Some(events_rx)),
            errors: Mutex::new(Some(errors_rx)),
        }
    }

    /// Create a watcher with default capacities and the given poll interval
    pub fn with_interval(interval: Duration, ignore: impl Ignore + 'static) -> Self {
        Self::new(WatcherConfig::default().with_interval(interval), ignore)
    }

    /// Register a root to watch
    ///
    /// Allowed before and after `start()`. Adding a root twice is a no-op.
    /// The root is not scanned here; scan failures show up on the error
    /// stream at the next tick.
    pub fn add(&self, path: impl Into<PathBuf>) -> Result<()> {
        if matches!(*self.state.lock(), State::Stopped) {
            return Err(WatchError::Stopped);
        }

        let path = path.into();
        if self.roots.lock().insert(path.clone()) {
            debug!("Watching {}", path.display());
        }
        Ok(())
    }

    /// Currently registered roots
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.lock().iter().cloned().collect()
    }

    /// Spawn the polling loop on the current tokio runtime
    ///
    /// Returns immediately. The first tick fires one interval from now.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();

        match std::mem::replace(&mut *state, State::Stopped) {
            State::Created(streams) => {
                let Ok(handle) = Handle::try_current() else {
                    *state = State::Created(streams);
                    return Err(WatchError::NoRuntime);
                };

                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                let poll_loop = PollLoop {
                    interval: self.config.interval(),
                    ignore: Arc::clone(&self.ignore),
                    roots: Arc::clone(&self.roots),
                    poller: Poller::new(),
                    streams,
                    shutdown: shutdown_rx,
                };
                handle.spawn(poll_loop.run());

                *state = State::Running {
                    shutdown: shutdown_tx,
                };
                info!("Started polling (interval: {:?})", self.config.interval());
                Ok(())
            }
            running @ State::Running { .. } => {
                *state = running;
                Err(WatchError::AlreadyRunning)
            }
            State::Stopped => Err(WatchError::Stopped),
        }
    }

    /// Stop the watcher and close both streams
    ///
    /// Idempotent. A scan already in progress finishes first; the loop then
    /// closes the error stream followed by the event stream.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();

        match std::mem::replace(&mut *state, State::Stopped) {
            State::Created(streams) => {
                streams.close();
                info!("Watcher stopped before start");
            }
            State::Running { shutdown } => {
                // Err means the loop is already gone
                let _ = shutdown.send(());
                info!("Stopping polling loop");
            }
            State::Stopped => trace!("Watcher already stopped"),
        }
        Ok(())
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        match *self.state.lock() {
            State::Created(_) => Lifecycle::Created,
            State::Running { .. } => Lifecycle::Running,
            State::Stopped => Lifecycle::Stopped,
        }
    }

    /// Take the event stream; `None` once it has been taken
    ///
    /// The stream ends (yields `None`) after the watcher stops.
    pub fn events(&self) -> Option<mpsc::Receiver<Event>> {
        self.events.lock().take()
    }

    /// Take the error stream; `None` once it has been taken
    pub fn errors(&self) -> Option<mpsc::Receiver<WatchError>> {
        self.errors.lock().take()
    }

    /// Poll interval in use
    pub fn interval(&self) -> Duration {
        self.config.interval()
    }
}

/// State owned by the background task
struct PollLoop {
    interval: Duration,
    ignore: Arc<dyn Ignore>,
    roots: Arc<Mutex<BTreeSet<PathBuf>>>,
    poller: Poller,
    streams: Streams,
    shutdown: oneshot::Receiver<()>,
}

impl PollLoop {
    async fn run(mut self) {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Resolves on stop() and when the Watcher is dropped
                _ = &mut self.shutdown => break,
                _ = timer.tick() => {
                    if self.tick().await.is_break() {
                        break;
                    }
                }
            }
        }

        self.streams.close();
        info!("Polling loop stopped");
    }

    /// Scan every root once, in order
    async fn tick(&mut self) -> ControlFlow<()> {
        let roots: Vec<PathBuf> = self.roots.lock().iter().cloned().collect();

        for root in roots {
            match self.scan(&root).await {
                Ok(current) => {
                    let events = self.poller.observe(&root, current);
                    if !events.is_empty() {
                        debug!("{}: {} change(s)", root.display(), events.len());
                    }
                    for event in events {
                        if deliver(&self.streams.events, event, &mut self.shutdown).await.is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                }
                Err(err) => {
                    warn!("Scan failed, keeping previous snapshot: {}", err);
                    if deliver(&self.streams.errors, err, &mut self.shutdown).await.is_break() {
                        return ControlFlow::Break(());
                    }
                }
            }
        }

        ControlFlow::Continue(())
    }

    /// Build a snapshot off the async workers and wait for it
    async fn scan(&self, root: &Path) -> Result<Node> {
        let ignore = Arc::clone(&self.ignore);
        let path = root.to_path_buf();

        match task::spawn_blocking(move || snapshot::build(&path, ignore.as_ref())).await {
            Ok(result) => result,
            Err(join_err) => Err(WatchError::ScanAborted {
                path: root.to_path_buf(),
                reason: join_err.to_string(),
            }),
        }
    }
}

/// Push one item, waiting for queue space but giving up on shutdown
///
/// Items for a dropped receiver are discarded.
async fn deliver<T>(
    sender: &mpsc::Sender<T>,
    item: T,
    shutdown: &mut oneshot::Receiver<()>,
) -> ControlFlow<()> {
    if sender.is_closed() {
        trace!("Stream receiver dropped, discarding item");
        return ControlFlow::Continue(());
    }

    tokio::select! {
        biased;
        _ = shutdown => ControlFlow::Break(()),
        sent = sender.send(item) => {
            if sent.is_err() {
                trace!("Stream receiver dropped, discarding item");
            }
            ControlFlow::Continue(())
        }
    }
}
