//! Result publication and listener dispatch.
//!
//! [`PathStore`] holds the current (temporary) path and the finalized
//! segments behind one lock. Writers replace whole paths; readers get deep
//! copies. A computation's cancellation token is checked inside the same
//! critical section as the write, so a computation cancelled before a
//! reset or a new source can never overwrite what came after it.
//!
//! [`ListenerSet`] fans events out to registered [`PathListener`]s on a
//! short-lived thread per event. Listener code never runs on a map or
//! path thread and never sees a buffer that is still being written.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::types::{ComputationId, Path, TracerError, TracingMode};

/// What a [`PathEvent`] announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathEventKind {
    /// The session was reset; the path is empty.
    Reset,
    /// A preview toward the pointer. Superseded by the next one.
    Temporary,
    /// A committed segment.
    Final,
}

/// A path published by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEvent {
    pub kind: PathEventKind,
    /// The computation that produced the path.
    pub origin: ComputationId,
    pub path: Path,
}

/// Receives path events from a [`TracingSession`](crate::TracingSession).
///
/// Called on a dispatch thread, never on the caller's thread. Events from
/// different computations may arrive out of order; use
/// [`PathEvent::origin`] to tell them apart.
pub trait PathListener: Send + Sync {
    fn on_path_event(&self, event: &PathEvent);
}

impl<F> PathListener for F
where
    F: Fn(&PathEvent) + Send + Sync,
{
    fn on_path_event(&self, event: &PathEvent) {
        self(event);
    }
}

/// A listener that forwards every event into a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<PathEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, Receiver<PathEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl PathListener for ChannelListener {
    fn on_path_event(&self, event: &PathEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// Handle returned by [`TracingSession::add_listener`](crate::TracingSession::add_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn PathListener>)>,
}

/// Registered listeners.
#[derive(Default)]
pub(crate) struct ListenerSet {
    inner: Mutex<Listeners>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("count", &self.inner.lock().entries.len())
            .finish()
    }
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Arc<dyn PathListener>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(entry, _)| *entry != id);
        inner.entries.len() != before
    }

    /// Deliver `event` to every listener on a fresh dispatch thread.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::ThreadSpawn`] if the thread could not be
    /// started; the event is dropped.
    pub(crate) fn dispatch(&self, event: PathEvent) -> Result<(), TracerError> {
        let listeners: Vec<Arc<dyn PathListener>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        if listeners.is_empty() {
            return Ok(());
        }

        std::thread::Builder::new()
            .name("kymotrace-dispatch".to_string())
            .spawn(move || {
                for listener in &listeners {
                    listener.on_path_event(&event);
                }
            })
            .map(drop)
            .map_err(TracerError::ThreadSpawn)
    }
}

#[derive(Debug, Default)]
struct Published {
    current: Option<Path>,
    finalized: Vec<Path>,
}

/// The session's current and finalized paths.
#[derive(Debug, Default)]
pub(crate) struct PathStore {
    inner: Mutex<Published>,
}

impl PathStore {
    /// Replace the current path unless `token` was cancelled.
    pub(crate) fn publish_current(&self, path: &Path, token: &CancellationToken) -> bool {
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return false;
        }
        inner.current = Some(path.clone());
        true
    }

    /// Commit a segment unless `token` was cancelled. It also becomes the
    /// current path. In single mode it replaces any earlier segment.
    pub(crate) fn publish_final(
        &self,
        path: &Path,
        token: &CancellationToken,
        mode: TracingMode,
    ) -> bool {
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return false;
        }
        inner.current = Some(path.clone());
        if mode == TracingMode::Single {
            inner.finalized.clear();
        }
        inner.finalized.push(path.clone());
        true
    }

    pub(crate) fn current(&self) -> Option<Path> {
        self.inner.lock().current.clone()
    }

    pub(crate) fn finalized(&self) -> Vec<Path> {
        self.inner.lock().finalized.clone()
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.current = None;
        inner.finalized.clear();
    }
}
