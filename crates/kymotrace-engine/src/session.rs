//! Interactive tracing session.
//!
//! A [`TracingSession`] turns pointer events into background computations:
//!
//! - A click on a new source starts a map computation from it.
//! - A pointer move starts a preview path computation to the pointer,
//!   published as a [`Temporary`](PathEventKind::Temporary) event.
//! - A target click starts a finalizing path computation, published as a
//!   [`Final`](PathEventKind::Final) event and appended to the finalized
//!   segments. In chained mode the target then becomes the next source.
//!
//! Each computation runs on its own named thread and is cancelled through
//! its [`CancellationToken`] when superseded. Session state, the map and
//! path registries, the map handoff, the published paths and the visit
//! signal each have their own lock, and no thread ever holds two of them.
//!
//! Every change of source (new click, chain, double-click, reset) bumps a
//! session *epoch*. Registries refuse registrations from an older epoch,
//! which is what keeps a computation started just before a reset from
//! resurfacing after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::clock::{Clock, SystemClock};
use crate::grid::CostGrid;
use crate::map::{MapComputation, MapOutcome};
use crate::path::MapSources;
use crate::publish::{ListenerId, ListenerSet, PathEvent, PathEventKind, PathListener, PathStore};
use crate::registry::{MapHandoff, MapRegistry, PathKind, PathRegistry};
use crate::signal::VisitSignal;
use crate::types::{ComputationId, GridPoint, Path, Point, TracerConfig, TracerError, TracingMode};

/// Where the session is in the click sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawingState {
    /// No source chosen.
    #[default]
    Reset,
    /// A source is chosen and its map is running or ready.
    FirstClicked,
    /// A target was clicked; the double-click window is open.
    SecondClicked,
    /// A double-click ended the segment chain.
    SecondDoubleClicked,
}

/// A pointer event in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Click(Point),
    Move(Point),
}

/// What the session did with a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing: off-grid, disabled, or paused behind a finalization.
    Ignored,
    /// A new source was chosen and its map started.
    SourceSelected(GridPoint),
    /// A segment to this target is being finalized. `chained` is `true`
    /// if the target will become the next source.
    SegmentRequested { target: GridPoint, chained: bool },
    /// A double-click ended the chain.
    ChainEnded,
    /// A preview path to this point was requested.
    PreviewRequested(GridPoint),
}

#[derive(Debug, Default)]
struct SessionState {
    phase: DrawingState,
    enabled: bool,
    source: Option<GridPoint>,
    epoch: u64,
    /// Finalization in flight. While set, moves and new sources are
    /// ignored.
    pending: Option<ComputationId>,
    last_click: Option<Instant>,
    last_target: Option<GridPoint>,
}

/// State shared between the session handle and its worker threads.
struct Shared {
    grid: CostGrid,
    config: TracerConfig,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    state: Mutex<SessionState>,
    maps: MapRegistry,
    paths: PathRegistry,
    handoff: MapHandoff,
    store: PathStore,
    listeners: ListenerSet,
    signal: VisitSignal,
}

/// Interactive minimal-path tracer over one image.
///
/// Construct with [`TracingSession::new`], feed it pointer events with
/// [`click`](Self::click) and [`move_to`](Self::move_to), and observe
/// results through [`add_listener`](Self::add_listener) or
/// [`current_path`](Self::current_path). Dropping the session cancels
/// every computation it started.
pub struct TracingSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TracingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingSession")
            .field("dimensions", &self.shared.grid.dimensions())
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TracingSession {
    /// Start a session over `grid` using the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidConfig`] if `config` fails
    /// [`TracerConfig::validate`].
    pub fn new(grid: CostGrid, config: TracerConfig) -> Result<Self, TracerError> {
        Self::with_clock(grid, config, Arc::new(SystemClock))
    }

    /// Start a session with a custom clock for double-click timing.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidConfig`] if `config` fails
    /// [`TracerConfig::validate`].
    pub fn with_clock(
        grid: CostGrid,
        config: TracerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TracerError> {
        config.validate()?;
        tracing::debug!(
            width = grid.dimensions().width,
            height = grid.dimensions().height,
            alpha = config.alpha,
            connectivity = ?config.connectivity,
            mode = ?config.mode,
            "tracing session created"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                grid,
                config,
                clock,
                next_id: AtomicU64::new(1),
                state: Mutex::new(SessionState {
                    enabled: true,
                    ..SessionState::default()
                }),
                maps: MapRegistry::default(),
                paths: PathRegistry::default(),
                handoff: MapHandoff::default(),
                store: PathStore::default(),
                listeners: ListenerSet::default(),
                signal: VisitSignal::new(),
            }),
        })
    }

    /// Dispatch a pointer event.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::ThreadSpawn`] if a computation thread could
    /// not be started.
    pub fn handle(&self, event: PointerEvent) -> Result<Transition, TracerError> {
        match event {
            PointerEvent::Click(p) => self.click(p),
            PointerEvent::Move(p) => self.move_to(p),
        }
    }

    /// A click at `point`. Off-grid clicks are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::ThreadSpawn`] if a computation thread could
    /// not be started.
    pub fn click(&self, point: Point) -> Result<Transition, TracerError> {
        let Some(p) = point.to_grid(self.shared.grid.dimensions()) else {
            return Ok(Transition::Ignored);
        };
        let now = self.shared.clock.now();
        let shared = &self.shared;

        let mut state = shared.state.lock();
        if !state.enabled {
            return Ok(Transition::Ignored);
        }

        match (shared.config.mode, state.phase) {
            (TracingMode::Chained, DrawingState::SecondClicked)
                if state.last_click.is_some_and(|last| {
                    now.saturating_duration_since(last) < shared.config.double_click_window
                }) =>
            {
                state.phase = DrawingState::SecondDoubleClicked;
                state.last_click = None;
                state.epoch += 1;
                let epoch = state.epoch;
                let chained_source = state.source.take();

                if state.pending.is_some() {
                    let chained_target = state.last_target;
                    // The epoch bump stops the in-flight finalization from
                    // chaining.
                    drop(state);
                    tracing::debug!(point = %p, "double-click ends chain before it forms");
                    if let Some(next) = chained_target {
                        shared.maps.cancel_source(next, epoch);
                    }
                    shared.paths.cancel_previews();
                    shared.signal.notify();
                    return Ok(Transition::ChainEnded);
                }

                let same_target = state.last_target == Some(p);
                match chained_source {
                    Some(source) if !same_target => {
                        let id = shared.next_id();
                        state.pending = Some(id);
                        drop(state);
                        Shared::start_finalize(shared, id, source, p, None, epoch)?;
                        Ok(Transition::SegmentRequested {
                            target: p,
                            chained: false,
                        })
                    }
                    _ => {
                        drop(state);
                        tracing::debug!(point = %p, "double-click ends chain");
                        shared.maps.cancel_all(epoch);
                        shared.paths.cancel_previews();
                        shared.signal.notify();
                        Ok(Transition::ChainEnded)
                    }
                }
            }

            (TracingMode::Chained, DrawingState::FirstClicked | DrawingState::SecondClicked)
            | (TracingMode::Single, DrawingState::FirstClicked) => {
                if state.pending.is_some() {
                    return Ok(Transition::Ignored);
                }
                let Some(source) = state.source else {
                    return Ok(Transition::Ignored);
                };
                let chain = shared.config.mode == TracingMode::Chained;
                let id = shared.next_id();
                state.pending = Some(id);
                state.phase = DrawingState::SecondClicked;
                state.last_click = Some(now);
                state.last_target = Some(p);
                let epoch = state.epoch;
                drop(state);

                Shared::start_finalize(shared, id, source, p, chain.then_some(epoch), epoch)?;
                Ok(Transition::SegmentRequested {
                    target: p,
                    chained: chain,
                })
            }

            _ => {
                if state.pending.is_some() {
                    return Ok(Transition::Ignored);
                }
                state.epoch += 1;
                state.phase = DrawingState::FirstClicked;
                state.source = Some(p);
                state.last_click = None;
                state.last_target = None;
                let epoch = state.epoch;
                drop(state);

                shared.paths.cancel_all(epoch);
                Shared::start_map(shared, p, epoch)?;
                Ok(Transition::SourceSelected(p))
            }
        }
    }

    /// The pointer moved to `point`. Starts a preview path when a source
    /// is set and no finalization is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::ThreadSpawn`] if the path thread could not
    /// be started.
    pub fn move_to(&self, point: Point) -> Result<Transition, TracerError> {
        let Some(p) = point.to_grid(self.shared.grid.dimensions()) else {
            return Ok(Transition::Ignored);
        };
        let shared = &self.shared;

        let (source, epoch) = {
            let state = shared.state.lock();
            let tracking = match shared.config.mode {
                TracingMode::Chained => matches!(
                    state.phase,
                    DrawingState::FirstClicked | DrawingState::SecondClicked
                ),
                TracingMode::Single => state.phase == DrawingState::FirstClicked,
            };
            match state.source {
                Some(source) if state.enabled && tracking && state.pending.is_none() => {
                    (source, state.epoch)
                }
                _ => return Ok(Transition::Ignored),
            }
        };

        if Shared::start_preview(shared, source, p, epoch)? {
            Ok(Transition::PreviewRequested(p))
        } else {
            Ok(Transition::Ignored)
        }
    }

    /// Cancel everything, clear current and finalized paths, and return
    /// to [`DrawingState::Reset`]. Listeners receive a
    /// [`Reset`](PathEventKind::Reset) event with an empty path.
    pub fn reset(&self) {
        let shared = &self.shared;
        let epoch = {
            let mut state = shared.state.lock();
            state.phase = DrawingState::Reset;
            state.source = None;
            state.pending = None;
            state.last_click = None;
            state.last_target = None;
            state.epoch += 1;
            state.epoch
        };
        shared.cancel_all(epoch);
        shared.handoff.clear();
        shared.store.clear();
        shared.signal.notify();

        let id = shared.next_id();
        tracing::debug!(%id, "session reset");
        shared.dispatch(PathEvent {
            kind: PathEventKind::Reset,
            origin: id,
            path: Path::empty(),
        });
    }

    /// Stop reacting to pointer events and cancel live computations.
    /// Published paths are kept.
    pub fn disable(&self) {
        let shared = &self.shared;
        let epoch = {
            let mut state = shared.state.lock();
            state.enabled = false;
            state.phase = DrawingState::Reset;
            state.source = None;
            state.pending = None;
            state.epoch += 1;
            state.epoch
        };
        shared.cancel_all(epoch);
        shared.signal.notify();
    }

    /// React to pointer events again.
    pub fn enable(&self) {
        self.shared.state.lock().enabled = true;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Register a listener for path events.
    pub fn add_listener(&self, listener: impl PathListener + 'static) -> ListenerId {
        self.shared.listeners.add(Arc::new(listener))
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// A copy of the latest temporary or final path.
    #[must_use]
    pub fn current_path(&self) -> Option<Path> {
        self.shared.store.current()
    }

    /// Copies of the finalized segments, oldest first.
    #[must_use]
    pub fn finalized_paths(&self) -> Vec<Path> {
        self.shared.store.finalized()
    }

    #[must_use]
    pub fn state(&self) -> DrawingState {
        self.shared.state.lock().phase
    }

    /// The current source pixel, if one is set.
    #[must_use]
    pub fn source(&self) -> Option<GridPoint> {
        self.shared.state.lock().source
    }

    /// Returns `true` if the map for the current source has finished.
    #[must_use]
    pub fn is_map_ready(&self) -> bool {
        self.source()
            .is_some_and(|s| self.shared.handoff.current_for(s).is_some())
    }

    #[must_use]
    pub fn config(&self) -> &TracerConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn grid(&self) -> &CostGrid {
        &self.shared.grid
    }

    /// Block until no map, path or finalization is live, or `timeout`
    /// elapses. Returns `true` if the session went idle.
    ///
    /// A chained source's map counts as live, so after a target click this
    /// waits for the next source's map too.
    #[must_use]
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let shared = &self.shared;
        let deadline = Instant::now() + timeout;
        loop {
            let seen = shared.signal.generation();
            if shared.is_idle() {
                return true;
            }
            if !shared.signal.wait_past_until(seen, deadline) {
                return shared.is_idle();
            }
        }
    }
}

impl Drop for TracingSession {
    fn drop(&mut self) {
        let epoch = {
            let mut state = self.shared.state.lock();
            state.enabled = false;
            state.epoch += 1;
            state.epoch
        };
        self.shared.cancel_all(epoch);
        self.shared.signal.notify();
    }
}

/// Clears a finished path job's bookkeeping, however the job ends.
struct JobGuard<'a> {
    shared: &'a Shared,
    id: ComputationId,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.pending == Some(self.id) {
                state.pending = None;
            }
        }
        self.shared.paths.unregister(self.id);
        self.shared.signal.notify();
    }
}

impl Shared {
    fn next_id(&self) -> ComputationId {
        ComputationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn sources(&self) -> MapSources<'_> {
        MapSources {
            maps: &self.maps,
            handoff: &self.handoff,
            signal: &self.signal,
        }
    }

    fn cancel_all(&self, epoch: u64) {
        self.maps.cancel_all(epoch);
        self.paths.cancel_all(epoch);
    }

    fn is_idle(&self) -> bool {
        self.state.lock().pending.is_none() && self.maps.is_empty() && self.paths.is_empty()
    }

    fn dispatch(&self, event: PathEvent) {
        if let Err(err) = self.listeners.dispatch(event) {
            tracing::warn!(error = %err, "path event dropped");
        }
    }

    /// Register and spawn a map computation from `source`.
    fn start_map(this: &Arc<Self>, source: GridPoint, epoch: u64) -> Result<(), TracerError> {
        let id = this.next_id();
        let map = Arc::new(MapComputation::new(
            id,
            source,
            this.grid.dimensions(),
            &this.config,
        )?);
        if !this.maps.supersede(Arc::clone(&map), epoch) {
            tracing::debug!(%id, %source, "stale map not started");
            return Ok(());
        }
        // Waiting paths for the old source re-resolve and give up.
        this.signal.notify();
        tracing::debug!(%id, %source, "map computation started");

        let shared = Arc::clone(this);
        let thread_map = Arc::clone(&map);
        let spawned = std::thread::Builder::new()
            .name(format!("kymotrace-map-{}", id.0))
            .spawn(move || shared.run_map(&thread_map));
        if let Err(err) = spawned {
            map.cancel();
            this.maps.unregister(source, id);
            this.signal.notify();
            tracing::warn!(%id, error = %err, "could not start map thread");
            return Err(TracerError::ThreadSpawn(err));
        }
        Ok(())
    }

    fn run_map(&self, map: &MapComputation) {
        let (id, source) = (map.id(), map.source());
        match map.run(&self.grid, || self.signal.notify()) {
            MapOutcome::Completed(result) => {
                let settled = result.settled_count();
                if self.handoff.publish(result, map.token()) {
                    tracing::debug!(%id, %source, settled, "map computation ready");
                } else {
                    tracing::debug!(%id, %source, "map finished after cancel; discarded");
                }
            }
            MapOutcome::Cancelled => {
                tracing::debug!(%id, %source, "map computation cancelled");
            }
        }
        self.maps.unregister(source, id);
        self.signal.notify();
    }

    /// Spawn a preview from `source` to `target`. Returns `false` if
    /// `epoch` is stale and nothing was started.
    fn start_preview(
        this: &Arc<Self>,
        source: GridPoint,
        target: GridPoint,
        epoch: u64,
    ) -> Result<bool, TracerError> {
        let id = this.next_id();
        let token = CancellationToken::new();
        if !this.paths.register(id, token.clone(), PathKind::Preview, epoch) {
            return Ok(false);
        }
        // Wake superseded previews still waiting on the map.
        this.signal.notify();
        let mode = this.sources().mode_for(source);
        tracing::trace!(%id, %source, to = %target, ?mode, "preview path started");

        let shared = Arc::clone(this);
        this.spawn_path(id, "preview", move || {
            let _guard = JobGuard {
                shared: &shared,
                id,
            };
            match shared.sources().resolve(source, target, &token) {
                Ok(path) => {
                    if shared.store.publish_current(&path, &token) {
                        tracing::trace!(%id, points = path.len(), "temporary path published");
                        shared.dispatch(PathEvent {
                            kind: PathEventKind::Temporary,
                            origin: id,
                            path,
                        });
                    }
                }
                Err(TracerError::Cancelled) => {}
                Err(err) => tracing::warn!(%id, error = %err, "preview path failed"),
            }
        })?;
        Ok(true)
    }

    /// Spawn a finalization from `source` to `target`. With `chain_epoch`
    /// set, the target becomes the next source once the segment is
    /// published, provided the session epoch has not moved on.
    fn start_finalize(
        this: &Arc<Self>,
        id: ComputationId,
        source: GridPoint,
        target: GridPoint,
        chain_epoch: Option<u64>,
        epoch: u64,
    ) -> Result<(), TracerError> {
        let token = CancellationToken::new();
        if !this.paths.register(id, token.clone(), PathKind::Finalize, epoch) {
            let mut state = this.state.lock();
            if state.pending == Some(id) {
                state.pending = None;
            }
            return Ok(());
        }
        let mode = this.sources().mode_for(source);
        tracing::debug!(%id, %source, to = %target, ?mode, "finalizing segment");

        let shared = Arc::clone(this);
        let result = this.spawn_path(id, "finalize", move || {
            let _guard = JobGuard {
                shared: &shared,
                id,
            };
            let path = match shared.sources().resolve(source, target, &token) {
                Ok(path) => path,
                Err(TracerError::Cancelled) => return,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "segment could not be finalized");
                    return;
                }
            };
            if !shared.store.publish_final(&path, &token, shared.config.mode) {
                return;
            }
            tracing::debug!(%id, points = path.len(), "segment finalized");
            shared.dispatch(PathEvent {
                kind: PathEventKind::Final,
                origin: id,
                path,
            });

            if let Some(chain_epoch) = chain_epoch {
                Self::chain(&shared, target, chain_epoch);
            }
        });
        if result.is_err() {
            let mut state = this.state.lock();
            if state.pending == Some(id) {
                state.pending = None;
            }
        }
        result
    }

    /// Make `target` the next source unless the epoch moved on.
    fn chain(this: &Arc<Self>, target: GridPoint, chain_epoch: u64) {
        let epoch = {
            let mut state = this.state.lock();
            if state.epoch != chain_epoch {
                return;
            }
            state.epoch += 1;
            state.source = Some(target);
            state.epoch
        };
        if let Err(err) = Self::start_map(this, target, epoch) {
            tracing::warn!(error = %err, source = %target, "could not chain next source");
        }
    }

    fn spawn_path(
        &self,
        id: ComputationId,
        role: &str,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<(), TracerError> {
        std::thread::Builder::new()
            .name(format!("kymotrace-{role}-{}", id.0))
            .spawn(job)
            .map(drop)
            .map_err(|err| {
                self.paths.unregister(id);
                self.signal.notify();
                tracing::warn!(%id, error = %err, "could not start path thread");
                TracerError::ThreadSpawn(err)
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::publish::ChannelListener;

    const IDLE: Duration = Duration::from_secs(10);

    fn session(mode: TracingMode) -> (TracingSession, Arc<ManualClock>) {
        let grid = CostGrid::new(6, 6, vec![10.0; 36]).unwrap();
        let clock = Arc::new(ManualClock::new());
        let config = TracerConfig {
            alpha: 1.0,
            mode,
            ..TracerConfig::default()
        };
        let session = TracingSession::with_clock(grid, config, clock.clone()).unwrap();
        (session, clock)
    }

    #[test]
    fn rejects_invalid_config() {
        let grid = CostGrid::new(2, 2, vec![1.0; 4]).unwrap();
        let config = TracerConfig {
            alpha: 0.0,
            ..TracerConfig::default()
        };
        assert!(matches!(
            TracingSession::new(grid, config),
            Err(TracerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn off_grid_events_are_ignored() {
        let (session, _) = session(TracingMode::Chained);
        assert_eq!(
            session.click(Point::new(-3.0, 1.0)).unwrap(),
            Transition::Ignored
        );
        assert_eq!(session.state(), DrawingState::Reset);
        assert_eq!(
            session.move_to(Point::new(1.0, 99.0)).unwrap(),
            Transition::Ignored
        );
    }

    #[test]
    fn move_before_source_is_ignored() {
        let (session, _) = session(TracingMode::Chained);
        assert_eq!(
            session.move_to(Point::new(1.0, 1.0)).unwrap(),
            Transition::Ignored
        );
    }

    #[test]
    fn first_click_selects_source_and_map_becomes_ready() {
        let (session, _) = session(TracingMode::Chained);
        let t = session.click(Point::new(1.2, 0.8)).unwrap();
        assert_eq!(t, Transition::SourceSelected(GridPoint::new(1, 1)));
        assert_eq!(session.state(), DrawingState::FirstClicked);
        assert!(session.wait_until_idle(IDLE));
        assert!(session.is_map_ready());
        assert_eq!(session.source(), Some(GridPoint::new(1, 1)));
    }

    #[test]
    fn preview_publishes_temporary_path() {
        let (session, _) = session(TracingMode::Chained);
        let (listener, rx) = ChannelListener::channel();
        session.add_listener(listener);

        session.click(Point::new(0.0, 0.0)).unwrap();
        assert_eq!(
            session.move_to(Point::new(3.0, 3.0)).unwrap(),
            Transition::PreviewRequested(GridPoint::new(3, 3))
        );
        assert!(session.wait_until_idle(IDLE));

        let current = session.current_path().unwrap();
        assert_eq!(current.first(), Some(GridPoint::new(0, 0)));
        assert_eq!(current.last(), Some(GridPoint::new(3, 3)));
        assert!(session.finalized_paths().is_empty());

        let event = rx.recv_timeout(IDLE).unwrap();
        assert_eq!(event.kind, PathEventKind::Temporary);
        assert_eq!(event.path, current);
    }

    #[test]
    fn single_mode_replaces_the_finalized_path() {
        let (session, _) = session(TracingMode::Single);
        session.click(Point::new(0.0, 0.0)).unwrap();
        let t = session.click(Point::new(2.0, 0.0)).unwrap();
        assert_eq!(
            t,
            Transition::SegmentRequested {
                target: GridPoint::new(2, 0),
                chained: false,
            }
        );
        assert!(session.wait_until_idle(IDLE));
        assert_eq!(session.finalized_paths().len(), 1);
        assert_eq!(session.state(), DrawingState::SecondClicked);

        // Moves no longer track once the target is set.
        assert_eq!(
            session.move_to(Point::new(4.0, 4.0)).unwrap(),
            Transition::Ignored
        );

        // A third click starts over.
        assert_eq!(
            session.click(Point::new(5.0, 5.0)).unwrap(),
            Transition::SourceSelected(GridPoint::new(5, 5))
        );
        session.click(Point::new(5.0, 2.0)).unwrap();
        assert!(session.wait_until_idle(IDLE));
        let finalized = session.finalized_paths();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].first(), Some(GridPoint::new(5, 5)));
    }

    #[test]
    fn reset_clears_everything_and_notifies() {
        let (session, _) = session(TracingMode::Chained);
        let (listener, rx) = ChannelListener::channel();
        session.add_listener(listener);
        session.click(Point::new(0.0, 0.0)).unwrap();
        session.click(Point::new(3.0, 0.0)).unwrap();
        assert!(session.wait_until_idle(IDLE));
        assert_eq!(session.finalized_paths().len(), 1);

        session.reset();
        assert_eq!(session.state(), DrawingState::Reset);
        assert!(session.current_path().is_none());
        assert!(session.finalized_paths().is_empty());
        assert!(session.source().is_none());

        let reset = rx
            .iter()
            .find(|e| e.kind == PathEventKind::Reset)
            .unwrap();
        assert!(reset.path.is_empty());
    }

    #[test]
    fn preview_from_a_stale_epoch_starts_nothing() {
        let (session, _) = session(TracingMode::Chained);
        session.click(Point::new(0.0, 0.0)).unwrap();
        let stale = session.shared.state.lock().epoch;
        session.reset();

        let started = Shared::start_preview(
            &session.shared,
            GridPoint::new(0, 0),
            GridPoint::new(2, 2),
            stale,
        )
        .unwrap();
        assert!(!started);
        assert!(session.shared.paths.is_empty());
        assert!(session.wait_until_idle(IDLE));
        assert!(session.current_path().is_none());
    }

    #[test]
    fn disabled_session_ignores_clicks() {
        let (session, _) = session(TracingMode::Chained);
        session.disable();
        assert!(!session.is_enabled());
        assert_eq!(
            session.click(Point::new(1.0, 1.0)).unwrap(),
            Transition::Ignored
        );
        session.enable();
        assert_eq!(
            session.click(Point::new(1.0, 1.0)).unwrap(),
            Transition::SourceSelected(GridPoint::new(1, 1))
        );
        assert!(session.wait_until_idle(IDLE));
    }
}
