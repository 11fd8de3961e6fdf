//! Tracks whether a drag is in progress anywhere on screen.
//!
//! Window drag callbacks only fire once the cursor is over one of our
//! windows, so a background poller samples the drag pasteboard and the mouse
//! buttons to notice a drag early. Polling is best effort: a missed drag only
//! means input passes through, and a stuck drag is cleared by
//! [`DragSessionMonitor::force_reset`], which is called around screen lock
//! and unlock where the system drag state is known to desync.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::sys::geometry::Point;
use crate::sys::pasteboard::{DragProbe, ProbeSample};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging { location: Point },
}

impl DragPhase {
    pub fn is_dragging(&self) -> bool { matches!(self, DragPhase::Dragging { .. }) }

    pub fn location(&self) -> Option<Point> {
        match self {
            DragPhase::Dragging { location } => Some(*location),
            DragPhase::Idle => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    phase: DragPhase,
    /// Last pasteboard change count that was consumed. `None` right after
    /// startup or a reset; the next sample is then adopted without starting
    /// a drag.
    baseline: Option<i64>,
    reset_epoch: u64,
}

pub struct DragSessionMonitor {
    state: Mutex<State>,
    phase_tx: watch::Sender<DragPhase>,
}

impl Default for DragSessionMonitor {
    fn default() -> Self { Self::new() }
}

impl DragSessionMonitor {
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(DragPhase::Idle);
        Self {
            state: Mutex::new(State::default()),
            phase_tx,
        }
    }

    pub fn phase(&self) -> DragPhase { self.state.lock().phase }

    pub fn is_dragging(&self) -> bool { self.phase().is_dragging() }

    pub fn reset_epoch(&self) -> u64 { self.state.lock().reset_epoch }

    pub fn subscribe(&self) -> watch::Receiver<DragPhase> { self.phase_tx.subscribe() }

    fn publish(&self, state: &mut State, phase: DragPhase) -> bool {
        if state.phase == phase {
            return false;
        }
        let started_or_ended = state.phase.is_dragging() != phase.is_dragging();
        state.phase = phase;
        self.phase_tx.send_replace(phase);
        if started_or_ended {
            debug!(?phase, "Drag phase changed");
        }
        true
    }

    /// Feeds one probe sample through the state machine. Returns the new
    /// phase if it changed.
    pub fn poll_once(&self, sample: Option<ProbeSample>) -> Option<DragPhase> {
        let sample = sample?;
        let mut state = self.state.lock();
        let Some(baseline) = state.baseline else {
            trace!(change_count = sample.change_count, "Adopting pasteboard baseline");
            state.baseline = Some(sample.change_count);
            return None;
        };
        let next = match state.phase {
            DragPhase::Idle
                if sample.primary_button_down
                    && sample.has_items
                    && sample.change_count != baseline =>
            {
                state.baseline = Some(sample.change_count);
                DragPhase::Dragging { location: sample.location }
            }
            DragPhase::Idle => return None,
            DragPhase::Dragging { .. } if !sample.primary_button_down => DragPhase::Idle,
            DragPhase::Dragging { .. } => DragPhase::Dragging { location: sample.location },
        };
        self.publish(&mut state, next).then_some(next)
    }

    /// Overrides the poller from a window callback, for drags whose source
    /// does not populate the drag pasteboard the usual way.
    pub fn force_set_dragging(&self, dragging: bool, at: Point) {
        let phase = if dragging {
            DragPhase::Dragging { location: at }
        } else {
            DragPhase::Idle
        };
        let mut state = self.state.lock();
        self.publish(&mut state, phase);
    }

    /// Unconditionally returns to idle. The pasteboard is re-baselined so a
    /// stale pasteboard does not re-arm the drag on the next tick.
    pub fn force_reset(&self) {
        let mut state = self.state.lock();
        state.baseline = None;
        state.reset_epoch += 1;
        let was_dragging = state.phase.is_dragging();
        self.publish(&mut state, DragPhase::Idle);
        info!(epoch = state.reset_epoch, was_dragging, "Drag state reset");
    }

    /// Polls `probe` every `interval` until `cancel` fires.
    pub fn spawn_poller(
        self: &Arc<Self>,
        probe: Arc<dyn DragProbe>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.poll_once(probe.sample());
                    }
                }
            }
            debug!("Drag poller stopped");
        })
    }
}
