use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Event, NotchEvent};
use crate::actor;
use crate::actor::drag_monitor::DragSessionMonitor;
use crate::actor::hit_test::InputRouter;
use crate::model::geometry;
use crate::sys::geometry::Point;
use crate::sys::screen::{DisplayId, DisplayInfo};

/// Manages the current display configuration
#[derive(Default)]
pub struct DisplayManager {
    pub displays: Vec<DisplayInfo>,
}

impl DisplayManager {
    pub fn ids(&self) -> Vec<DisplayId> { self.displays.iter().map(|d| d.id).collect() }

    pub fn get(&self, id: DisplayId) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.id == id)
    }

    pub fn display_at(&self, point: Point) -> Option<&DisplayInfo> {
        geometry::display_at(&self.displays, point)
    }

    pub fn notch_display(&self) -> Option<DisplayId> {
        geometry::resolve_notch_display(&self.displays)
    }
}

/// Manages drag sessions and the expansion they cause
pub struct DragManager {
    pub monitor: Arc<DragSessionMonitor>,
    /// Display expanded only for the current drag. Collapsed again when the
    /// drag leaves or ends without a drop.
    pub transient_expansion: Option<DisplayId>,
    pub last_location: Option<Point>,
    shutdown: CancellationToken,
    sessions: CancellationToken,
}

impl DragManager {
    pub fn new(monitor: Arc<DragSessionMonitor>, shutdown: CancellationToken) -> Self {
        let sessions = shutdown.child_token();
        DragManager {
            monitor,
            transient_expansion: None,
            last_location: None,
            shutdown,
            sessions,
        }
    }

    /// Token for one ingestion; cancelled on lock and on shutdown.
    pub fn session_token(&self) -> CancellationToken { self.sessions.child_token() }

    /// Cancels every in-flight ingestion and starts a fresh generation.
    pub fn cancel_sessions(&mut self) {
        debug!("Cancelling in-flight ingestion");
        self.sessions.cancel();
        self.sessions = self.shutdown.child_token();
    }

    pub fn shutdown_token(&self) -> CancellationToken { self.shutdown.clone() }

    pub fn is_transient(&self, display: DisplayId) -> bool {
        self.transient_expansion == Some(display)
    }

    /// Makes the current expansion intentional.
    pub fn commit_transient(&mut self) {
        if let Some(committed) = self.transient_expansion.take() {
            trace!(display = %committed, "Transient expansion committed");
        }
    }
}

/// Manages communication channels to other actors
pub struct CommunicationManager {
    pub notch_tx: actor::Sender<NotchEvent>,
    pub events_tx: Option<actor::Sender<Event>>,
}

impl CommunicationManager {
    pub fn emit(&self, event: NotchEvent) {
        trace!(?event, "Notch event");
        self.notch_tx.send(event);
    }
}

/// Manages how input is routed
pub struct RoutingManager {
    pub router: Box<dyn InputRouter + Send>,
}
