//! The reactor owns the interaction state of every notch overlay.
//!
//! Overlay windows forward mouse and drag callbacks here, the drag monitor
//! forwards phase changes, and ingestion tasks report the files they produce.
//! The reactor keeps `InteractionState` and the shelf coherent and publishes
//! every observable change as a [`NotchEvent`] for the UI layer.

mod events;
mod managers;
mod query;


use std::sync::Arc;
use std::sync::mpsc::SyncSender;

use events::drag::DragEventHandler;
use events::mouse::MouseEventHandler;
use events::system::SystemEventHandler;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::actor;
use crate::actor::drag_monitor::{DragPhase, DragSessionMonitor};
use crate::actor::hit_test::{
    self, DisplayPhase, DisplayState, InputRouter, InterceptDecision, NotchRouter, WindowRole,
};
use crate::actor::ingest::{Alert, IngestEvent, IngestNormalizer};
use crate::common::config::Config;
use crate::model::geometry;
use crate::model::interaction::{InteractionChange, InteractionState};
use crate::model::payload::PasteboardSnapshot;
use crate::model::shelf::{ShelfItem, ShelfItemId, ShelfItemStore};
use crate::sys::geometry::{Point, Rect};
use crate::sys::screen::{DisplayId, DisplayInfo};

pub type Sender = actor::Sender<Event>;
type Receiver = actor::Receiver<Event>;
pub use query::{QueryRequest, ReactorQueryHandle};

#[derive(Clone)]
pub struct ReactorHandle {
    sender: Sender,
    queries: ReactorQueryHandle,
}

impl ReactorHandle {
    pub fn new(sender: Sender, queries: ReactorQueryHandle) -> Self { Self { sender, queries } }

    pub fn sender(&self) -> Sender { self.sender.clone() }

    pub fn send(&self, event: Event) { self.sender.send(event) }
}

impl std::ops::Deref for ReactorHandle {
    type Target = ReactorQueryHandle;

    fn deref(&self) -> &Self::Target { &self.queries }
}

/// Where a drop lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropTarget {
    Shelf { display: DisplayId },
    Basket,
}

#[derive(Debug)]
pub enum Event {
    /// The display configuration changed. Always the first event on startup.
    ScreenParametersChanged(Vec<DisplayInfo>),

    MouseMoved {
        display: DisplayId,
        point: Point,
    },
    MouseDown {
        display: DisplayId,
        point: Point,
    },
    /// Asks the notch to expand or collapse, e.g. from a keyboard shortcut.
    SetExpanded {
        display: DisplayId,
        expanded: bool,
    },

    /// A native `draggingEntered` on the overlay of `display`. The reply
    /// carries the operation the window should return.
    DraggingEntered {
        display: DisplayId,
        point: Point,
        snapshot: PasteboardSnapshot,
        reply: Option<SyncSender<hit_test::DragOperation>>,
    },
    DraggingUpdated {
        display: DisplayId,
        point: Point,
    },
    DraggingExited {
        display: DisplayId,
    },
    PerformDrop {
        target: DropTarget,
        snapshot: PasteboardSnapshot,
        reply: Option<SyncSender<bool>>,
    },
    /// The drag session finished with the mouse button released, with or
    /// without a drop.
    DraggingEnded {
        display: Option<DisplayId>,
    },
    /// Forwarded from the drag monitor.
    DragPhaseChanged(DragPhase),

    /// Progress of an asynchronous ingestion started by a drop.
    Ingest {
        target: DropTarget,
        event: IngestEvent,
    },
    RemoveItem(ShelfItemId),
    RemoveBasketItem(ShelfItemId),
    ClearShelf,
    ClearBasket,

    ScreenLocked,
    ScreenUnlocked,

    Query(QueryRequest),
}

/// Everything on the shelf, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfContents {
    pub items: Vec<ShelfItem>,
    pub pinned: Vec<ShelfItem>,
    pub basket: Vec<ShelfItem>,
}

/// Changes published to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotchEvent {
    HoverChanged {
        from: Option<DisplayId>,
        to: Option<DisplayId>,
    },
    ExpandedChanged {
        from: Option<DisplayId>,
        to: Option<DisplayId>,
    },
    DropTargetChanged {
        from: Option<DisplayId>,
        to: Option<DisplayId>,
    },
    ShelfChanged(ShelfContents),
    /// A drop was accepted.
    Haptic,
    Alert(Alert),
}

impl From<InteractionChange> for NotchEvent {
    fn from(change: InteractionChange) -> Self {
        match change {
            InteractionChange::Hover { from, to } => NotchEvent::HoverChanged { from, to },
            InteractionChange::Expanded { from, to } => NotchEvent::ExpandedChanged { from, to },
            InteractionChange::DropTarget { from, to } => {
                NotchEvent::DropTargetChanged { from, to }
            }
        }
    }
}

pub struct Reactor {
    pub config: Config,
    interaction: InteractionState,
    shelf: ShelfItemStore,
    normalizer: Arc<IngestNormalizer>,
    display_manager: managers::DisplayManager,
    drag_manager: managers::DragManager,
    communication_manager: managers::CommunicationManager,
    routing_manager: managers::RoutingManager,
}

impl Reactor {
    /// Starts the reactor on the current tokio runtime.
    pub fn spawn(
        config: Config,
        monitor: Arc<DragSessionMonitor>,
        normalizer: Arc<IngestNormalizer>,
        notch_tx: actor::Sender<NotchEvent>,
        shutdown: CancellationToken,
    ) -> (ReactorHandle, JoinHandle<()>) {
        let (events_tx, events) = actor::channel();
        let mut reactor = Reactor::new(config, monitor, normalizer, notch_tx, shutdown);
        reactor.communication_manager.events_tx = Some(events_tx.clone());
        let query_handle = ReactorQueryHandle::new(events_tx.clone());
        let task = tokio::spawn(reactor.run(events));
        (ReactorHandle::new(events_tx, query_handle), task)
    }

    pub fn new(
        config: Config,
        monitor: Arc<DragSessionMonitor>,
        normalizer: Arc<IngestNormalizer>,
        notch_tx: actor::Sender<NotchEvent>,
        shutdown: CancellationToken,
    ) -> Reactor {
        let power_folders = config.settings.enable_power_folders;
        Reactor {
            config,
            interaction: InteractionState::new(),
            shelf: ShelfItemStore::new(power_folders),
            normalizer,
            display_manager: managers::DisplayManager::default(),
            drag_manager: managers::DragManager::new(monitor, shutdown),
            communication_manager: managers::CommunicationManager { notch_tx, events_tx: None },
            routing_manager: managers::RoutingManager { router: Box::new(NotchRouter) },
        }
    }

    pub fn with_router(mut self, router: Box<dyn InputRouter + Send>) -> Self {
        self.routing_manager.router = router;
        self
    }

    pub async fn run(mut self, mut events: Receiver) {
        let shutdown = self.drag_manager.shutdown_token();
        let mut phase_rx = self.drag_manager.monitor.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = events.recv() => {
                    let Some((span, event)) = next else { break };
                    span.in_scope(|| self.handle_loop_event(event));
                }
                Ok(()) = phase_rx.changed() => {
                    let phase = *phase_rx.borrow_and_update();
                    self.handle_event(Event::DragPhaseChanged(phase));
                }
            }
        }
        debug!("Reactor stopped");
    }

    fn handle_loop_event(&mut self, event: Event) {
        if let Event::Query(req) = event {
            self.handle_query_request(req);
            return;
        }
        self.handle_event(event);
    }

    #[instrument(name = "reactor::handle_event", skip(self), fields(event=?event))]
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ScreenParametersChanged(displays) => {
                SystemEventHandler::handle_screen_parameters_changed(self, displays)
            }
            Event::MouseMoved { display, point } => {
                MouseEventHandler::handle_mouse_moved(self, display, point)
            }
            Event::MouseDown { display, point } => {
                let action = MouseEventHandler::handle_mouse_down(self, display, point);
                trace!(?action, "Mouse down handled");
            }
            Event::SetExpanded { display, expanded } => {
                MouseEventHandler::handle_set_expanded(self, display, expanded)
            }
            Event::DraggingEntered { display, point, snapshot, reply } => {
                let op = DragEventHandler::handle_dragging_entered(self, display, point, &snapshot);
                if let Some(reply) = reply {
                    let _ = reply.send(op);
                }
            }
            Event::DraggingUpdated { display, point } => {
                DragEventHandler::handle_dragging_updated(self, display, point);
            }
            Event::DraggingExited { display } => {
                DragEventHandler::handle_dragging_exited(self, display)
            }
            Event::PerformDrop { target, snapshot, reply } => {
                let accepted = DragEventHandler::handle_perform_drop(self, target, &snapshot);
                if let Some(reply) = reply {
                    let _ = reply.send(accepted);
                }
            }
            Event::DraggingEnded { display } => {
                DragEventHandler::handle_dragging_ended(self, display)
            }
            Event::DragPhaseChanged(phase) => {
                DragEventHandler::handle_drag_phase_changed(self, phase)
            }
            Event::Ingest { target, event } => DragEventHandler::handle_ingest(self, target, event),
            Event::RemoveItem(id) => {
                if let Some(removed) = self.shelf.remove_item(id) {
                    debug!(deleted = ?removed.deleted, "Removed shelf item");
                    self.publish_shelf();
                }
            }
            Event::RemoveBasketItem(id) => {
                if let Some(removed) = self.shelf.remove_basket_item(id) {
                    debug!(deleted = ?removed.deleted, "Removed basket item");
                    self.publish_shelf();
                }
            }
            Event::ClearShelf => {
                let removed = self.shelf.clear_shelf();
                debug!(count = removed.len(), "Cleared shelf");
                self.publish_shelf();
            }
            Event::ClearBasket => {
                let removed = self.shelf.clear_basket();
                debug!(count = removed.len(), "Cleared basket");
                self.publish_shelf();
            }
            Event::ScreenLocked => SystemEventHandler::handle_screen_locked(self),
            Event::ScreenUnlocked => SystemEventHandler::handle_screen_unlocked(self),
            Event::Query(req) => self.handle_query_request(req),
        }
    }

    /// Applies a display configuration outside the event loop.
    pub fn set_displays(&mut self, displays: Vec<DisplayInfo>) {
        self.handle_event(Event::ScreenParametersChanged(displays))
    }

    pub fn interaction(&self) -> &InteractionState { &self.interaction }

    pub fn shelf(&self) -> &ShelfItemStore { &self.shelf }

    pub fn displays(&self) -> &[DisplayInfo] { &self.display_manager.displays }

    /// Phase and geometry of `display`, derived from scratch.
    pub fn display_state(&self, display: DisplayId) -> DisplayState {
        let settings = &self.config.settings;
        let phase =
            DisplayPhase::derive(display, &self.interaction, &self.drag_manager.monitor.phase());
        let geometry = match geometry::derive_for(
            &self.display_manager.displays,
            display,
            settings,
            self.shelf.row_count(),
        ) {
            Ok(geometry) => Some(geometry),
            Err(err) => {
                debug!("Geometry unavailable: {err}");
                None
            }
        };
        DisplayState {
            display,
            phase,
            geometry,
            shelf_enabled: settings.enable_notch_shelf,
        }
    }

    pub fn hit_test(&self, display: DisplayId, point: Point) -> InterceptDecision {
        self.routing_manager.router.route(point, &self.display_state(display))
    }

    pub fn tracking_rect(&self, display: DisplayId) -> Option<Rect> {
        self.routing_manager.router.tracking_rect(&self.display_state(display))
    }

    pub fn accepts_first_mouse(&self, display: DisplayId, key_window: Option<WindowRole>) -> bool {
        hit_test::accepts_first_mouse(&self.display_state(display), key_window)
    }

    pub fn shelf_contents(&self) -> ShelfContents {
        ShelfContents {
            items: self.shelf.items().cloned().collect(),
            pinned: self.shelf.pinned_folders().cloned().collect(),
            basket: self.shelf.basket_items().cloned().collect(),
        }
    }

    fn apply(&self, change: Option<InteractionChange>) {
        if let Some(change) = change {
            self.communication_manager.emit(change.into());
        }
    }

    fn publish_shelf(&self) {
        self.communication_manager.emit(NotchEvent::ShelfChanged(self.shelf_contents()));
    }
}
