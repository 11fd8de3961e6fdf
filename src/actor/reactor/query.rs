use std::sync::mpsc::{RecvError, SyncSender, sync_channel};

use crate::actor::hit_test::{DisplayState, DragOperation, InterceptDecision, WindowRole};
use crate::actor::reactor::{DropTarget, Event, Reactor, Sender, ShelfContents};
use crate::model::payload::PasteboardSnapshot;
use crate::sys::geometry::{Point, Rect};
use crate::sys::screen::DisplayId;

/// Synchronous access to the reactor for window callbacks that must answer
/// before returning (`hitTest`, `draggingEntered`, ...).
///
/// Every method blocks until the reactor has processed the request. If the
/// reactor is gone the answer is the one that leaves the app underneath
/// undisturbed.
#[derive(Clone)]
pub struct ReactorQueryHandle {
    tx: Sender,
}

impl ReactorQueryHandle {
    pub(super) fn new(tx: Sender) -> Self { Self { tx } }

    fn send_event<T>(&self, build: impl FnOnce(SyncSender<T>) -> Event) -> Result<T, RecvError> {
        let (tx, rx) = sync_channel(1);
        if self.tx.try_send(build(tx)).is_err() {
            return Err(RecvError);
        }
        rx.recv().map_err(|_| RecvError)
    }

    fn send_query<T>(
        &self,
        build: impl FnOnce(SyncSender<T>) -> QueryRequest,
    ) -> Result<T, RecvError> {
        self.send_event(|tx| Event::Query(build(tx)))
    }

    pub fn hit_test(&self, display: DisplayId, point: Point) -> InterceptDecision {
        self.send_query(|resp| QueryRequest::HitTest { display, point, resp })
            .unwrap_or(InterceptDecision::PassThrough)
    }

    pub fn tracking_rect(&self, display: DisplayId) -> Option<Rect> {
        self.send_query(|resp| QueryRequest::TrackingRect { display, resp })
            .ok()
            .flatten()
    }

    pub fn accepts_first_mouse(&self, display: DisplayId, key_window: Option<WindowRole>) -> bool {
        self.send_query(|resp| QueryRequest::AcceptsFirstMouse { display, key_window, resp })
            .unwrap_or(false)
    }

    pub fn display_state(&self, display: DisplayId) -> Option<DisplayState> {
        self.send_query(|resp| QueryRequest::DisplayState { display, resp }).ok()
    }

    pub fn shelf(&self) -> ShelfContents {
        self.send_query(QueryRequest::Shelf).unwrap_or_default()
    }

    pub fn dragging_entered(
        &self,
        display: DisplayId,
        point: Point,
        snapshot: PasteboardSnapshot,
    ) -> DragOperation {
        self.send_event(|reply| Event::DraggingEntered {
            display,
            point,
            snapshot,
            reply: Some(reply),
        })
        .unwrap_or(DragOperation::None)
    }

    pub fn perform_drop(&self, target: DropTarget, snapshot: PasteboardSnapshot) -> bool {
        self.send_event(|reply| Event::PerformDrop { target, snapshot, reply: Some(reply) })
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub enum QueryRequest {
    HitTest {
        display: DisplayId,
        point: Point,
        resp: SyncSender<InterceptDecision>,
    },
    TrackingRect {
        display: DisplayId,
        resp: SyncSender<Option<Rect>>,
    },
    AcceptsFirstMouse {
        display: DisplayId,
        key_window: Option<WindowRole>,
        resp: SyncSender<bool>,
    },
    DisplayState {
        display: DisplayId,
        resp: SyncSender<DisplayState>,
    },
    Shelf(SyncSender<ShelfContents>),
}

impl Reactor {
    pub(super) fn handle_query_request(&mut self, req: QueryRequest) {
        match req {
            QueryRequest::HitTest { display, point, resp } => {
                let _ = resp.send(self.hit_test(display, point));
            }
            QueryRequest::TrackingRect { display, resp } => {
                let _ = resp.send(self.tracking_rect(display));
            }
            QueryRequest::AcceptsFirstMouse { display, key_window, resp } => {
                let _ = resp.send(self.accepts_first_mouse(display, key_window));
            }
            QueryRequest::DisplayState { display, resp } => {
                let _ = resp.send(self.display_state(display));
            }
            QueryRequest::Shelf(resp) => {
                let _ = resp.send(self.shelf_contents());
            }
        }
    }
}
