use tracing::{debug, info, trace, warn};

use crate::actor::drag_monitor::DragPhase;
use crate::actor::hit_test::{self, DragOperation};
use crate::actor::ingest::IngestEvent;
use crate::actor::reactor::{DropTarget, Event, NotchEvent, Reactor};
use crate::model::payload::PasteboardSnapshot;
use crate::model::shelf::IngestedFile;
use crate::sys::geometry::Point;
use crate::sys::screen::DisplayId;

pub struct DragEventHandler;

impl DragEventHandler {
    /// Policy first: a rejected drag must leave no trace, so nothing is
    /// mutated before [`hit_test::evaluate_drag_entry`] accepts it.
    pub fn handle_dragging_entered(
        reactor: &mut Reactor,
        display: DisplayId,
        point: Point,
        snapshot: &PasteboardSnapshot,
    ) -> DragOperation {
        let op = hit_test::evaluate_drag_entry(&snapshot.drag_info(), &reactor.config.settings);
        if op == DragOperation::None {
            return op;
        }
        let state = reactor.display_state(display);
        if state.geometry.is_none() {
            debug!(display = %state.display, "Drag entered a display without geometry");
            return DragOperation::None;
        }

        // Some sources (Dock folders) never touch the drag pasteboard the way
        // the poller expects.
        reactor.drag_manager.monitor.force_set_dragging(true, point);
        reactor.drag_manager.last_location = Some(point);

        let change = reactor.interaction.set_drop_target(display);
        reactor.apply(change);
        Self::begin_transient_expansion(reactor, display);
        op
    }

    pub fn handle_dragging_updated(
        reactor: &mut Reactor,
        display: DisplayId,
        point: Point,
    ) -> DragOperation {
        reactor.drag_manager.last_location = Some(point);
        if reactor.interaction.is_drop_targeted(display) {
            DragOperation::Copy
        } else {
            DragOperation::None
        }
    }

    pub fn handle_dragging_exited(reactor: &mut Reactor, display: DisplayId) {
        let change = reactor.interaction.clear_drop_target(display);
        reactor.apply(change);
        Self::end_transient_expansion(reactor, display);
    }

    pub fn handle_dragging_ended(reactor: &mut Reactor, display: Option<DisplayId>) {
        let display = display.or(reactor.interaction.drop_target_display());
        if let Some(display) = display {
            Self::handle_dragging_exited(reactor, display);
        }
        let at = reactor.drag_manager.last_location.take().unwrap_or_default();
        reactor.drag_manager.monitor.force_set_dragging(false, at);
    }

    /// Watchdog for drags whose exit callback never arrived.
    pub fn handle_drag_phase_changed(reactor: &mut Reactor, phase: DragPhase) {
        match phase {
            DragPhase::Dragging { location } => {
                trace!(?location, "Drag in progress");
                reactor.drag_manager.last_location = Some(location);
            }
            DragPhase::Idle => {
                reactor.drag_manager.last_location = None;
                if let Some(expanded) = reactor.drag_manager.transient_expansion.take() {
                    debug!(display = %expanded, "Drag went idle; collapsing transient expansion");
                    let change = reactor.interaction.collapse(expanded);
                    reactor.apply(change);
                }
                if let Some(display) = reactor.interaction.drop_target_display() {
                    let change = reactor.interaction.clear_drop_target(display);
                    reactor.apply(change);
                }
            }
        }
    }

    /// Returns whether the drop was accepted. Deferred payloads are accepted
    /// right away and land on the shelf as they resolve.
    ///
    /// An accepted shelf drop makes the drag expansion stick; a failed one
    /// gives it back.
    pub fn handle_perform_drop(
        reactor: &mut Reactor,
        target: DropTarget,
        snapshot: &PasteboardSnapshot,
    ) -> bool {
        let accepted = Self::ingest_drop(reactor, target, snapshot);
        if let DropTarget::Shelf { display } = target {
            if accepted {
                reactor.drag_manager.commit_transient();
            } else {
                Self::end_transient_expansion(reactor, display);
            }
        }
        accepted
    }

    fn ingest_drop(
        reactor: &mut Reactor,
        target: DropTarget,
        snapshot: &PasteboardSnapshot,
    ) -> bool {
        if let DropTarget::Shelf { display } = target {
            let change = reactor.interaction.clear_drop_target(display);
            reactor.apply(change);
            if hit_test::evaluate_drag_entry(&snapshot.drag_info(), &reactor.config.settings)
                == DragOperation::None
            {
                return false;
            }
        }

        let Some(payload) = reactor.normalizer.classify(snapshot) else {
            debug!("Drop carried nothing we can ingest");
            return false;
        };
        debug!(?target, deferred = payload.is_deferred(), "Drop accepted");

        match reactor.normalizer.materialize_now(&payload) {
            Some(Ok(files)) => {
                Self::add_files(reactor, target, &files);
                reactor.communication_manager.emit(NotchEvent::Haptic);
                true
            }
            Some(Err(err)) => {
                warn!("Drop failed: {err}");
                if let Some(alert) = err.alert() {
                    reactor.communication_manager.emit(NotchEvent::Alert(alert));
                }
                false
            }
            None => {
                let Some(events_tx) = reactor.communication_manager.events_tx.clone() else {
                    warn!("No event channel for deferred ingestion");
                    return false;
                };
                let cancel = reactor.drag_manager.session_token();
                let spawned = reactor.normalizer.spawn_async(payload, cancel, move |event| {
                    events_tx.send(Event::Ingest { target, event })
                });
                match spawned {
                    Ok(_) => {
                        reactor.communication_manager.emit(NotchEvent::Haptic);
                        true
                    }
                    Err(err) => {
                        warn!("Could not start ingestion: {err}");
                        false
                    }
                }
            }
        }
    }

    pub fn handle_ingest(reactor: &mut Reactor, target: DropTarget, event: IngestEvent) {
        match event {
            IngestEvent::Item(file) => Self::add_files(reactor, target, &[file]),
            IngestEvent::Failed { reason } => debug!(%reason, "Ingestion item failed"),
            IngestEvent::Finished { succeeded, failed, alert } => {
                info!(succeeded, failed, "Ingestion finished");
                if let Some(alert) = alert {
                    reactor.communication_manager.emit(NotchEvent::Alert(alert));
                }
            }
        }
    }

    fn add_files(reactor: &mut Reactor, target: DropTarget, files: &[IngestedFile]) {
        match target {
            DropTarget::Shelf { display } => {
                let outcome =
                    reactor.shelf.add_items(files, reactor.config.settings.auto_expand_shelf);
                if outcome.added.is_empty() {
                    return;
                }
                if outcome.wants_expand && reactor.display_manager.get(display).is_some() {
                    let change = reactor.interaction.expand(display);
                    reactor.apply(change);
                }
            }
            DropTarget::Basket => {
                if reactor.shelf.add_basket_items(files).is_empty() {
                    return;
                }
            }
        }
        reactor.publish_shelf();
    }

    /// Expands `display` for the duration of the drag. An expansion the user
    /// asked for is left alone.
    fn begin_transient_expansion(reactor: &mut Reactor, id: DisplayId) {
        if !reactor.config.settings.auto_expand_shelf || reactor.interaction.is_expanded(id) {
            return;
        }
        let intentional = reactor.interaction.expanded_display().is_some()
            && reactor.drag_manager.transient_expansion.is_none();
        if intentional {
            trace!(display = %id, "Another display is expanded on purpose");
            return;
        }
        let change = reactor.interaction.expand(id);
        reactor.apply(change);
        reactor.drag_manager.transient_expansion = Some(id);
    }

    fn end_transient_expansion(reactor: &mut Reactor, display: DisplayId) {
        if !reactor.drag_manager.is_transient(display) {
            return;
        }
        reactor.drag_manager.transient_expansion = None;
        let change = reactor.interaction.collapse(display);
        reactor.apply(change);
    }
}
