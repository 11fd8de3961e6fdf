use tracing::{debug, trace};

use crate::actor::hit_test::{self, HitZone, InterceptDecision, MouseDownAction};
use crate::actor::reactor::Reactor;
use crate::sys::geometry::Point;
use crate::sys::screen::DisplayId;

pub struct MouseEventHandler;

impl MouseEventHandler {
    pub fn handle_mouse_moved(reactor: &mut Reactor, display: DisplayId, point: Point) {
        let hovering = matches!(
            reactor.hit_test(display, point),
            InterceptDecision::Intercept(HitZone::Notch | HitZone::HoverMargin | HitZone::Shelf)
        );
        let change = reactor.interaction.set_hovering(display, hovering);
        reactor.apply(change);
    }

    pub fn handle_mouse_down(
        reactor: &mut Reactor,
        display: DisplayId,
        point: Point,
    ) -> MouseDownAction {
        let state = reactor.display_state(display);
        let decision = reactor.routing_manager.router.route(point, &state);
        let action = hit_test::mouse_down_action(decision, state.phase);
        trace!(display = %state.display, phase = %state.phase, ?action, "Mouse down");
        if action == MouseDownAction::ToggleExpansion {
            // A click makes whatever expansion results intentional.
            reactor.drag_manager.commit_transient();
            let change = reactor.interaction.toggle(display);
            reactor.apply(change);
        }
        action
    }

    pub fn handle_set_expanded(reactor: &mut Reactor, id: DisplayId, expanded: bool) {
        if reactor.display_manager.get(id).is_none() {
            debug!(display = %id, "Ignoring expansion request for unknown display");
            return;
        }
        let change = if expanded {
            reactor.drag_manager.commit_transient();
            reactor.interaction.expand(id)
        } else {
            reactor.interaction.collapse(id)
        };
        reactor.apply(change);
    }
}
