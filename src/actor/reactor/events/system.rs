use tracing::{debug, info};

use crate::actor::reactor::Reactor;
use crate::sys::screen::DisplayInfo;

pub struct SystemEventHandler;

impl SystemEventHandler {
    /// Replaces the display list. Nothing derived from the old configuration
    /// survives except state naming displays that are still connected.
    pub fn handle_screen_parameters_changed(reactor: &mut Reactor, displays: Vec<DisplayInfo>) {
        reactor.display_manager.displays = displays;
        let live = reactor.display_manager.ids();
        info!(
            displays = live.len(),
            notch = ?reactor.display_manager.notch_display(),
            "Display configuration changed"
        );
        if let Some(vanished) = reactor.drag_manager.transient_expansion
            && !live.contains(&vanished)
        {
            debug!(display = %vanished, "Transient expansion display vanished");
            reactor.drag_manager.transient_expansion = None;
        }
        for change in reactor.interaction.retain_displays(&live) {
            reactor.apply(Some(change));
        }
    }

    pub fn handle_screen_locked(reactor: &mut Reactor) {
        info!("Screen locked");
        reactor.drag_manager.cancel_sessions();
        Self::drop_drag_leftovers(reactor);
    }

    pub fn handle_screen_unlocked(reactor: &mut Reactor) {
        info!("Screen unlocked");
        Self::drop_drag_leftovers(reactor);
    }

    /// Drag callbacks are not delivered reliably around a lock, so anything
    /// a drag left behind is cleared here.
    fn drop_drag_leftovers(reactor: &mut Reactor) {
        reactor.drag_manager.last_location = None;
        if let Some(display) = reactor.drag_manager.transient_expansion.take() {
            let change = reactor.interaction.collapse(display);
            reactor.apply(change);
        }
        if let Some(display) = reactor.interaction.drop_target_display() {
            let change = reactor.interaction.clear_drop_target(display);
            reactor.apply(change);
        }
    }
}
