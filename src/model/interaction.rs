//! Which display is hovering, expanded and drop-targeted.
//!
//! Each field has at most one owner. Every mutation returns the changes it
//! produced, so observers get exactly one notification per field change and
//! never see an intermediate clear.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::sys::screen::DisplayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionChange {
    Hover { from: Option<DisplayId>, to: Option<DisplayId> },
    Expanded { from: Option<DisplayId>, to: Option<DisplayId> },
    DropTarget { from: Option<DisplayId>, to: Option<DisplayId> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionState {
    hovering_display: Option<DisplayId>,
    expanded_display: Option<DisplayId>,
    drop_target_display: Option<DisplayId>,
}

fn replace(
    slot: &mut Option<DisplayId>,
    to: Option<DisplayId>,
    change: fn(Option<DisplayId>, Option<DisplayId>) -> InteractionChange,
) -> Option<InteractionChange> {
    if *slot == to {
        return None;
    }
    let from = std::mem::replace(slot, to);
    let change = change(from, to);
    trace!(?change, "Interaction state changed");
    Some(change)
}

fn hover(from: Option<DisplayId>, to: Option<DisplayId>) -> InteractionChange {
    InteractionChange::Hover { from, to }
}

fn expanded(from: Option<DisplayId>, to: Option<DisplayId>) -> InteractionChange {
    InteractionChange::Expanded { from, to }
}

fn drop_target(from: Option<DisplayId>, to: Option<DisplayId>) -> InteractionChange {
    InteractionChange::DropTarget { from, to }
}

impl InteractionState {
    pub fn new() -> Self { Self::default() }

    pub fn hovering_display(&self) -> Option<DisplayId> { self.hovering_display }

    pub fn expanded_display(&self) -> Option<DisplayId> { self.expanded_display }

    pub fn drop_target_display(&self) -> Option<DisplayId> { self.drop_target_display }

    pub fn is_hovering(&self, display: DisplayId) -> bool { self.hovering_display == Some(display) }

    pub fn is_expanded(&self, display: DisplayId) -> bool { self.expanded_display == Some(display) }

    pub fn is_drop_targeted(&self, display: DisplayId) -> bool {
        self.drop_target_display == Some(display)
    }

    /// Hovering a display takes the hover away from any other display.
    /// Un-hovering only has an effect for the current owner.
    pub fn set_hovering(
        &mut self,
        display: DisplayId,
        hovering: bool,
    ) -> Option<InteractionChange> {
        if hovering {
            replace(&mut self.hovering_display, Some(display), hover)
        } else if self.is_hovering(display) {
            replace(&mut self.hovering_display, None, hover)
        } else {
            None
        }
    }

    /// Moves the expansion to `display` in a single step.
    pub fn expand(&mut self, display: DisplayId) -> Option<InteractionChange> {
        replace(&mut self.expanded_display, Some(display), expanded)
    }

    /// Collapses `display` if it owns the expansion. A stale collapse for a
    /// display that lost the expansion is a no-op.
    pub fn collapse(&mut self, display: DisplayId) -> Option<InteractionChange> {
        if !self.is_expanded(display) {
            return None;
        }
        replace(&mut self.expanded_display, None, expanded)
    }

    pub fn toggle(&mut self, display: DisplayId) -> Option<InteractionChange> {
        if self.is_expanded(display) {
            self.collapse(display)
        } else {
            self.expand(display)
        }
    }

    pub fn set_drop_target(&mut self, display: DisplayId) -> Option<InteractionChange> {
        replace(&mut self.drop_target_display, Some(display), drop_target)
    }

    pub fn clear_drop_target(&mut self, display: DisplayId) -> Option<InteractionChange> {
        if !self.is_drop_targeted(display) {
            return None;
        }
        replace(&mut self.drop_target_display, None, drop_target)
    }

    /// Forgets every field naming a display that is no longer connected.
    pub fn retain_displays(&mut self, live: &[DisplayId]) -> Vec<InteractionChange> {
        let gone = |slot: &Option<DisplayId>| slot.is_some_and(|d| !live.contains(&d));
        let mut changes = Vec::new();
        if gone(&self.hovering_display) {
            changes.extend(replace(&mut self.hovering_display, None, hover));
        }
        if gone(&self.expanded_display) {
            changes.extend(replace(&mut self.expanded_display, None, expanded));
        }
        if gone(&self.drop_target_display) {
            changes.extend(replace(&mut self.drop_target_display, None, drop_target));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const D1: DisplayId = DisplayId::new(1);
    const D2: DisplayId = DisplayId::new(2);
    const D3: DisplayId = DisplayId::new(3);

    #[test]
    fn expansion_has_a_single_owner() {
        let mut state = InteractionState::new();
        state.expand(D1);
        state.expand(D2);
        state.expand(D3);
        assert!(!state.is_expanded(D1));
        assert!(!state.is_expanded(D2));
        assert!(state.is_expanded(D3));
    }

    #[test]
    fn switching_owner_is_one_change() {
        let mut state = InteractionState::new();
        state.expand(D1);
        assert_eq!(
            state.expand(D2),
            Some(InteractionChange::Expanded { from: Some(D1), to: Some(D2) })
        );
        assert_eq!(state.expand(D2), None);
    }

    #[test]
    fn collapse_is_owner_gated() {
        let mut state = InteractionState::new();
        state.expand(D1);
        assert_eq!(state.collapse(D2), None);
        assert!(state.is_expanded(D1));
        assert_eq!(
            state.collapse(D1),
            Some(InteractionChange::Expanded { from: Some(D1), to: None })
        );
    }

    #[test]
    fn toggle_expands_then_collapses() {
        let mut state = InteractionState::new();
        state.toggle(D1);
        assert!(state.is_expanded(D1));
        state.toggle(D2);
        assert!(state.is_expanded(D2));
        state.toggle(D2);
        assert_eq!(state.expanded_display(), None);
    }

    #[test]
    fn hover_moves_between_displays() {
        let mut state = InteractionState::new();
        state.set_hovering(D1, true);
        assert_eq!(
            state.set_hovering(D2, true),
            Some(InteractionChange::Hover { from: Some(D1), to: Some(D2) })
        );
        assert_eq!(state.set_hovering(D1, false), None);
        assert!(state.is_hovering(D2));
        state.set_hovering(D2, false);
        assert_eq!(state.hovering_display(), None);
    }

    #[test]
    fn hover_and_expansion_are_independent() {
        let mut state = InteractionState::new();
        state.expand(D1);
        state.set_hovering(D2, true);
        assert!(state.is_expanded(D1));
        assert!(state.is_hovering(D2));
    }

    #[test]
    fn drop_target_clear_is_owner_gated() {
        let mut state = InteractionState::new();
        state.set_drop_target(D1);
        assert_eq!(state.clear_drop_target(D2), None);
        assert!(state.is_drop_targeted(D1));
        state.clear_drop_target(D1);
        assert_eq!(state.drop_target_display(), None);
    }

    #[test]
    fn retain_drops_vanished_displays() {
        let mut state = InteractionState::new();
        state.expand(D1);
        state.set_hovering(D2, true);
        state.set_drop_target(D1);
        let changes = state.retain_displays(&[D2]);
        assert_eq!(changes, vec![
            InteractionChange::Expanded { from: Some(D1), to: None },
            InteractionChange::DropTarget { from: Some(D1), to: None },
        ]);
        assert!(state.is_hovering(D2));
    }
}
