//! Decides, per event, whether the notch overlay of a display takes input or
//! lets it through to the app underneath.
//!
//! The overlay is always on top, so anything it claims is invisible to the
//! menu bar and browser chrome below. Each phase therefore claims the
//! smallest area that still works:
//!
//! | phase      | claimed area                                   |
//! |------------|------------------------------------------------|
//! | Idle       | the collapsed notch footprint                  |
//! | Hovering   | the footprint plus a horizontal margin         |
//! | Expanded   | the expanded shelf zone                        |
//! | DragActive | the drag capture rect (and the zone if open)   |
//!
//! Nothing is cached: the phase and the geometry are derived again for every
//! event, and missing geometry means pass-through.

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use crate::actor::drag_monitor::DragPhase;
use crate::common::config::Settings;
use crate::model::geometry::NotchGeometry;
use crate::model::interaction::InteractionState;
use crate::model::payload::DragInfo;
use crate::sys::geometry::{Point, Rect};
use crate::sys::screen::DisplayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum DisplayPhase {
    Idle,
    Hovering,
    Expanded,
    /// A drag is in progress somewhere. `expanded` is set when this display
    /// also owns the expansion.
    DragActive { expanded: bool },
}

impl DisplayPhase {
    /// Drag wins over everything, then expansion, then hover.
    pub fn derive(display: DisplayId, interaction: &InteractionState, drag: &DragPhase) -> Self {
        let expanded = interaction.is_expanded(display);
        if drag.is_dragging() {
            DisplayPhase::DragActive { expanded }
        } else if expanded {
            DisplayPhase::Expanded
        } else if interaction.is_hovering(display) {
            DisplayPhase::Hovering
        } else {
            DisplayPhase::Idle
        }
    }
}

/// Everything the router needs to know about one display for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayState {
    pub display: DisplayId,
    pub phase: DisplayPhase,
    /// `None` if the display vanished or its geometry could not be derived.
    pub geometry: Option<NotchGeometry>,
    pub shelf_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum HitZone {
    /// The physical notch or island.
    Notch,
    /// The margin beside the notch while hovering.
    HoverMargin,
    /// The expanded shelf outside the notch.
    Shelf,
    /// The drag capture rect.
    DragCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterceptDecision {
    PassThrough,
    Intercept(HitZone),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragOperation {
    None,
    Copy,
}

/// What a mouse-down on the overlay does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseDownAction {
    PassThrough,
    /// Click on the collapsed notch: open or close the shelf.
    ToggleExpansion,
    /// Click on the notch while expanded; the shelf content handles it.
    DeliverToContent,
    /// Click inside the expanded zone; swallowed by the shelf.
    Consume,
}

/// Windows of ours that may be key while the overlay is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum WindowRole {
    NotchOverlay,
    Settings,
    Basket,
    Clipboard,
    Other,
}

impl WindowRole {
    /// Windows whose first click must never be stolen by the overlay.
    pub fn outranks_overlay(self) -> bool {
        matches!(self, WindowRole::Settings | WindowRole::Basket | WindowRole::Clipboard)
    }
}

pub trait InputRouter {
    fn route(&self, point: Point, state: &DisplayState) -> InterceptDecision;

    /// The area the window system should report mouse enter/exit for.
    fn tracking_rect(&self, state: &DisplayState) -> Option<Rect> {
        let geometry = active_geometry(state)?;
        Some(match state.phase {
            DisplayPhase::Idle => geometry.collapsed_rect,
            DisplayPhase::Hovering => geometry.hover_rect,
            DisplayPhase::Expanded => geometry.expanded_zone,
            DisplayPhase::DragActive { expanded: false } => geometry.drag_capture_rect,
            DisplayPhase::DragActive { expanded: true } => {
                geometry.drag_capture_rect.union(&geometry.expanded_zone)
            }
        })
    }
}

fn active_geometry(state: &DisplayState) -> Option<&NotchGeometry> {
    if !state.shelf_enabled {
        return None;
    }
    let geometry = state.geometry.as_ref();
    if geometry.is_none() {
        debug!(display = %state.display, "No geometry; passing input through");
    }
    geometry
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotchRouter;

impl InputRouter for NotchRouter {
    fn route(&self, point: Point, state: &DisplayState) -> InterceptDecision {
        let Some(geometry) = active_geometry(state) else {
            return InterceptDecision::PassThrough;
        };
        let zones: &[(Rect, HitZone)] = match state.phase {
            DisplayPhase::Idle => &[(geometry.collapsed_rect, HitZone::Notch)],
            DisplayPhase::Hovering => &[
                (geometry.collapsed_rect, HitZone::Notch),
                (geometry.hover_rect, HitZone::HoverMargin),
            ],
            DisplayPhase::Expanded => &[
                (geometry.collapsed_rect, HitZone::Notch),
                (geometry.expanded_zone, HitZone::Shelf),
            ],
            DisplayPhase::DragActive { expanded: false } => {
                &[(geometry.drag_capture_rect, HitZone::DragCapture)]
            }
            DisplayPhase::DragActive { expanded: true } => &[
                (geometry.drag_capture_rect, HitZone::DragCapture),
                (geometry.expanded_zone, HitZone::Shelf),
            ],
        };
        let decision = zones
            .iter()
            .find(|(rect, _)| rect.contains_including_top(point))
            .map_or(InterceptDecision::PassThrough, |(_, zone)| {
                InterceptDecision::Intercept(*zone)
            });
        trace!(display = %state.display, phase = %state.phase, ?point, ?decision, "Routed");
        decision
    }
}

/// Whether a click may reach the overlay without first activating it.
pub fn accepts_first_mouse(state: &DisplayState, key_window: Option<WindowRole>) -> bool {
    state.phase == DisplayPhase::Expanded
        && state.shelf_enabled
        && state.geometry.is_some()
        && !key_window.is_some_and(WindowRole::outranks_overlay)
}

/// Policy check for a drag entering the overlay. Runs before any expansion
/// side effect.
pub fn evaluate_drag_entry(info: &DragInfo, prefs: &Settings) -> DragOperation {
    if !prefs.enable_notch_shelf {
        debug!("Drag rejected: notch shelf disabled");
        return DragOperation::None;
    }
    if info.is_empty {
        debug!("Drag rejected: nothing we can ingest");
        return DragOperation::None;
    }
    if info.contains_directory && !prefs.enable_power_folders {
        debug!("Drag rejected: directories need power folders");
        return DragOperation::None;
    }
    DragOperation::Copy
}

pub fn mouse_down_action(decision: InterceptDecision, phase: DisplayPhase) -> MouseDownAction {
    let InterceptDecision::Intercept(zone) = decision else {
        return MouseDownAction::PassThrough;
    };
    match (phase, zone) {
        (DisplayPhase::Idle | DisplayPhase::Hovering, _) => MouseDownAction::ToggleExpansion,
        (DisplayPhase::Expanded, HitZone::Notch) => MouseDownAction::DeliverToContent,
        _ => MouseDownAction::Consume,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::geometry::derive;
    use crate::sys::screen::DisplayInfo;

    const D1: DisplayId = DisplayId::new(1);

    fn geometry() -> NotchGeometry {
        let display =
            DisplayInfo::with_notch(D1, Rect::from_xywh(0.0, 0.0, 1512.0, 982.0), 188.0, 32.0);
        derive(&display, &Settings::default(), 1).expect("derive")
    }

    fn state(phase: DisplayPhase) -> DisplayState {
        DisplayState {
            display: D1,
            phase,
            geometry: Some(geometry()),
            shelf_enabled: true,
        }
    }

    #[test]
    fn phase_precedence() {
        let mut interaction = InteractionState::new();
        let idle = DragPhase::Idle;
        let dragging = DragPhase::Dragging { location: Point::default() };
        assert_eq!(DisplayPhase::derive(D1, &interaction, &idle), DisplayPhase::Idle);
        interaction.set_hovering(D1, true);
        assert_eq!(DisplayPhase::derive(D1, &interaction, &idle), DisplayPhase::Hovering);
        interaction.expand(D1);
        assert_eq!(DisplayPhase::derive(D1, &interaction, &idle), DisplayPhase::Expanded);
        assert_eq!(
            DisplayPhase::derive(D1, &interaction, &dragging),
            DisplayPhase::DragActive { expanded: true }
        );
    }

    #[test]
    fn idle_passes_through_everything_outside_the_notch() {
        let router = NotchRouter;
        let idle = state(DisplayPhase::Idle);
        let notch = geometry().collapsed_rect;
        assert_eq!(
            router.route(Point::new(notch.mid_x(), notch.mid_y()), &idle),
            InterceptDecision::Intercept(HitZone::Notch)
        );
        let outside = [
            Point::new(notch.min_x() - 0.5, notch.mid_y()),
            Point::new(notch.max_x(), notch.mid_y()),
            Point::new(notch.mid_x(), notch.min_y() - 0.5),
            Point::new(notch.min_x() - 10.0, notch.max_y() - 1.0),
            Point::new(100.0, 500.0),
        ];
        for point in outside {
            assert_eq!(router.route(point, &idle), InterceptDecision::PassThrough, "{point:?}");
        }
    }

    #[test]
    fn hover_margin_is_horizontal_only() {
        let router = NotchRouter;
        let hovering = state(DisplayPhase::Hovering);
        let notch = geometry().collapsed_rect;
        assert_eq!(
            router.route(Point::new(notch.min_x() - 10.0, notch.mid_y()), &hovering),
            InterceptDecision::Intercept(HitZone::HoverMargin)
        );
        assert_eq!(
            router.route(Point::new(notch.mid_x(), notch.min_y() - 1.0), &hovering),
            InterceptDecision::PassThrough
        );
    }

    #[test]
    fn expanded_zone_is_claimed_and_notch_stays_notch() {
        let router = NotchRouter;
        let expanded = state(DisplayPhase::Expanded);
        let zone = geometry().expanded_zone;
        assert_eq!(
            router.route(Point::new(zone.min_x() + 1.0, zone.min_y() + 1.0), &expanded),
            InterceptDecision::Intercept(HitZone::Shelf)
        );
        assert_eq!(
            router.route(Point::new(756.0, 970.0), &expanded),
            InterceptDecision::Intercept(HitZone::Notch)
        );
        assert_eq!(
            router.route(Point::new(zone.mid_x(), zone.min_y() - 1.0), &expanded),
            InterceptDecision::PassThrough
        );
    }

    #[test]
    fn drag_capture_catches_approaching_drags() {
        let router = NotchRouter;
        let dragging = state(DisplayPhase::DragActive { expanded: false });
        assert_eq!(
            router.route(Point::new(560.0, 890.0), &dragging),
            InterceptDecision::Intercept(HitZone::DragCapture)
        );
        assert_eq!(
            router.route(Point::new(560.0, 870.0), &dragging),
            InterceptDecision::PassThrough
        );
    }

    #[test]
    fn missing_geometry_or_disabled_shelf_passes_through() {
        let router = NotchRouter;
        let point = Point::new(756.0, 970.0);
        for phase in [
            DisplayPhase::Idle,
            DisplayPhase::Hovering,
            DisplayPhase::Expanded,
            DisplayPhase::DragActive { expanded: true },
        ] {
            let vanished = DisplayState { geometry: None, ..state(phase) };
            assert_eq!(router.route(point, &vanished), InterceptDecision::PassThrough);
            assert_eq!(router.tracking_rect(&vanished), None);
            let disabled = DisplayState { shelf_enabled: false, ..state(phase) };
            assert_eq!(router.route(point, &disabled), InterceptDecision::PassThrough);
        }
    }

    #[test]
    fn tracking_rect_follows_phase() {
        let router = NotchRouter;
        let g = geometry();
        assert_eq!(router.tracking_rect(&state(DisplayPhase::Idle)), Some(g.collapsed_rect));
        assert_eq!(router.tracking_rect(&state(DisplayPhase::Hovering)), Some(g.hover_rect));
        assert_eq!(router.tracking_rect(&state(DisplayPhase::Expanded)), Some(g.expanded_zone));
        assert_eq!(
            router.tracking_rect(&state(DisplayPhase::DragActive { expanded: false })),
            Some(g.drag_capture_rect)
        );
    }

    #[test]
    fn first_mouse_only_when_expanded_and_not_outranked() {
        let expanded = state(DisplayPhase::Expanded);
        assert!(accepts_first_mouse(&expanded, None));
        assert!(accepts_first_mouse(&expanded, Some(WindowRole::NotchOverlay)));
        assert!(accepts_first_mouse(&expanded, Some(WindowRole::Other)));
        assert!(!accepts_first_mouse(&expanded, Some(WindowRole::Settings)));
        assert!(!accepts_first_mouse(&expanded, Some(WindowRole::Basket)));
        assert!(!accepts_first_mouse(&expanded, Some(WindowRole::Clipboard)));
        assert!(!accepts_first_mouse(&state(DisplayPhase::Hovering), None));
        assert!(!accepts_first_mouse(&state(DisplayPhase::Idle), None));
    }

    #[test]
    fn drag_entry_policy() {
        let files = DragInfo { contains_directory: false, is_empty: false };
        let folder = DragInfo { contains_directory: true, is_empty: false };
        let prefs = Settings::default();
        assert_eq!(evaluate_drag_entry(&files, &prefs), DragOperation::Copy);
        assert_eq!(evaluate_drag_entry(&folder, &prefs), DragOperation::Copy);
        let no_folders = Settings { enable_power_folders: false, ..Settings::default() };
        assert_eq!(evaluate_drag_entry(&folder, &no_folders), DragOperation::None);
        assert_eq!(evaluate_drag_entry(&files, &no_folders), DragOperation::Copy);
        let no_shelf = Settings { enable_notch_shelf: false, ..Settings::default() };
        assert_eq!(evaluate_drag_entry(&files, &no_shelf), DragOperation::None);
        let empty = DragInfo { contains_directory: false, is_empty: true };
        assert_eq!(evaluate_drag_entry(&empty, &prefs), DragOperation::None);
    }

    #[test]
    fn mouse_down_actions() {
        let notch = InterceptDecision::Intercept(HitZone::Notch);
        let shelf = InterceptDecision::Intercept(HitZone::Shelf);
        assert_eq!(mouse_down_action(notch, DisplayPhase::Idle), MouseDownAction::ToggleExpansion);
        assert_eq!(
            mouse_down_action(notch, DisplayPhase::Expanded),
            MouseDownAction::DeliverToContent
        );
        assert_eq!(mouse_down_action(shelf, DisplayPhase::Expanded), MouseDownAction::Consume);
        assert_eq!(
            mouse_down_action(InterceptDecision::PassThrough, DisplayPhase::Expanded),
            MouseDownAction::PassThrough
        );
    }
}
