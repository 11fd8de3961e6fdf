//! Notch geometry of a single display.
//!
//! Everything here is a pure function of a [`DisplayInfo`], the settings and
//! the shelf row count. Results are derived again for every event and never
//! kept across a display reconfiguration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::config::Settings;
use crate::sys::geometry::{Point, Rect, Size};
use crate::sys::screen::{DisplayId, DisplayInfo};

pub const DEFAULT_NOTCH_WIDTH: f64 = 180.0;
pub const ISLAND_WIDTH: f64 = 210.0;
pub const ISLAND_HEIGHT: f64 = 37.0;
pub const ISLAND_TOP_GAP: f64 = 4.0;
pub const HOVER_MARGIN: f64 = 20.0;
pub const DRAG_CAPTURE_MIN_WIDTH: f64 = 400.0;
pub const DRAG_CAPTURE_SIDE_PADDING: f64 = 20.0;
pub const DRAG_CAPTURE_HEIGHT: f64 = 100.0;
pub const EXPANDED_EXTRA_WIDTH: f64 = 400.0;
pub const EXPANDED_BASE_HEIGHT: f64 = 100.0;
pub const EXPANDED_ROW_HEIGHT: f64 = 40.0;
pub const EXPANDED_MAX_HEIGHT: f64 = 180.0;
pub const WING_MAX_WIDTH: f64 = 120.0;
pub const ISLAND_WING_MAX_WIDTH: f64 = 100.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("{0} is not part of the current display configuration")]
    UnknownDisplay(DisplayId),
    #[error("{0} reports an empty frame")]
    EmptyFrame(DisplayId),
}

/// The notch footprint of one display and the zones derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchGeometry {
    pub display: DisplayId,
    /// The visible notch (or island) shape.
    pub notch_rect: Rect,
    pub is_island_mode: bool,
    pub wing_width: f64,
    pub expanded_zone: Rect,
    pub collapsed_rect: Rect,
    pub hover_rect: Rect,
    pub drag_capture_rect: Rect,
}

fn top(display: &DisplayInfo) -> f64 { display.frame.max_y() }

pub fn notch_height(display: &DisplayInfo) -> f64 { display.safe_area_top.max(0.0) }

pub fn is_island_mode(display: &DisplayInfo, prefs: &Settings) -> bool {
    notch_height(display) == 0.0 || prefs.force_dynamic_island_test
}

/// Width of the physical cutout, or of the island.
pub fn notch_width(display: &DisplayInfo, prefs: &Settings) -> f64 {
    if is_island_mode(display, prefs) {
        return ISLAND_WIDTH;
    }
    match (display.aux_top_left_width, display.aux_top_right_width) {
        (Some(left), Some(right)) => {
            let width = display.frame.size.width - left - right;
            if width > 0.0 { width } else { DEFAULT_NOTCH_WIDTH }
        }
        _ => DEFAULT_NOTCH_WIDTH,
    }
}

/// Horizontal center of the notch. The cutout sits between the two auxiliary
/// top areas; without them it is assumed to be centered.
fn notch_center_x(display: &DisplayInfo, prefs: &Settings) -> f64 {
    if !is_island_mode(display, prefs)
        && let (Some(left), Some(_)) = (display.aux_top_left_width, display.aux_top_right_width)
    {
        let width = notch_width(display, prefs);
        if display.frame.size.width - left - width >= 0.0 {
            return display.frame.min_x() + left + width / 2.0;
        }
    }
    display.frame.mid_x()
}

/// The exact visible footprint of the collapsed notch. This sits right below
/// the menu bar items and must stay small.
pub fn collapsed_interaction_rect(display: &DisplayInfo, prefs: &Settings) -> Rect {
    let center_x = notch_center_x(display, prefs);
    if is_island_mode(display, prefs) {
        let island = Rect::hanging_from(
            top(display) - ISLAND_TOP_GAP,
            center_x,
            Size::new(ISLAND_WIDTH, ISLAND_HEIGHT),
        );
        // The gap above the island stays reachable so the cursor can be
        // pushed against the top of the screen.
        return island.extended_to_top(top(display));
    }
    Rect::hanging_from(
        top(display),
        center_x,
        Size::new(notch_width(display, prefs), notch_height(display)),
    )
}

/// The collapsed footprint plus a horizontal margin. Never extends downward.
pub fn hover_rect(display: &DisplayInfo, prefs: &Settings) -> Rect {
    collapsed_interaction_rect(display, prefs).widened(HOVER_MARGIN)
}

/// Large rect that catches a drag approaching the notch from any direction.
pub fn drag_capture_rect(display: &DisplayInfo, prefs: &Settings) -> Rect {
    let width = DRAG_CAPTURE_MIN_WIDTH
        .max(notch_width(display, prefs) + DRAG_CAPTURE_SIDE_PADDING * 2.0);
    Rect::hanging_from(
        top(display),
        notch_center_x(display, prefs),
        Size::new(width, DRAG_CAPTURE_HEIGHT),
    )
}

pub fn expanded_height(rows: usize) -> f64 {
    let extra_rows = rows.saturating_sub(1) as f64;
    (EXPANDED_BASE_HEIGHT + extra_rows * EXPANDED_ROW_HEIGHT).min(EXPANDED_MAX_HEIGHT)
}

/// The padded zone that is interactive while the shelf is expanded.
pub fn expanded_interaction_zone(display: &DisplayInfo, prefs: &Settings, rows: usize) -> Rect {
    Rect::hanging_from(
        top(display),
        notch_center_x(display, prefs),
        Size::new(notch_width(display, prefs) + EXPANDED_EXTRA_WIDTH, expanded_height(rows)),
    )
}

/// Width of each HUD wing beside the notch.
pub fn wing_width(display: &DisplayInfo, prefs: &Settings) -> f64 {
    let cap = if is_island_mode(display, prefs) {
        ISLAND_WING_MAX_WIDTH
    } else {
        WING_MAX_WIDTH
    };
    let available = (display.frame.size.width - notch_width(display, prefs)) / 2.0;
    available.clamp(0.0, cap)
}

pub fn derive(
    display: &DisplayInfo,
    prefs: &Settings,
    rows: usize,
) -> Result<NotchGeometry, GeometryError> {
    if display.frame.is_empty() {
        return Err(GeometryError::EmptyFrame(display.id));
    }
    let collapsed_rect = collapsed_interaction_rect(display, prefs);
    let is_island_mode = is_island_mode(display, prefs);
    let notch_rect = if is_island_mode {
        Rect::hanging_from(
            top(display) - ISLAND_TOP_GAP,
            collapsed_rect.mid_x(),
            Size::new(ISLAND_WIDTH, ISLAND_HEIGHT),
        )
    } else {
        collapsed_rect
    };
    Ok(NotchGeometry {
        display: display.id,
        notch_rect,
        is_island_mode,
        wing_width: wing_width(display, prefs),
        expanded_zone: expanded_interaction_zone(display, prefs, rows),
        collapsed_rect,
        hover_rect: hover_rect(display, prefs),
        drag_capture_rect: drag_capture_rect(display, prefs),
    })
}

/// Derives geometry for `id` out of the current display list.
pub fn derive_for(
    displays: &[DisplayInfo],
    id: DisplayId,
    prefs: &Settings,
    rows: usize,
) -> Result<NotchGeometry, GeometryError> {
    let display = displays
        .iter()
        .find(|d| d.id == id)
        .ok_or(GeometryError::UnknownDisplay(id))?;
    derive(display, prefs, rows)
}

/// The built-in display with a camera cutout, found by its inset and never
/// by assuming the main screen. `None` when no display has a notch.
pub fn resolve_notch_display(displays: &[DisplayInfo]) -> Option<DisplayId> {
    displays.iter().find(|d| notch_height(d) > 0.0).map(|d| d.id)
}

pub fn display_at(displays: &[DisplayInfo], point: Point) -> Option<&DisplayInfo> {
    displays
        .iter()
        .find(|d| d.contains(point))
        .or_else(|| displays.iter().find(|d| d.frame.contains_including_top(point)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::screen::{ScreenProvider, StaticScreens};

    fn macbook() -> DisplayInfo {
        DisplayInfo::with_notch(
            DisplayId::new(1),
            Rect::from_xywh(0.0, 0.0, 1512.0, 982.0),
            188.0,
            32.0,
        )
    }

    fn external() -> DisplayInfo {
        DisplayInfo::plain(DisplayId::new(2), Rect::from_xywh(1512.0, 0.0, 1920.0, 1080.0))
    }

    #[test]
    fn notch_display_uses_aux_areas() {
        let prefs = Settings::default();
        let display = macbook();
        assert!(!is_island_mode(&display, &prefs));
        assert_eq!(notch_width(&display, &prefs), 188.0);
        assert_eq!(
            collapsed_interaction_rect(&display, &prefs),
            Rect::from_xywh(662.0, 950.0, 188.0, 32.0)
        );
    }

    #[test]
    fn unknown_aux_areas_fall_back_to_default_width() {
        let prefs = Settings::default();
        let display = DisplayInfo {
            aux_top_left_width: None,
            ..macbook()
        };
        assert_eq!(notch_width(&display, &prefs), DEFAULT_NOTCH_WIDTH);
        assert_eq!(collapsed_interaction_rect(&display, &prefs).mid_x(), 756.0);
    }

    #[test]
    fn external_display_is_an_island_reachable_from_the_top() {
        let prefs = Settings::default();
        let display = external();
        assert!(is_island_mode(&display, &prefs));
        let rect = collapsed_interaction_rect(&display, &prefs);
        assert_eq!(rect, Rect::from_xywh(2367.0, 1039.0, 210.0, 41.0));
        assert_eq!(rect.max_y(), 1080.0);
    }

    #[test]
    fn forced_island_overrides_notch() {
        let prefs = Settings {
            force_dynamic_island_test: true,
            ..Settings::default()
        };
        let geometry = derive(&macbook(), &prefs, 0).expect("derive");
        assert!(geometry.is_island_mode);
        assert_eq!(geometry.notch_rect, Rect::from_xywh(651.0, 941.0, 210.0, 37.0));
        assert_eq!(geometry.wing_width, ISLAND_WING_MAX_WIDTH);
    }

    #[test]
    fn hover_rect_widens_without_extending_down() {
        let prefs = Settings::default();
        let collapsed = collapsed_interaction_rect(&macbook(), &prefs);
        let hover = hover_rect(&macbook(), &prefs);
        assert_eq!(hover.min_y(), collapsed.min_y());
        assert_eq!(hover.size.width, collapsed.size.width + 40.0);
    }

    #[test]
    fn capture_rect_is_at_least_400_wide() {
        let prefs = Settings::default();
        assert_eq!(
            drag_capture_rect(&macbook(), &prefs),
            Rect::from_xywh(556.0, 882.0, 400.0, 100.0)
        );
        let wide_notch = DisplayInfo::with_notch(
            DisplayId::new(5),
            Rect::from_xywh(0.0, 0.0, 3000.0, 1000.0),
            500.0,
            40.0,
        );
        assert_eq!(drag_capture_rect(&wide_notch, &prefs).size.width, 540.0);
    }

    #[test]
    fn expanded_zone_grows_with_rows_up_to_the_cap() {
        assert_eq!(expanded_height(0), 100.0);
        assert_eq!(expanded_height(1), 100.0);
        assert_eq!(expanded_height(2), 140.0);
        assert_eq!(expanded_height(3), 180.0);
        assert_eq!(expanded_height(10), 180.0);
        let zone = expanded_interaction_zone(&macbook(), &Settings::default(), 2);
        assert_eq!(zone, Rect::from_xywh(462.0, 842.0, 588.0, 140.0));
    }

    #[test]
    fn wing_width_is_capped_by_available_space() {
        let prefs = Settings::default();
        assert_eq!(wing_width(&macbook(), &prefs), WING_MAX_WIDTH);
        let narrow = DisplayInfo::plain(DisplayId::new(9), Rect::from_xywh(0.0, 0.0, 300.0, 200.0));
        assert_eq!(wing_width(&narrow, &prefs), 45.0);
    }

    #[test]
    fn notch_display_is_resolved_by_inset() {
        let mut displays = StaticScreens::sample_notch_and_external().displays().expect("displays");
        displays.reverse();
        assert_eq!(resolve_notch_display(&displays), Some(DisplayId::new(1)));
        assert_eq!(resolve_notch_display(&[external()]), None);
        assert_eq!(resolve_notch_display(&[]), None);
    }

    #[test]
    fn display_at_prefers_strict_containment() {
        let displays = vec![macbook(), external()];
        assert_eq!(
            display_at(&displays, Point::new(1512.0, 10.0)).map(|d| d.id),
            Some(DisplayId::new(2))
        );
        assert_eq!(
            display_at(&displays, Point::new(700.0, 982.0)).map(|d| d.id),
            Some(DisplayId::new(1))
        );
        assert!(display_at(&displays, Point::new(-5.0, 10.0)).is_none());
    }

    #[test]
    fn vanished_display_is_a_geometry_error() {
        let err = derive_for(&[macbook()], DisplayId::new(2), &Settings::default(), 0);
        assert_eq!(err, Err(GeometryError::UnknownDisplay(DisplayId::new(2))));
        let empty = DisplayInfo::plain(DisplayId::new(3), Rect::default());
        assert_eq!(
            derive(&empty, &Settings::default(), 0),
            Err(GeometryError::EmptyFrame(DisplayId::new(3)))
        );
    }
}
