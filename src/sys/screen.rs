use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sys::geometry::{Point, Rect};

/// CGDirectDisplayID of a physical display. Only meaningful for the display
/// configuration it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(u32);

impl DisplayId {
    pub const fn new(id: u32) -> Self { Self(id) }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "display#{}", self.0) }
}

/// What the window system reports about one display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub name: Option<String>,
    pub frame: Rect,
    /// Top safe-area inset; non-zero only on displays with a camera cutout.
    pub safe_area_top: f64,
    pub aux_top_left_width: Option<f64>,
    pub aux_top_right_width: Option<f64>,
}

impl DisplayInfo {
    /// A display without a camera cutout.
    pub fn plain(id: DisplayId, frame: Rect) -> Self {
        Self {
            id,
            name: None,
            frame,
            safe_area_top: 0.0,
            aux_top_left_width: None,
            aux_top_right_width: None,
        }
    }

    /// A display with a cutout of `notch_width` x `notch_height` centered in
    /// its top edge.
    pub fn with_notch(id: DisplayId, frame: Rect, notch_width: f64, notch_height: f64) -> Self {
        let side = ((frame.size.width - notch_width) / 2.0).max(0.0);
        Self {
            id,
            name: None,
            frame,
            safe_area_top: notch_height,
            aux_top_left_width: Some(side),
            aux_top_right_width: Some(side),
        }
    }

    pub fn contains(&self, point: Point) -> bool { self.frame.contains(point) }
}

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("window system reported no displays")]
    NoDisplays,
    #[error("display query requires the main thread")]
    NotMainThread,
}

/// The window-system collaborator: reports the current display set.
///
/// Every call must re-read the system; implementations never return a
/// snapshot from an earlier configuration.
pub trait ScreenProvider {
    fn displays(&self) -> Result<Vec<DisplayInfo>, ScreenError>;
}

/// A fixed display set, used off macOS and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticScreens {
    displays: Vec<DisplayInfo>,
}

impl StaticScreens {
    pub fn new(displays: Vec<DisplayInfo>) -> Self { Self { displays } }

    pub fn set(&mut self, displays: Vec<DisplayInfo>) { self.displays = displays; }

    /// A 14" MacBook Pro panel next to a 1080p external monitor.
    pub fn sample_notch_and_external() -> Self {
        Self::new(vec![
            DisplayInfo {
                name: Some("Built-in Retina Display".to_string()),
                ..DisplayInfo::with_notch(
                    DisplayId::new(1),
                    Rect::from_xywh(0.0, 0.0, 1512.0, 982.0),
                    188.0,
                    32.0,
                )
            },
            DisplayInfo {
                name: Some("External".to_string()),
                ..DisplayInfo::plain(
                    DisplayId::new(2),
                    Rect::from_xywh(1512.0, 0.0, 1920.0, 1080.0),
                )
            },
        ])
    }
}

impl ScreenProvider for StaticScreens {
    fn displays(&self) -> Result<Vec<DisplayInfo>, ScreenError> {
        if self.displays.is_empty() {
            return Err(ScreenError::NoDisplays);
        }
        Ok(self.displays.clone())
    }
}

#[cfg(target_os = "macos")]
pub use macos::NsScreenProvider;

#[cfg(target_os = "macos")]
mod macos {
    use objc2::msg_send;
    use objc2::rc::autoreleasepool;
    use objc2_app_kit::NSScreen;
    use objc2_foundation::{MainThreadMarker, NSString};
    use tracing::warn;

    use super::{DisplayId, DisplayInfo, ScreenError, ScreenProvider};
    use crate::sys::geometry::Rect;

    pub struct NsScreenProvider {
        mtm: MainThreadMarker,
    }

    impl NsScreenProvider {
        pub fn new() -> Result<Self, ScreenError> {
            let mtm = MainThreadMarker::new().ok_or(ScreenError::NotMainThread)?;
            Ok(Self { mtm })
        }
    }

    fn display_number(screen: &NSScreen) -> Option<u32> {
        let description = screen.deviceDescription();
        let key = NSString::from_str("NSScreenNumber");
        let number = description.objectForKey(&key)?;
        let id: u32 = unsafe { msg_send![&*number, unsignedIntValue] };
        (id != 0).then_some(id)
    }

    fn width_of_area(width: f64) -> Option<f64> { (width > 0.0).then_some(width) }

    impl ScreenProvider for NsScreenProvider {
        fn displays(&self) -> Result<Vec<DisplayInfo>, ScreenError> {
            autoreleasepool(|_| {
                let screens = NSScreen::screens(self.mtm);
                let mut out = Vec::with_capacity(screens.count());
                for screen in screens.iter() {
                    let Some(id) = display_number(&screen) else {
                        warn!("Skipping screen without NSScreenNumber");
                        continue;
                    };
                    let frame = screen.frame();
                    let insets = screen.safeAreaInsets();
                    let left = screen.auxiliaryTopLeftArea();
                    let right = screen.auxiliaryTopRightArea();
                    out.push(DisplayInfo {
                        id: DisplayId::new(id),
                        name: Some(screen.localizedName().to_string()),
                        frame: Rect::from_xywh(
                            frame.origin.x,
                            frame.origin.y,
                            frame.size.width,
                            frame.size.height,
                        ),
                        safe_area_top: insets.top.max(0.0),
                        aux_top_left_width: width_of_area(left.size.width),
                        aux_top_right_width: width_of_area(right.size.width),
                    });
                }
                if out.is_empty() {
                    return Err(ScreenError::NoDisplays);
                }
                Ok(out)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_notch_splits_remaining_width_into_aux_areas() {
        let info = DisplayInfo::with_notch(
            DisplayId::new(3),
            Rect::from_xywh(0.0, 0.0, 1512.0, 982.0),
            188.0,
            32.0,
        );
        assert_eq!(info.aux_top_left_width, Some(662.0));
        assert_eq!(info.aux_top_right_width, Some(662.0));
        assert_eq!(info.safe_area_top, 32.0);
    }

    #[test]
    fn empty_static_provider_reports_no_displays() {
        let provider = StaticScreens::default();
        assert!(matches!(provider.displays(), Err(ScreenError::NoDisplays)));
    }

    #[test]
    fn display_id_serializes_as_plain_number() {
        let value = serde_json::to_value(DisplayId::new(69733248)).expect("serialize DisplayId");
        assert_eq!(value, serde_json::json!(69733248));
    }
}
