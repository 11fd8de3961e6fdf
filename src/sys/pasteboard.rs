//! Sampling of the system drag pasteboard and mouse buttons.
//!
//! The window-level drag-destination callbacks only fire once the cursor is
//! over one of our windows. The drag monitor polls this probe to notice a
//! drag that is still elsewhere on screen.

use crate::sys::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub change_count: i64,
    pub has_items: bool,
    pub primary_button_down: bool,
    pub location: Point,
}

pub trait DragProbe: Send + Sync + 'static {
    /// `None` means the probe could not read the system state this tick.
    fn sample(&self) -> Option<ProbeSample>;
}

#[cfg(target_os = "macos")]
pub use macos::SystemDragProbe;

#[cfg(target_os = "macos")]
mod macos {
    use objc2::rc::autoreleasepool;
    use objc2_app_kit::{NSEvent, NSPasteboard, NSPasteboardNameDrag};

    use super::{DragProbe, ProbeSample};
    use crate::sys::geometry::Point;

    #[derive(Debug, Default)]
    pub struct SystemDragProbe;

    fn drag_pasteboard() -> objc2::rc::Retained<NSPasteboard> {
        NSPasteboard::pasteboardWithName(unsafe { NSPasteboardNameDrag })
    }

    impl DragProbe for SystemDragProbe {
        fn sample(&self) -> Option<ProbeSample> {
            autoreleasepool(|_| {
                let pasteboard = drag_pasteboard();
                let has_items = pasteboard.types().is_some_and(|types| types.count() > 0);
                let location = NSEvent::mouseLocation();
                Some(ProbeSample {
                    change_count: pasteboard.changeCount() as i64,
                    has_items,
                    primary_button_down: NSEvent::pressedMouseButtons() & 1 != 0,
                    location: Point::new(location.x, location.y),
                })
            })
        }
    }
}
