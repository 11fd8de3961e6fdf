//! Screen-space geometry in AppKit coordinates (origin bottom-left, y grows
//! upward). The top edge of a display is therefore `max_y`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Self { width, height } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self { Self { origin, size } }

    pub const fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// A rect of `size` horizontally centered on `center_x` whose top edge
    /// sits at `top`.
    pub fn hanging_from(top: f64, center_x: f64, size: Size) -> Self {
        Self::from_xywh(center_x - size.width / 2.0, top - size.height, size.width, size.height)
    }

    pub fn min_x(&self) -> f64 { self.origin.x }

    pub fn max_x(&self) -> f64 { self.origin.x + self.size.width }

    pub fn min_y(&self) -> f64 { self.origin.y }

    pub fn max_y(&self) -> f64 { self.origin.y + self.size.height }

    pub fn mid_x(&self) -> f64 { self.origin.x + self.size.width / 2.0 }

    pub fn mid_y(&self) -> f64 { self.origin.y + self.size.height / 2.0 }

    pub fn is_empty(&self) -> bool { self.size.width <= 0.0 || self.size.height <= 0.0 }

    /// Half-open containment: the min edges are inside, the max edges are not.
    /// Adjacent displays therefore never both claim the shared edge.
    pub fn contains(&self, point: Point) -> bool {
        !self.is_empty()
            && point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Like [`Rect::contains`], but a point exactly on the top edge counts.
    /// The cursor rests there when it is pushed against the top of a screen.
    pub fn contains_including_top(&self, point: Point) -> bool {
        self.contains(point)
            || (!self.is_empty()
                && point.y == self.max_y()
                && point.x >= self.min_x()
                && point.x < self.max_x())
    }

    /// Grows the rect by `dx` on the left and right edges only.
    pub fn widened(&self, dx: f64) -> Self {
        Self::from_xywh(
            self.origin.x - dx,
            self.origin.y,
            self.size.width + dx * 2.0,
            self.size.height,
        )
    }

    /// Extends the top edge up to `top`, keeping the bottom edge fixed.
    pub fn extended_to_top(&self, top: f64) -> Self {
        if top <= self.max_y() {
            return *self;
        }
        Self::from_xywh(self.origin.x, self.origin.y, self.size.width, top - self.origin.y)
    }

    pub fn union(&self, other: &Rect) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Self::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}
