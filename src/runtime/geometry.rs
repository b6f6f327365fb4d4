use serde::{Deserialize, Serialize};


/// Axis-aligned screen rectangle. `right` and `bottom` are exclusive.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect { left, top, right, bottom }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty()
            && x >= self.left && x < self.right
            && y >= self.top && y < self.bottom
    }

    /// Overlap of two rectangles, or `None` when they don't overlap.
    /// Neither input is touched.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let clipped = Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if clipped.is_empty() { None } else { Some(clipped) }
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + (self.right - self.left) / 2,
            self.top + (self.bottom - self.top) / 2,
        )
    }
}


pub fn distance(a: (i32, i32), b: (i32, i32)) -> f32 {
    let dx = (a.0 - b.0) as f32;
    let dy = (a.1 - b.1) as f32;
    dx.hypot(dy)
}

pub fn distance_f(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_returns_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 60, 200, 200);
        assert_eq!(a.intersect(&b), Some(Rect::new(50, 60, 100, 100)));
        // inputs untouched
        assert_eq!(a, Rect::new(0, 0, 100, 100));
    }

    #[test]
    fn disjoint_rects_have_no_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 20, 10);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn empty_rect_contains_nothing() {
        let r = Rect::new(5, 5, 5, 20);
        assert!(!r.contains(5, 10));
        assert!(Rect::new(0, 0, 10, 10).contains(9, 0));
        assert!(!Rect::new(0, 0, 10, 10).contains(10, 0));
    }
}
