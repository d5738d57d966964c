//! Pointer geometry used to resolve drag targets.

/// Axis-aligned rectangle in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Area shared with `other`; zero when disjoint or merely touching.
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let width = self.right().min(other.right()) - self.left.max(other.left);
        let height = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if width <= 0.0 || height <= 0.0 {
            0.0
        } else {
            width * height
        }
    }
}

/// Pointer offset inside the grabbed card.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Insertion index when hovering the card at `over_index`.
///
/// The dragged card goes after the hovered one once its top edge passes the
/// hovered card's bottom edge, before it otherwise.
pub fn insertion_index(over_index: usize, over_rect: &Rect, dragged: Option<&Rect>) -> usize {
    match dragged {
        Some(dragged) if dragged.top > over_rect.bottom() => over_index + 1,
        _ => over_index,
    }
}

#[cfg(test)]
mod tests {
    use super::{insertion_index, Rect};

    #[test]
    fn intersection_area_handles_overlap_and_disjoint() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(10.0, 0.0, 5.0, 5.0);
        assert_eq!(a.intersection_area(&b), 25.0);
        assert_eq!(a.intersection_area(&c), 0.0);
    }

    #[test]
    fn insertion_index_places_below_hovered_card() {
        let over = Rect::new(0.0, 100.0, 200.0, 50.0);
        let above = Rect::new(0.0, 120.0, 200.0, 50.0);
        let below = Rect::new(0.0, 151.0, 200.0, 50.0);
        assert_eq!(insertion_index(2, &over, Some(&above)), 2);
        assert_eq!(insertion_index(2, &over, Some(&below)), 3);
        assert_eq!(insertion_index(2, &over, None), 2);
    }
}
