use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

/// Axis-aligned pixel rectangle. Containment is half-open: the right and bottom
/// edges belong to the neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Shrinks every edge by `amount`, never below an empty rect.
    pub fn inset(&self, amount: i32) -> Self {
        let width = (self.width - 2 * amount).max(0);
        let height = (self.height - 2 * amount).max(0);
        Self::new(self.x + amount, self.y + amount, width, height)
    }
}

/// Squared distance from `point` to the closed segment `from..to`.
pub fn segment_distance_squared(point: PixelPoint, from: PixelPoint, to: PixelPoint) -> f64 {
    let (px, py) = (f64::from(point.x), f64::from(point.y));
    let (ax, ay) = (f64::from(from.x), f64::from(from.y));
    let (bx, by) = (f64::from(to.x), f64::from(to.y));
    let (dx, dy) = (bx - ax, by - ay);
    let length_squared = dx * dx + dy * dy;
    let t = if length_squared == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / length_squared).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx).powi(2) + (py - cy).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_containment_is_half_open() {
        let rect = Rect::new(10, 20, 5, 5);
        assert!(rect.contains(PixelPoint::new(10, 20)));
        assert!(rect.contains(PixelPoint::new(14, 24)));
        assert!(!rect.contains(PixelPoint::new(15, 20)));
        assert!(!rect.contains(PixelPoint::new(10, 25)));
    }

    #[test]
    fn inset_never_goes_negative() {
        let rect = Rect::new(0, 0, 4, 10).inset(3);
        assert_eq!(rect.width, 0);
        assert_eq!(rect.height, 4);
        assert!(rect.is_empty());
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let from = PixelPoint::new(0, 0);
        let to = PixelPoint::new(10, 0);
        assert_eq!(segment_distance_squared(PixelPoint::new(5, 3), from, to), 9.0);
        assert_eq!(segment_distance_squared(PixelPoint::new(-4, 3), from, to), 25.0);
        assert_eq!(segment_distance_squared(PixelPoint::new(13, 4), from, to), 25.0);
    }
}
