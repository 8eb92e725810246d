use crate::game::{AdventurerRef, GridCoord, PlayerIndex};
use crate::geometry::{segment_distance_squared, PixelPoint, Rect};
use crate::layout::LayoutGeometry;
use crate::session::{FocusTarget, HighlightKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionShape {
    Rect(Rect),
    Circle { center: PixelPoint, radius: i32 },
    Segment {
        from: PixelPoint,
        to: PixelPoint,
        tolerance: i32,
    },
}

impl RegionShape {
    pub fn contains(&self, point: PixelPoint) -> bool {
        match *self {
            Self::Rect(rect) => rect.contains(point),
            Self::Circle { center, radius } => {
                let radius = i64::from(radius);
                point.distance_squared(center) < radius * radius
            }
            Self::Segment {
                from,
                to,
                tolerance,
            } => {
                let tolerance = f64::from(tolerance);
                segment_distance_squared(point, from, to) <= tolerance * tolerance
            }
        }
    }

    pub fn rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(rect) => Some(*rect),
            _ => None,
        }
    }
}

/// What a region means when clicked, with the identity needed to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    ChestMenu {
        columns: u32,
        tile_size: u32,
        capacity: usize,
    },
    CardStack {
        card_height: u32,
        header_height: u32,
        cards: usize,
    },
    ToggleMenu,
    Toggle(HighlightKind),
    ScoreCell(FocusTarget),
    UndoButton,
    AdventurerToken(AdventurerRef),
    AgentToken(PlayerIndex),
    Highlight {
        kind: HighlightKind,
        cell: GridCoord,
    },
    RouteSegment {
        route: usize,
        from: GridCoord,
        to: GridCoord,
    },
    CardOffer(usize),
    TileOffer(usize),
}

impl RegionKind {
    pub fn is_offer(&self) -> bool {
        matches!(self, Self::CardOffer(_) | Self::TileOffer(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractiveRegion {
    pub kind: RegionKind,
    pub shape: RegionShape,
}

impl InteractiveRegion {
    pub fn contains(&self, point: PixelPoint) -> bool {
        self.shape.contains(point)
    }
}

/// Regions drawn in the latest frame. Append-only while a frame is drawn and
/// replaced wholesale by [`RegionRegistry::begin_frame`].
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    frame: u64,
    layout: Option<LayoutGeometry>,
    regions: Vec<InteractiveRegion>,
    routes: Vec<Vec<GridCoord>>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every region from the previous frame. `layout` is `None` when the
    /// frame could not be laid out, which leaves the registry empty.
    pub fn begin_frame(&mut self, layout: Option<LayoutGeometry>) -> u64 {
        self.frame = self.frame.wrapping_add(1);
        self.layout = layout;
        self.regions.clear();
        self.routes.clear();
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn layout(&self) -> Option<&LayoutGeometry> {
        self.layout.as_ref()
    }

    pub fn push(&mut self, kind: RegionKind, shape: RegionShape) {
        self.regions.push(InteractiveRegion { kind, shape });
    }

    pub fn push_rect(&mut self, kind: RegionKind, rect: Rect) {
        self.push(kind, RegionShape::Rect(rect));
    }

    /// Stores a followable path and returns the index route segments refer to.
    pub fn add_route(&mut self, path: Vec<GridCoord>) -> usize {
        self.routes.push(path);
        self.routes.len() - 1
    }

    pub fn route(&self, index: usize) -> Option<&[GridCoord]> {
        self.routes.get(index).map(Vec::as_slice)
    }

    pub fn regions(&self) -> &[InteractiveRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn has_offers(&self) -> bool {
        self.regions.iter().any(|region| region.kind.is_offer())
    }

    /// Regions containing `point` that satisfy `filter`, in drawing order.
    pub fn hits<'a, F>(
        &'a self,
        point: PixelPoint,
        filter: F,
    ) -> impl Iterator<Item = &'a InteractiveRegion> + 'a
    where
        F: Fn(&RegionKind) -> bool + 'a,
    {
        self.regions
            .iter()
            .filter(move |region| filter(&region.kind) && region.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_frame_discards_stale_regions_and_routes() {
        let mut registry = RegionRegistry::new();
        registry.begin_frame(None);
        registry.push_rect(RegionKind::UndoButton, Rect::new(0, 0, 10, 10));
        let route = registry.add_route(vec![GridCoord::new(0, 0), GridCoord::new(1, 0)]);
        assert_eq!(route, 0);
        assert_eq!(registry.len(), 1);

        let before = registry.frame();
        let after = registry.begin_frame(None);
        assert_eq!(after, before + 1);
        assert!(registry.is_empty());
        assert!(registry.route(0).is_none());
        assert_eq!(registry.hits(PixelPoint::new(5, 5), |_| true).count(), 0);
    }

    #[test]
    fn circle_uses_strict_distance_squared() {
        let shape = RegionShape::Circle {
            center: PixelPoint::new(10, 10),
            radius: 5,
        };
        assert!(shape.contains(PixelPoint::new(13, 13)));
        assert!(!shape.contains(PixelPoint::new(15, 10)));
        assert!(!shape.contains(PixelPoint::new(14, 14)));
    }

    #[test]
    fn segment_accepts_points_within_tolerance_band() {
        let shape = RegionShape::Segment {
            from: PixelPoint::new(0, 0),
            to: PixelPoint::new(100, 0),
            tolerance: 4,
        };
        assert!(shape.contains(PixelPoint::new(50, 4)));
        assert!(shape.contains(PixelPoint::new(50, -3)));
        assert!(!shape.contains(PixelPoint::new(50, 5)));
        assert!(!shape.contains(PixelPoint::new(106, 0)));
    }

    #[test]
    fn offers_are_detected() {
        let mut registry = RegionRegistry::new();
        registry.push_rect(RegionKind::ToggleMenu, Rect::new(0, 0, 5, 5));
        assert!(!registry.has_offers());
        registry.push_rect(RegionKind::TileOffer(0), Rect::new(0, 0, 5, 5));
        assert!(registry.has_offers());
    }
}
