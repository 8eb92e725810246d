use thiserror::Error;

use crate::game::GridCoord;
use crate::geometry::{PixelPoint, Rect};

mod transform;

pub use transform::{cell_rect, grid_to_pixel, grid_to_pixel_offset, pixel_to_grid};

/// Empty tiles kept on every side of the placed extent.
pub const GRID_MARGIN_TILES: u32 = 1;
pub const LEFT_MENU_SHARE: f32 = 0.15;
pub const RIGHT_MENU_SHARE: f32 = 0.15;
pub const TOKEN_SCALE: f32 = 0.2;
pub const AGENT_SCALE: f32 = 1.75;
pub const TOKEN_OUTLINE_SCALE: f32 = 0.25;
pub const MENU_TILE_COLUMNS: u32 = 2;
pub const OFFER_SCALE: f32 = 0.15;
pub const CARD_ASPECT: f32 = 1.4;
pub const CARD_HEADER_SHARE: f32 = 0.15;
pub const ROUTE_THICKNESS_PX: u32 = 4;
pub const TILE_BORDER_SHARE: f32 = 0.02;
pub const SCORES_FONT_SCALE: f32 = 0.05;
pub const SCORES_SPACING: f32 = 1.5;
pub const PROMPT_FONT_SCALE: f32 = 0.05;
pub const CARD_FONT_SCALE: f32 = 0.03;
/// Largest width or height a viewer may ask frames to be rendered at.
pub const MAX_VIEWPORT_PX: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn within_limit(&self) -> bool {
        self.width <= MAX_VIEWPORT_PX && self.height <= MAX_VIEWPORT_PX
    }
}

/// Bounding box of every tile ever placed. Only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridExtent {
    pub min_longitude: i32,
    pub max_longitude: i32,
    pub min_latitude: i32,
    pub max_latitude: i32,
}

impl GridExtent {
    pub const fn from_cell(cell: GridCoord) -> Self {
        Self {
            min_longitude: cell.longitude,
            max_longitude: cell.longitude,
            min_latitude: cell.latitude,
            max_latitude: cell.latitude,
        }
    }

    pub fn from_cells(cells: impl IntoIterator<Item = GridCoord>) -> Option<Self> {
        let mut cells = cells.into_iter();
        let mut extent = Self::from_cell(cells.next()?);
        for cell in cells {
            extent.include(cell);
        }
        Some(extent)
    }

    /// Grows to cover `cell`; returns whether the bounds changed.
    pub fn include(&mut self, cell: GridCoord) -> bool {
        let before = *self;
        self.min_longitude = self.min_longitude.min(cell.longitude);
        self.max_longitude = self.max_longitude.max(cell.longitude);
        self.min_latitude = self.min_latitude.min(cell.latitude);
        self.max_latitude = self.max_latitude.max(cell.latitude);
        before != *self
    }

    pub fn contains(&self, cell: GridCoord) -> bool {
        (self.min_longitude..=self.max_longitude).contains(&cell.longitude)
            && (self.min_latitude..=self.max_latitude).contains(&cell.latitude)
    }

    pub fn columns(&self) -> u32 {
        (self.max_longitude - self.min_longitude + 1).unsigned_abs()
    }

    pub fn rows(&self) -> u32 {
        (self.max_latitude - self.min_latitude + 1).unsigned_abs()
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        (self.min_longitude..=self.max_longitude).flat_map(move |longitude| {
            (self.min_latitude..=self.max_latitude)
                .map(move |latitude| GridCoord::new(longitude, latitude))
        })
    }
}

/// What a cached image at the prior tile size needs after a relayout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAction {
    Unchanged,
    RescaleOnly,
    ReloadNeeded,
}

impl ResizeAction {
    pub fn between(prior_tile_size: Option<u32>, tile_size: u32) -> Self {
        match prior_tile_size {
            Some(prior) if prior == tile_size => Self::Unchanged,
            Some(prior) if tile_size > prior => Self::ReloadNeeded,
            _ => Self::RescaleOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSizes {
    pub scores_px: u32,
    pub prompt_px: u32,
    pub card_px: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub viewport: Viewport,
    pub tile_size: u32,
    /// Displayed grid size, including margin and slack columns/rows.
    pub columns: u32,
    pub rows: u32,
    /// Column of longitude 0 and row offset of latitude 0 (rows count down from the top).
    pub origin_column: i32,
    pub origin_row: i32,
    /// Pixel position of the top-left corner of display column 0, row 0.
    pub grid_offset: PixelPoint,
    pub play_area: Rect,
    pub left_menu: Rect,
    pub right_menu: Rect,
    pub token_size: u32,
    pub token_outline: u32,
    pub agent_size: u32,
    pub menu_tile_size: u32,
    pub offer_size: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub card_header: u32,
    pub route_thickness: u32,
    pub fonts: FontSizes,
    pub resize_action: ResizeAction,
}

impl LayoutGeometry {
    pub fn grid_pixel_width(&self) -> u32 {
        self.columns * self.tile_size
    }

    pub fn grid_pixel_height(&self) -> u32 {
        self.rows * self.tile_size
    }

    pub fn grid_rect(&self) -> Rect {
        Rect::new(
            self.grid_offset.x,
            self.grid_offset.y,
            self.grid_pixel_width() as i32,
            self.grid_pixel_height() as i32,
        )
    }
}

/// Every variant means "not ready yet": the caller waits for a usable extent or viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("grid extent is not initialized; no tiles have been placed")]
    ExtentUninitialized,
    #[error("viewport {width}x{height} cannot fit a {columns}x{rows} grid at one pixel per tile")]
    ViewportTooSmall {
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
    },
    #[error("viewport {width}x{height} exceeds the viewport limit")]
    ViewportTooLarge { width: u32, height: u32 },
}

pub fn compute_layout(
    viewport: Viewport,
    extent: Option<GridExtent>,
    prior_tile_size: Option<u32>,
) -> Result<LayoutGeometry, LayoutError> {
    let extent = extent.ok_or(LayoutError::ExtentUninitialized)?;
    if !viewport.within_limit() {
        return Err(LayoutError::ViewportTooLarge {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let left_width = scaled(viewport.width, LEFT_MENU_SHARE);
    let right_width = scaled(viewport.width, RIGHT_MENU_SHARE);
    let play_width = viewport.width.saturating_sub(left_width + right_width);
    let play_height = viewport.height;

    let padded_columns = extent.columns() + 2 * GRID_MARGIN_TILES;
    let padded_rows = extent.rows() + 2 * GRID_MARGIN_TILES;
    let tile_size = (play_width / padded_columns).min(play_height / padded_rows);
    if tile_size == 0 {
        return Err(LayoutError::ViewportTooSmall {
            width: viewport.width,
            height: viewport.height,
            columns: padded_columns,
            rows: padded_rows,
        });
    }

    let (columns, extra_columns) = distribute_slack(padded_columns, play_width, tile_size);
    let (rows, extra_rows) = distribute_slack(padded_rows, play_height, tile_size);
    let origin_column = -extent.min_longitude + GRID_MARGIN_TILES as i32 + (extra_columns / 2) as i32;
    let origin_row = -extent.min_latitude + GRID_MARGIN_TILES as i32 + (extra_rows / 2) as i32;

    let play_area = Rect::new(left_width as i32, 0, play_width as i32, play_height as i32);
    let grid_offset = PixelPoint::new(
        play_area.x + ((play_width - columns * tile_size) / 2) as i32,
        play_area.y + ((play_height - rows * tile_size) / 2) as i32,
    );

    let card_width = left_width;
    let card_height = scaled(card_width, CARD_ASPECT);
    let token_size = scaled(tile_size, TOKEN_SCALE).max(1);

    Ok(LayoutGeometry {
        viewport,
        tile_size,
        columns,
        rows,
        origin_column,
        origin_row,
        grid_offset,
        play_area,
        left_menu: Rect::new(0, 0, left_width as i32, viewport.height as i32),
        right_menu: Rect::new(
            (left_width + play_width) as i32,
            0,
            right_width as i32,
            viewport.height as i32,
        ),
        token_size,
        token_outline: scaled(token_size, TOKEN_OUTLINE_SCALE).max(1),
        agent_size: scaled(token_size, AGENT_SCALE).max(1),
        menu_tile_size: right_width / MENU_TILE_COLUMNS,
        offer_size: scaled(viewport.width, OFFER_SCALE),
        card_width,
        card_height,
        card_header: scaled(card_height, CARD_HEADER_SHARE).max(1),
        route_thickness: ROUTE_THICKNESS_PX,
        fonts: FontSizes {
            scores_px: scaled(viewport.height, SCORES_FONT_SCALE).max(1),
            prompt_px: scaled(viewport.height, PROMPT_FONT_SCALE).max(1),
            card_px: scaled(viewport.height, CARD_FONT_SCALE).max(1),
        },
        resize_action: ResizeAction::between(prior_tile_size, tile_size),
    })
}

/// Turns whole tiles of slack into extra display columns (or rows).
/// Returns the new count and how many were added.
fn distribute_slack(padded: u32, available_px: u32, tile_size: u32) -> (u32, u32) {
    let slack = available_px - padded * tile_size;
    if slack > tile_size {
        let extra = slack / tile_size;
        (padded + extra, extra)
    } else {
        (padded, 0)
    }
}

fn scaled(value: u32, factor: f32) -> u32 {
    (value as f32 * factor).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(lon: (i32, i32), lat: (i32, i32)) -> GridExtent {
        GridExtent {
            min_longitude: lon.0,
            max_longitude: lon.1,
            min_latitude: lat.0,
            max_latitude: lat.1,
        }
    }

    #[test]
    fn reference_viewport_fits_eight_by_five_in_playable_band() {
        let geometry = compute_layout(Viewport::new(1000, 800), Some(extent((-2, 3), (-1, 1))), None)
            .expect("layout");
        assert_eq!(geometry.play_area.width, 700);
        assert_eq!(geometry.tile_size, 87);
        assert!(geometry.tile_size * 8 <= 700);
        assert!(geometry.tile_size * 5 <= 800);
        assert_eq!(geometry.columns, 8);
    }

    #[test]
    fn containment_holds_across_viewports_and_extents() {
        let cases = [
            (Viewport::new(1000, 800), extent((-2, 3), (-1, 1))),
            (Viewport::new(640, 480), extent((0, 0), (0, 0))),
            (Viewport::new(1920, 1080), extent((-9, 11), (-4, 6))),
            (Viewport::new(333, 901), extent((-1, 4), (-7, 2))),
        ];
        for (viewport, extent) in cases {
            let geometry = compute_layout(viewport, Some(extent), None).expect("layout");
            let columns = extent.columns() + 2 * GRID_MARGIN_TILES;
            let rows = extent.rows() + 2 * GRID_MARGIN_TILES;
            assert!(geometry.tile_size * columns <= geometry.play_area.width as u32);
            assert!(geometry.tile_size * rows <= viewport.height);
            assert!(geometry.grid_pixel_width() <= geometry.play_area.width as u32);
            assert!(geometry.grid_pixel_height() <= viewport.height);
        }
    }

    #[test]
    fn vertical_slack_becomes_centered_rows() {
        let geometry = compute_layout(Viewport::new(1000, 800), Some(extent((-2, 3), (-1, 1))), None)
            .expect("layout");
        // 800 - 5 * 87 = 365 px of slack, four whole tiles
        assert_eq!(geometry.rows, 9);
        assert_eq!(geometry.origin_row, 1 + 1 + 2);
        assert_eq!(geometry.origin_column, 2 + 1);
    }

    #[test]
    fn growing_extent_shrinks_tiles() {
        let small = compute_layout(Viewport::new(1000, 800), Some(extent((0, 1), (0, 1))), None)
            .expect("small");
        let grown = compute_layout(
            Viewport::new(1000, 800),
            Some(extent((-5, 6), (0, 1))),
            Some(small.tile_size),
        )
        .expect("grown");
        assert!(grown.tile_size < small.tile_size);
        assert_eq!(grown.resize_action, ResizeAction::RescaleOnly);
    }

    #[test]
    fn larger_viewport_requests_reload() {
        let grid = Some(extent((-2, 3), (-1, 1)));
        let small = compute_layout(Viewport::new(1000, 800), grid, None).expect("small");
        let large = compute_layout(Viewport::new(2000, 1600), grid, Some(small.tile_size))
            .expect("large");
        assert_eq!(large.resize_action, ResizeAction::ReloadNeeded);
        let same = compute_layout(Viewport::new(1000, 800), grid, Some(small.tile_size))
            .expect("same");
        assert_eq!(same.resize_action, ResizeAction::Unchanged);
    }

    #[test]
    fn missing_extent_is_not_ready() {
        let err = compute_layout(Viewport::new(1000, 800), None, None).unwrap_err();
        assert_eq!(err, LayoutError::ExtentUninitialized);
    }

    #[test]
    fn tiny_viewport_is_not_ready() {
        let err = compute_layout(Viewport::new(10, 10), Some(extent((-2, 3), (-1, 1))), None)
            .unwrap_err();
        assert!(matches!(err, LayoutError::ViewportTooSmall { columns: 8, rows: 5, .. }));
    }

    #[test]
    fn oversized_viewport_is_not_ready() {
        let grid = Some(extent((-2, 3), (-1, 1)));
        let err = compute_layout(Viewport::new(u32::MAX, u32::MAX), grid, None).unwrap_err();
        assert!(matches!(err, LayoutError::ViewportTooLarge { .. }));
        let at_limit = Viewport::new(MAX_VIEWPORT_PX, 600);
        assert!(compute_layout(at_limit, grid, None).is_ok());
    }

    #[test]
    fn extent_include_reports_growth() {
        let mut grid = GridExtent::from_cell(GridCoord::new(0, 0));
        assert!(!grid.include(GridCoord::new(0, 0)));
        assert!(grid.include(GridCoord::new(-1, 2)));
        assert_eq!(grid.columns(), 2);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cells().count(), 6);
    }
}
