use crate::game::GridCoord;
use crate::geometry::{PixelPoint, Rect};

use super::LayoutGeometry;

fn display_column(geometry: &LayoutGeometry, cell: GridCoord) -> i32 {
    geometry.origin_column + cell.longitude
}

fn display_row(geometry: &LayoutGeometry, cell: GridCoord) -> i32 {
    geometry.rows as i32 - geometry.origin_row - cell.latitude - 1
}

pub fn cell_rect(geometry: &LayoutGeometry, cell: GridCoord) -> Rect {
    let tile = geometry.tile_size as i32;
    Rect::new(
        geometry.grid_offset.x + display_column(geometry, cell) * tile,
        geometry.grid_offset.y + display_row(geometry, cell) * tile,
        tile,
        tile,
    )
}

/// Pixel center of a grid cell.
pub fn grid_to_pixel(geometry: &LayoutGeometry, cell: GridCoord) -> PixelPoint {
    grid_to_pixel_offset(geometry, cell, (0.5, 0.5))
}

/// Point inside a cell at a fractional offset from its top-left corner.
pub fn grid_to_pixel_offset(
    geometry: &LayoutGeometry,
    cell: GridCoord,
    offset: (f32, f32),
) -> PixelPoint {
    let rect = cell_rect(geometry, cell);
    let tile = geometry.tile_size as f32;
    PixelPoint::new(
        rect.x + (offset.0 * tile).floor() as i32,
        rect.y + (offset.1 * tile).floor() as i32,
    )
}

/// Inverse of [`grid_to_pixel`]: the grid offset is removed before dividing by the tile size.
pub fn pixel_to_grid(geometry: &LayoutGeometry, point: PixelPoint) -> GridCoord {
    let tile = geometry.tile_size.max(1) as i32;
    let column = (point.x - geometry.grid_offset.x).div_euclid(tile);
    let row = (point.y - geometry.grid_offset.y).div_euclid(tile);
    GridCoord::new(
        column - geometry.origin_column,
        geometry.rows as i32 - geometry.origin_row - row - 1,
    )
}
