//! Slippy-map grid tiles
//!
//! Task grids are built from Web Mercator tiles; splitting a task replaces
//! its tile with the four tiles one zoom level deeper.

use serde_json::{json, Value};

/// Tiles at this zoom (or deeper) are too small to split further.
pub const MAX_SPLIT_ZOOM: i32 = 18;

/// A Web Mercator tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: i64,
    pub y: i64,
    pub zoom: i32,
}

impl Tile {
    pub fn new(x: i64, y: i64, zoom: i32) -> Self {
        Self { x, y, zoom }
    }

    /// The four tiles covering this one at `zoom + 1`, in row-major order.
    pub fn children(&self) -> [Tile; 4] {
        let (x, y, zoom) = (self.x * 2, self.y * 2, self.zoom + 1);
        [
            Tile::new(x, y, zoom),
            Tile::new(x + 1, y, zoom),
            Tile::new(x, y + 1, zoom),
            Tile::new(x + 1, y + 1, zoom),
        ]
    }

    /// Whether the address lies inside the grid for its zoom.
    pub fn is_valid(&self) -> bool {
        if !(0..=30).contains(&self.zoom) {
            return false;
        }
        let size = 1i64 << self.zoom;
        (0..size).contains(&self.x) && (0..size).contains(&self.y)
    }

    /// Bounding box as `(west, south, east, north)` in degrees.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let west = tile_lon(self.x, self.zoom);
        let east = tile_lon(self.x + 1, self.zoom);
        let north = tile_lat(self.y, self.zoom);
        let south = tile_lat(self.y + 1, self.zoom);
        (west, south, east, north)
    }

    /// GeoJSON `MultiPolygon` covering the tile.
    pub fn to_geojson(&self) -> Value {
        let (west, south, east, north) = self.bounds();
        json!({
            "type": "MultiPolygon",
            "coordinates": [[[
                [west, south],
                [east, south],
                [east, north],
                [west, north],
                [west, south]
            ]]]
        })
    }
}

fn tile_lon(x: i64, zoom: i32) -> f64 {
    x as f64 / 2f64.powi(zoom) * 360.0 - 180.0
}

fn tile_lat(y: i64, zoom: i32) -> f64 {
    let n = std::f64::consts::PI * (1.0 - 2.0 * y as f64 / 2f64.powi(zoom));
    n.sinh().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_cover_parent() {
        let parent = Tile::new(3, 5, 4);
        let children = parent.children();
        assert_eq!(children[0], Tile::new(6, 10, 5));
        assert_eq!(children[3], Tile::new(7, 11, 5));

        let (pw, ps, pe, pn) = parent.bounds();
        let (w, _, _, n) = children[0].bounds();
        let (_, s, e, _) = children[3].bounds();
        assert!((pw - w).abs() < 1e-9);
        assert!((pn - n).abs() < 1e-9);
        assert!((pe - e).abs() < 1e-9);
        assert!((ps - s).abs() < 1e-9);
    }

    #[test]
    fn test_world_tile_bounds() {
        let (w, s, e, n) = Tile::new(0, 0, 0).bounds();
        assert_eq!(w, -180.0);
        assert_eq!(e, 180.0);
        assert!((n - 85.0511).abs() < 1e-3);
        assert!((s + 85.0511).abs() < 1e-3);
    }

    #[test]
    fn test_validity() {
        assert!(Tile::new(1, 1, 1).is_valid());
        assert!(!Tile::new(2, 0, 1).is_valid());
        assert!(!Tile::new(0, -1, 3).is_valid());
    }
}
