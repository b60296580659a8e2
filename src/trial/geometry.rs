//! Grid cell to pixel geometry
//!
//! Trials place their objects on a fixed 2×2 grid. Each role sees the grid
//! independently, so a cell assignment is turned into pixel coordinates
//! separately for the speaker and the listener.

use serde::Serialize;

use crate::constants::{grid, trial::OBJECTS_PER_TRIAL};

/// A cell of the fixed stimulus grid
///
/// Coordinates are 1-indexed: `(1, 1)` is the upper-left cell and
/// `(2, 2)` the lower-right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    x: u8,
    y: u8,
}

const _: () = assert!(Cell::ALL.len() == OBJECTS_PER_TRIAL);

impl Cell {
    /// Every cell of the grid, in row-major order
    pub const ALL: [Cell; 4] = [
        Cell::new(1, 1),
        Cell::new(2, 1),
        Cell::new(1, 2),
        Cell::new(2, 2),
    ];

    /// Creates a cell from 1-indexed grid coordinates
    ///
    /// # Panics
    ///
    /// Panics if the coordinates fall outside the grid. Cells only ever
    /// come from [`Cell::ALL`], so this is a programming error.
    #[allow(clippy::manual_range_contains)]
    pub const fn new(x: u8, y: u8) -> Self {
        assert!(
            x >= 1 && x <= grid::HORIZONTAL_CELLS && y >= 1 && y <= grid::VERTICAL_CELLS,
            "cell outside of the grid"
        );
        Self { x, y }
    }

    /// Column of the cell, starting at 1
    pub fn x(self) -> u8 {
        self.x
    }

    /// Row of the cell, starting at 1
    pub fn y(self) -> u8 {
        self.y
    }
}

/// Pixel size of a grid cell and the padding around the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellDimensions {
    /// Cell width in pixels
    pub width: f64,
    /// Cell height in pixels
    pub height: f64,
    /// Padding in pixels, split evenly on both sides of the grid
    pub padding: f64,
}

impl Default for CellDimensions {
    fn default() -> Self {
        Self {
            width: grid::DEFAULT_CELL_WIDTH,
            height: grid::DEFAULT_CELL_HEIGHT,
            padding: 0.,
        }
    }
}

impl CellDimensions {
    /// Size an object is drawn at inside a cell
    pub fn object_size(&self) -> (f64, f64) {
        (
            self.width * grid::OBJECT_SCALE,
            self.height * grid::OBJECT_SCALE,
        )
    }
}

/// The pixel rectangle covered by a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRect {
    /// Horizontal centre of the cell
    pub center_x: f64,
    /// Vertical centre of the cell
    pub center_y: f64,
    /// Left edge of the cell
    pub upper_left_x: f64,
    /// Top edge of the cell
    pub upper_left_y: f64,
    /// Cell width
    pub width: f64,
    /// Cell height
    pub height: f64,
}

/// Maps a grid cell to the pixel rectangle it covers
pub fn cell_to_pixel(cell: Cell, dimensions: CellDimensions) -> PixelRect {
    let column = f64::from(cell.x - 1);
    let row = f64::from(cell.y - 1);

    let upper_left_x = dimensions.width * column + dimensions.padding / 2.;
    let upper_left_y = dimensions.height * row + dimensions.padding / 2.;

    PixelRect {
        center_x: upper_left_x + dimensions.width / 2.,
        center_y: upper_left_y + dimensions.height / 2.,
        upper_left_x,
        upper_left_y,
        width: dimensions.width,
        height: dimensions.height,
    }
}

/// Where an object sits for one role
///
/// Carries the grid cell together with the pixel positions a client needs
/// to draw the object (`trueX`/`trueY`) and its highlight box
/// (`gridPixelX`/`gridPixelY`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    grid_x: u8,
    grid_y: u8,
    true_x: f64,
    true_y: f64,
    grid_pixel_x: f64,
    grid_pixel_y: f64,
}

impl Placement {
    /// Derives the pixel placement of an object drawn in `cell`
    pub fn new(cell: Cell, dimensions: CellDimensions) -> Self {
        let rect = cell_to_pixel(cell, dimensions);
        let (object_width, object_height) = dimensions.object_size();

        Self {
            grid_x: cell.x,
            grid_y: cell.y,
            true_x: rect.center_x - object_width / 2.,
            true_y: rect.center_y - object_height / 2.,
            grid_pixel_x: rect.center_x - grid::HIGHLIGHT_OFFSET,
            grid_pixel_y: rect.center_y - grid::HIGHLIGHT_OFFSET,
        }
    }

    /// The grid cell of this placement
    pub fn cell(&self) -> Cell {
        Cell::new(self.grid_x, self.grid_y)
    }

    /// Upper-left corner of the drawn object
    pub fn true_position(&self) -> (f64, f64) {
        (self.true_x, self.true_y)
    }

    /// Upper-left corner of the highlight box
    pub fn grid_pixel_position(&self) -> (f64, f64) {
        (self.grid_pixel_x, self.grid_pixel_y)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn square(side: f64, padding: f64) -> CellDimensions {
        CellDimensions {
            width: side,
            height: side,
            padding,
        }
    }

    #[test]
    fn test_upper_left_cell_center() {
        let rect = cell_to_pixel(Cell::new(1, 1), square(300., 0.));
        assert_eq!((rect.center_x, rect.center_y), (150., 150.));
        assert_eq!((rect.upper_left_x, rect.upper_left_y), (0., 0.));
        assert_eq!((rect.width, rect.height), (300., 300.));
    }

    #[test]
    fn test_lower_right_cell_center() {
        let rect = cell_to_pixel(Cell::new(2, 2), square(300., 0.));
        assert_eq!((rect.center_x, rect.center_y), (450., 450.));
        assert_eq!((rect.upper_left_x, rect.upper_left_y), (300., 300.));
    }

    #[test]
    fn test_padding_shifts_by_half() {
        let rect = cell_to_pixel(Cell::new(2, 1), square(100., 20.));
        assert_eq!((rect.upper_left_x, rect.upper_left_y), (110., 10.));
        assert_eq!((rect.center_x, rect.center_y), (160., 60.));
    }

    #[test]
    fn test_rectangular_cells() {
        let dimensions = CellDimensions {
            width: 200.,
            height: 100.,
            padding: 0.,
        };
        let rect = cell_to_pixel(Cell::new(1, 2), dimensions);
        assert_eq!((rect.center_x, rect.center_y), (100., 150.));
    }

    #[test]
    fn test_placement_centres_object() {
        let placement = Placement::new(Cell::new(1, 1), square(300., 0.));
        assert_eq!(placement.true_position(), (37.5, 37.5));
        assert_eq!(placement.grid_pixel_position(), (50., 50.));
        assert_eq!(placement.cell(), Cell::new(1, 1));
    }

    #[test]
    fn test_placement_serializes_client_field_names() {
        let placement = Placement::new(Cell::new(2, 1), square(300., 0.));
        let json = serde_json::to_value(placement).unwrap();

        assert_eq!(json["gridX"], 2);
        assert_eq!(json["gridY"], 1);
        assert_eq!(json["trueX"], 337.5);
        assert_eq!(json["gridPixelY"], 50.);
    }

    #[test]
    fn test_all_cells_distinct() {
        let mut cells = Cell::ALL.to_vec();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    #[should_panic(expected = "cell outside of the grid")]
    fn test_out_of_range_cell_panics() {
        let _ = Cell::new(3, 1);
    }
}
