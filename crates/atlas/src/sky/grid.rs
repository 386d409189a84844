//! Fixed partitioning of the celestial sphere into 25,920 cells.
//!
//! The sky is cut into 24 RA hours × 6 ten-minute RA slices × 2 declination
//! signs × 90 one-degree declination bands. Every cell is an RA/Dec rectangle
//! 2.5° wide in RA and 1° tall in Dec.
//!
//! The same boundaries define the on-disk folder layout: [`position_key`]
//! maps a coordinate to the 4-component [`FolderKey`]
//! `(RA hour, RA 10-minute slice, sign + Dec tens, Dec units)`, and the
//! center of every cell maps back to that cell's own key.
//!
//! The cell table is built once per process ([`CellGrid::global`]) and shared
//! read-only afterwards.

use crate::folder::FolderKey;
use crate::sky::{angular_separation_deg, Coordinate};
use std::sync::OnceLock;

/// Number of one-hour RA bands.
pub const RA_HOURS: usize = 24;

/// Number of ten-minute slices per RA hour.
pub const RA_SLICES_PER_HOUR: usize = 6;

/// Number of RA columns (hours × slices).
pub const RA_COLUMNS: usize = RA_HOURS * RA_SLICES_PER_HOUR;

/// Number of one-degree declination bands per hemisphere.
pub const DEC_DEGREES: usize = 90;

/// Number of declination rows (both hemispheres).
pub const DEC_ROWS: usize = 2 * DEC_DEGREES;

/// Total number of cells on the sphere.
pub const CELL_COUNT: usize = RA_COLUMNS * DEC_ROWS;

/// Width of one RA column in degrees (ten minutes of time).
pub const RA_COLUMN_WIDTH_DEG: f64 = 360.0 / RA_COLUMNS as f64;

/// One cell of the sky grid.
///
/// The start corner is `(ra_min, dec_min)` and the end corner is
/// `(ra_max, dec_max)`. `ra_max` may be exactly 360 for the last column.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Position of this cell in the grid.
    pub index: usize,
    /// RA of the start corner, in degrees.
    pub ra_min: f64,
    /// RA of the end corner, in degrees.
    pub ra_max: f64,
    /// Dec of the start corner, in degrees.
    pub dec_min: f64,
    /// Dec of the end corner, in degrees.
    pub dec_max: f64,
    /// Center of the rectangle.
    pub center: Coordinate,
}

impl Cell {
    fn new(index: usize) -> Self {
        let (column, row) = split_index(index);
        let ra_min = column as f64 * RA_COLUMN_WIDTH_DEG;
        let ra_max = ra_min + RA_COLUMN_WIDTH_DEG;
        let (dec_min, dec_max) = row_bounds(row);
        let center =
            Coordinate::from_degrees_unchecked((ra_min + ra_max) / 2.0, (dec_min + dec_max) / 2.0);
        Self {
            index,
            ra_min,
            ra_max,
            dec_min,
            dec_max,
            center,
        }
    }

    /// Smallest angular distance in degrees from `point` to this cell's
    /// rectangle; zero when the point lies inside it.
    ///
    /// For a fixed declination the nearest longitude inside the rectangle is
    /// either the point's own RA or the closer RA edge, so the search reduces
    /// to one meridian segment.
    pub fn distance_to(&self, point: &Coordinate) -> f64 {
        let (ra, dec) = (point.ra_deg(), point.dec_deg());
        let width = self.ra_max - self.ra_min;
        let offset = (ra - self.ra_min).rem_euclid(360.0);

        if offset <= width {
            return (dec - dec.clamp(self.dec_min, self.dec_max)).abs();
        }

        let past_end = offset - width;
        let before_start = 360.0 - offset;
        let (edge_ra, d_ra) = if past_end <= before_start {
            (self.ra_max, past_end)
        } else {
            (self.ra_min, before_start)
        };

        // latitude on the edge meridian closest to the point
        let dec_rad = dec.to_radians();
        let nearest = dec_rad
            .sin()
            .atan2(dec_rad.cos() * d_ra.to_radians().cos())
            .to_degrees();

        [
            nearest.clamp(self.dec_min, self.dec_max),
            self.dec_min,
            self.dec_max,
        ]
        .into_iter()
        .map(|edge_dec| angular_separation_deg(ra, dec, edge_ra, edge_dec))
        .fold(f64::INFINITY, f64::min)
    }

    /// Returns true if the rectangle overlaps the circle of `radius` degrees
    /// around `center`.
    pub fn intersects_circle(&self, center: &Coordinate, radius: f64) -> bool {
        self.distance_to(center) <= radius
    }

    /// Largest distance from the center to a corner, in degrees.
    pub fn half_diagonal(&self) -> f64 {
        let (ra, dec) = (self.center.ra_deg(), self.center.dec_deg());
        [
            (self.ra_min, self.dec_min),
            (self.ra_min, self.dec_max),
            (self.ra_max, self.dec_min),
            (self.ra_max, self.dec_max),
        ]
        .into_iter()
        .map(|(corner_ra, corner_dec)| angular_separation_deg(ra, dec, corner_ra, corner_dec))
        .fold(0.0, f64::max)
    }

    /// Folder key of this cell.
    pub fn folder_key(&self) -> FolderKey {
        position_key(&self.center)
    }
}

/// The process-wide table of all cells.
#[derive(Debug)]
pub struct CellGrid {
    cells: Vec<Cell>,
    mesh_radius: f64,
}

impl CellGrid {
    /// Returns the shared grid, building it on first use.
    pub fn global() -> &'static CellGrid {
        static GRID: OnceLock<CellGrid> = OnceLock::new();
        GRID.get_or_init(CellGrid::build)
    }

    fn build() -> Self {
        let cells: Vec<Cell> = (0..CELL_COUNT).map(Cell::new).collect();
        let mesh_radius = cells
            .iter()
            .map(Cell::half_diagonal)
            .fold(0.0, f64::max);
        Self { cells, mesh_radius }
    }

    /// All cells in index order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Returns the cell at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= CELL_COUNT`.
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Half the diagonal angular size of the largest cell, in degrees.
    ///
    /// Every point of every cell lies within this distance of its cell's center.
    pub fn mesh_radius(&self) -> f64 {
        self.mesh_radius
    }

    /// Index of the cell containing `coord`.
    pub fn cell_index(&self, coord: &Coordinate) -> usize {
        cell_index_of(coord)
    }
}

/// Maps a coordinate to its 4-component folder key.
///
/// Uses the same boundaries as the cell grid, so
/// `position_key(&cell.center)` is the key of `cell`.
pub fn position_key(coord: &Coordinate) -> FolderKey {
    let column = ra_column(coord.ra_deg());
    let (negative, degree) = dec_band(coord.dec_deg());
    let sign = if negative { '-' } else { '+' };
    FolderKey::new(vec![
        format!("{:02}", column / RA_SLICES_PER_HOUR),
        format!("{}", column % RA_SLICES_PER_HOUR),
        format!("{}{}", sign, degree / 10),
        format!("{}", degree % 10),
    ])
}

/// Index of the cell containing `coord`.
pub fn cell_index_of(coord: &Coordinate) -> usize {
    let column = ra_column(coord.ra_deg());
    let (negative, degree) = dec_band(coord.dec_deg());
    join_index(column, row_of(negative, degree))
}

/// RA column holding `ra_deg` (any value; wrapped into `[0, 360)`).
pub(crate) fn ra_column(ra_deg: f64) -> usize {
    let column = (ra_deg.rem_euclid(360.0) / RA_COLUMN_WIDTH_DEG).floor() as usize;
    column.min(RA_COLUMNS - 1)
}

/// Hemisphere flag and whole-degree band for a declination.
pub(crate) fn dec_band(dec_deg: f64) -> (bool, usize) {
    let degree = (dec_deg.abs().floor() as usize).min(DEC_DEGREES - 1);
    (dec_deg < 0.0, degree)
}

/// Row index for a hemisphere and degree band.
pub(crate) fn row_of(negative: bool, degree: usize) -> usize {
    if negative {
        DEC_DEGREES + degree
    } else {
        degree
    }
}

/// Row whose band starts at the integer declination `floor_dec`
/// (`-90..=89`), i.e. covers `[floor_dec, floor_dec + 1)`.
pub(crate) fn row_starting_at(floor_dec: i32) -> usize {
    if floor_dec >= 0 {
        row_of(false, floor_dec as usize)
    } else {
        row_of(true, (-floor_dec - 1) as usize)
    }
}

pub(crate) fn join_index(column: usize, row: usize) -> usize {
    column * DEC_ROWS + row
}

fn split_index(index: usize) -> (usize, usize) {
    (index / DEC_ROWS, index % DEC_ROWS)
}

fn row_bounds(row: usize) -> (f64, f64) {
    if row < DEC_DEGREES {
        (row as f64, row as f64 + 1.0)
    } else {
        let degree = (row - DEC_DEGREES) as f64;
        (-(degree + 1.0), -degree)
    }
}
