//! Division maps: per-query flag sets over the sky grid.
//!
//! A [`DivisionMap`] marks which cells of the [`CellGrid`] a query touches.
//! Flags are only ever set, never cleared; a map is filled by one or more
//! circular regions (or [`DivisionMap::fill_all`]), optionally dilated with
//! [`DivisionMap::expand`], and then consumed by a [`DivisionMapCursor`]
//! that walks the flagged cells as folder keys.
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_atlas::sky::{Coordinate, DivisionMap};
//!
//! let mut map = DivisionMap::new();
//! map.fill(&Coordinate::from_hours(10.0, 20.0)?, 2.0);
//!
//! let mut cursor = map.into_cursor();
//! let mut key = cursor.first();
//! while let Some(folder) = key {
//!     println!("{folder}");
//!     key = cursor.next();
//! }
//! ```

use crate::folder::FolderKey;
use crate::sky::grid::{
    join_index, ra_column, row_starting_at, CellGrid, CELL_COUNT, RA_COLUMNS, RA_COLUMN_WIDTH_DEG,
};
use crate::sky::Coordinate;
use bitvec::prelude::*;

/// Set of grid cells of interest for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionMap {
    flags: BitVec<usize, Lsb0>,
}

impl Default for DivisionMap {
    fn default() -> Self {
        Self::new()
    }
}

impl DivisionMap {
    /// Creates a map with no cell flagged.
    pub fn new() -> Self {
        Self {
            flags: bitvec![usize, Lsb0; 0; CELL_COUNT],
        }
    }

    /// Flags every cell whose rectangle overlaps the circle of `radius`
    /// degrees around `center`.
    ///
    /// Radii above 90° flag the whole sphere. Only cells inside the circle's
    /// declination band and RA band are tested, each with an exact
    /// rectangle/circle overlap test.
    pub fn fill(&mut self, center: &Coordinate, radius: f64) {
        if radius > 90.0 {
            self.fill_all();
            return;
        }
        if radius.is_nan() || radius < 0.0 {
            return;
        }

        let grid = CellGrid::global();
        let dec = center.dec_deg();

        // band edges as whole-degree distances from the north pole, one row of slack
        let z_north = ((90.0 - dec - radius).floor() as i32 - 1).max(0);
        let z_south = ((90.0 - dec + radius).ceil() as i32 + 1).min(180);
        let columns = ra_columns(center, radius);

        for floor_dec in (90 - z_south)..(90 - z_north) {
            let row = row_starting_at(floor_dec);
            for &column in &columns {
                let index = join_index(column, row);
                if !self.flags[index] && grid.cell(index).intersects_circle(center, radius) {
                    self.flags.set(index, true);
                }
            }
        }
    }

    /// Flags every cell.
    pub fn fill_all(&mut self) {
        self.flags.fill(true);
    }

    /// Returns a new map dilated by `radius` degrees.
    ///
    /// For every cell flagged here, the new map is filled with a circle of
    /// `radius + mesh_radius` around that cell's center, which covers the
    /// whole cell grown by `radius`.
    pub fn expand(&self, radius: f64) -> DivisionMap {
        let grid = CellGrid::global();
        let reach = radius + grid.mesh_radius();
        let mut expanded = DivisionMap::new();

        for index in self.flags.iter_ones() {
            expanded.fill(&grid.cell(index).center, reach);
            if expanded.is_full() {
                break;
            }
        }

        expanded
    }

    /// Returns true if the cell at `index` is flagged.
    pub fn is_set(&self, index: usize) -> bool {
        self.flags.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// Number of flagged cells.
    pub fn count(&self) -> usize {
        self.flags.count_ones()
    }

    /// Returns true if no cell is flagged.
    pub fn is_empty(&self) -> bool {
        self.flags.not_any()
    }

    /// Returns true if every cell is flagged.
    pub fn is_full(&self) -> bool {
        self.flags.all()
    }

    /// Index of the first flagged cell.
    pub fn first_index(&self) -> Option<usize> {
        self.flags.first_one()
    }

    /// Index of the first flagged cell after `last`.
    ///
    /// A plain forward scan over the flags; the grid is small and fixed.
    pub fn next_index(&self, last: usize) -> Option<usize> {
        let start = last.checked_add(1)?;
        if start >= CELL_COUNT {
            return None;
        }
        self.flags[start..].first_one().map(|offset| start + offset)
    }

    /// Folder key of the cell at `index`, derived from the cell's center.
    pub fn folder_key_at(&self, index: usize) -> FolderKey {
        CellGrid::global().cell(index).folder_key()
    }

    /// Iterates over the indices of flagged cells.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags.iter_ones()
    }

    /// Consumes the map into a cursor over its folder keys.
    pub fn into_cursor(self) -> DivisionMapCursor {
        DivisionMapCursor::new(self)
    }
}

/// RA columns that can overlap the circle, wrapped into `0..RA_COLUMNS`.
fn ra_columns(center: &Coordinate, radius: f64) -> Vec<usize> {
    let all = || (0..RA_COLUMNS).collect();
    let dec = center.dec_deg();

    // circle reaches a pole
    if dec.abs() + radius >= 90.0 {
        return all();
    }
    let ratio = radius.to_radians().sin() / dec.to_radians().cos();
    if ratio >= 1.0 {
        return all();
    }

    let half_width = ratio.asin().to_degrees();
    let first = ((center.ra_deg() - half_width) / RA_COLUMN_WIDTH_DEG).floor() as i64 - 1;
    let last = ((center.ra_deg() + half_width) / RA_COLUMN_WIDTH_DEG).floor() as i64 + 1;
    if last - first + 1 >= RA_COLUMNS as i64 {
        return all();
    }

    (first..=last)
        .map(|column| ra_column(column as f64 * RA_COLUMN_WIDTH_DEG + RA_COLUMN_WIDTH_DEG / 2.0))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Start,
    At(usize),
    Done,
}

/// Restartable cursor over the flagged cells of a [`DivisionMap`],
/// yielding each cell's folder key in index order.
#[derive(Debug, Clone)]
pub struct DivisionMapCursor {
    map: DivisionMap,
    position: Position,
}

impl DivisionMapCursor {
    /// Creates a cursor positioned before the first flagged cell.
    pub fn new(map: DivisionMap) -> Self {
        Self {
            map,
            position: Position::Start,
        }
    }

    /// Rewinds and returns the folder key of the first flagged cell.
    pub fn first(&mut self) -> Option<FolderKey> {
        self.position = Position::Start;
        self.next()
    }

    /// Advances and returns the folder key of the next flagged cell.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<FolderKey> {
        let found = match self.position {
            Position::Start => self.map.first_index(),
            Position::At(index) => self.map.next_index(index),
            Position::Done => None,
        };
        match found {
            Some(index) => {
                self.position = Position::At(index);
                Some(self.map.folder_key_at(index))
            }
            None => {
                self.position = Position::Done;
                None
            }
        }
    }

    /// Index of the cell the cursor currently points at.
    pub fn current_index(&self) -> Option<usize> {
        match self.position {
            Position::At(index) => Some(index),
            _ => None,
        }
    }

    /// The underlying map.
    pub fn map(&self) -> &DivisionMap {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::grid::position_key;

    fn coord(ra_hours: f64, dec: f64) -> Coordinate {
        Coordinate::from_hours(ra_hours, dec).unwrap()
    }

    fn assert_exact(map: &DivisionMap, center: &Coordinate, radius: f64) {
        let grid = CellGrid::global();
        for cell in grid.cells() {
            let distance = cell.distance_to(center);
            if distance < radius - 1e-9 {
                assert!(map.is_set(cell.index), "cell {} should be flagged", cell.index);
            }
            if map.is_set(cell.index) {
                assert!(distance <= radius + 1e-9, "cell {} flagged at {distance}", cell.index);
            }
        }
    }

    #[test]
    fn test_new_map_is_empty() {
        let map = DivisionMap::new();
        assert!(map.is_empty());
        assert_eq!(map.first_index(), None);
    }

    #[test]
    fn test_fill_flags_target_cell_only_nearby() {
        let center = coord(10.0, 20.0);
        let mut map = DivisionMap::new();
        map.fill(&center, 2.0);

        let grid = CellGrid::global();
        assert!(map.is_set(grid.cell_index(&center)));
        assert!(!map.is_set(grid.cell_index(&coord(22.0, -20.0))));
        assert_exact(&map, &center, 2.0);
    }

    #[test]
    fn test_fill_exact_across_ra_wrap() {
        let center = Coordinate::new(359.5, -3.2).unwrap();
        let mut map = DivisionMap::new();
        map.fill(&center, 4.0);
        assert!(map.is_set(CellGrid::global().cell_index(&Coordinate::new(1.0, -3.0).unwrap())));
        assert_exact(&map, &center, 4.0);
    }

    #[test]
    fn test_fill_exact_near_pole() {
        let center = coord(3.0, 87.0);
        let mut map = DivisionMap::new();
        map.fill(&center, 5.0);
        // circle contains the pole, so the top row is flagged all the way round
        let grid = CellGrid::global();
        assert!(map.is_set(grid.cell_index(&coord(15.0, 89.5))));
        assert_exact(&map, &center, 5.0);
    }

    #[test]
    fn test_fill_exact_wide_circle() {
        let center = coord(6.0, -40.0);
        let mut map = DivisionMap::new();
        map.fill(&center, 60.0);
        assert_exact(&map, &center, 60.0);
    }

    #[test]
    fn test_fill_zero_radius_flags_home_cell() {
        let center = coord(13.3, 45.6);
        let mut map = DivisionMap::new();
        map.fill(&center, 0.0);
        assert!(map.is_set(CellGrid::global().cell_index(&center)));
    }

    #[test]
    fn test_fill_all_flags_everything() {
        let mut map = DivisionMap::new();
        map.fill_all();
        assert_eq!(map.count(), CELL_COUNT);
        assert!(map.is_full());
    }

    #[test]
    fn test_fill_beyond_hemisphere_equals_fill_all() {
        let mut wide = DivisionMap::new();
        wide.fill(&coord(1.0, 1.0), 90.5);
        let mut all = DivisionMap::new();
        all.fill_all();
        assert_eq!(wide, all);
    }

    #[test]
    fn test_fill_is_monotonic() {
        let mut map = DivisionMap::new();
        map.fill(&coord(2.0, 10.0), 1.0);
        let before: Vec<usize> = map.indices().collect();
        map.fill(&coord(14.0, -10.0), 1.0);
        for index in before {
            assert!(map.is_set(index));
        }
    }

    #[test]
    fn test_expand_is_superset_and_covers_radius() {
        let center = coord(4.0, 30.0);
        let mut map = DivisionMap::new();
        map.fill(&center, 1.0);
        let expanded = map.expand(3.0);

        for index in map.indices() {
            assert!(expanded.is_set(index));
        }
        let grid = CellGrid::global();
        for index in map.indices() {
            let cell_center = grid.cell(index).center;
            for other in grid.cells() {
                if other.distance_to(&cell_center) < 3.0 {
                    assert!(expanded.is_set(other.index));
                }
            }
        }
        assert!(expanded.count() > map.count());
    }

    #[test]
    fn test_next_index_walks_flags_in_order() {
        let mut map = DivisionMap::new();
        map.fill(&coord(8.0, -60.0), 3.0);
        let mut walked = Vec::new();
        let mut current = map.first_index();
        while let Some(index) = current {
            walked.push(index);
            current = map.next_index(index);
        }
        let expected: Vec<usize> = map.indices().collect();
        assert_eq!(walked, expected);
        assert_eq!(map.next_index(CELL_COUNT - 1), None);
    }

    #[test]
    fn test_cursor_yields_keys_and_restarts() {
        let center = coord(10.0, 20.0);
        let mut map = DivisionMap::new();
        map.fill(&center, 1.5);
        let count = map.count();

        let mut cursor = map.into_cursor();
        let mut keys = Vec::new();
        let mut key = cursor.first();
        while let Some(k) = key {
            keys.push(k);
            key = cursor.next();
        }
        assert_eq!(keys.len(), count);
        assert!(keys.contains(&position_key(&center)));
        assert_eq!(cursor.next(), None);

        assert_eq!(cursor.first(), Some(keys[0].clone()));
    }

    #[test]
    fn test_cursor_on_empty_map() {
        let mut cursor = DivisionMap::new().into_cursor();
        assert_eq!(cursor.first(), None);
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.current_index(), None);
    }
}
