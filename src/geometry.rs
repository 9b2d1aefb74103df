use serde::{Deserialize, Serialize};

/// 4-connected neighbor offsets as (d_row, d_col): up, down, left, right.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// An integer cell on the colony grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self {
            row: self.row + d_row,
            col: self.col + d_col,
        }
    }

    /// L1 distance between two cells.
    pub fn manhattan(self, other: Position) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// Vector from `self` to `other`.
    pub fn relative_to(self, origin: Position) -> (i32, i32) {
        (self.row - origin.row, self.col - origin.col)
    }

    /// Convert to grid indices when the cell lies inside `rows x cols`.
    pub fn to_index(self, rows: usize, cols: usize) -> Option<(usize, usize)> {
        if self.row < 0 || self.col < 0 {
            return None;
        }
        let (r, c) = (self.row as usize, self.col as usize);
        (r < rows && c < cols).then_some((r, c))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Side length of the square that bounds a diamond body of `radius`.
pub fn body_side(radius: u32) -> usize {
    (2 * radius as usize).saturating_sub(1)
}

/// All offsets covered by a diamond (L1-ball) body of `radius`.
///
/// A radius-1 body is the single center cell; each extra unit of radius adds
/// one ring. Offsets satisfy `|d_row| + |d_col| <= radius - 1`.
pub fn footprint(radius: u32) -> Vec<(i32, i32)> {
    if radius == 0 {
        return Vec::new();
    }
    let reach = radius as i32 - 1;
    let mut cells = Vec::with_capacity(2 * (radius as usize).pow(2) - 2 * radius as usize + 1);
    for d_row in -reach..=reach {
        let span = reach - d_row.abs();
        for d_col in -span..=span {
            cells.push((d_row, d_col));
        }
    }
    cells
}

/// Whether an offset lies on the outer ring of a diamond body.
pub fn is_boundary_offset(d_row: i32, d_col: i32, radius: u32) -> bool {
    radius > 0 && d_row.abs() + d_col.abs() == radius as i32 - 1
}
