use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Dense row-major 2D array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Field<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Field<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the backing storage matches the declared shape.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.rows * self.cols
    }

    pub fn index_of(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Flat index of a grid position, if it lies inside the field.
    pub fn index_at(&self, pos: Position) -> Option<usize> {
        pos.to_index(self.rows, self.cols)
            .map(|(r, c)| self.index_of(r, c))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(self.index_of(row, col))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row < self.rows && col < self.cols {
            let idx = self.index_of(row, col);
            self.data.get_mut(idx)
        } else {
            None
        }
    }

    pub fn at(&self, pos: Position) -> Option<&T> {
        self.index_at(pos).and_then(|idx| self.data.get(idx))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T> std::ops::Index<usize> for Field<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &T {
        &self.data[idx]
    }
}

impl<T> std::ops::IndexMut<usize> for Field<T> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_field_has_shape() {
        let f = Field::filled(3, 4, 1.5_f64);
        assert_eq!(f.rows(), 3);
        assert_eq!(f.cols(), 4);
        assert_eq!(f.len(), 12);
        assert!(f.is_consistent());
        assert!(f.iter().all(|&v| v == 1.5));
    }

    #[test]
    fn row_major_indexing() {
        let mut f = Field::filled(2, 3, 0_u8);
        *f.get_mut(1, 2).unwrap() = 7;
        assert_eq!(f.index_of(1, 2), 5);
        assert_eq!(f[5], 7);
        assert_eq!(f.at(Position::new(1, 2)), Some(&7));
    }

    #[test]
    fn out_of_range_access_is_none() {
        let mut f = Field::filled(2, 2, 0_i32);
        assert!(f.get(2, 0).is_none());
        assert!(f.get_mut(0, 2).is_none());
        assert!(f.at(Position::new(-1, 0)).is_none());
    }
}
