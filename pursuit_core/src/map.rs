use std::ops::{Index, IndexMut};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({row}, {col}) are out of bounds for grid size ({height}, {width})")]
    OutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Provides methods for accessing and modifying elements via (row, col) coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    height: usize,
    width: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes `(row, col)` coordinates and returns the value for that cell.
    ///
    /// # Panics
    ///
    /// Panics if `height * width` overflows `usize`.
    pub fn from_generator<F>(height: usize, width: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = height.checked_mul(width).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for row in 0..height {
            for col in 0..width {
                cells.push(f(row, col));
            }
        }
        Grid {
            height,
            width,
            cells,
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Converts (row, col) coordinates to a flat vector index.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[inline]
    pub fn coords_to_index(&self, row: usize, col: usize) -> Option<usize> {
        if self.contains(row, col) {
            Some(row * self.width + col)
        } else {
            None
        }
    }

    /// Checks if the given coordinates are within the grid boundaries.
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width
    }

    /// Gets an immutable reference to the cell at the given position.
    ///
    /// Returns `None` if the position is out of bounds.
    pub fn get(&self, pos: Position) -> Option<&T> {
        let index = self.coords_to_index(pos.row, pos.col)?;
        self.cells.get(index)
    }

    /// Sets the value of the cell at the given position.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the position is outside the grid.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self
            .coords_to_index(pos.row, pos.col)
            .ok_or(GridError::OutOfBounds {
                row: pos.row,
                col: pos.col,
                height: self.height,
                width: self.width,
            })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::new(index / width, index % width), cell))
    }

    /// Returns an iterator over the rows of the grid, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // `chunks` rejects a zero chunk size; an empty grid has no rows anyway.
        self.cells.chunks(self.width.max(1))
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Position) -> &Self::Output {
        match self.coords_to_index(index.row, index.col) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                index.row, index.col, self.height, self.width
            ),
        }
    }
}

/// Indexing using Position coordinates for mutable access
impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, index: Position) -> &mut Self::Output {
        let (height, width) = (self.height, self.width);
        match self.coords_to_index(index.row, index.col) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                index.row, index.col, height, width
            ),
        }
    }
}
