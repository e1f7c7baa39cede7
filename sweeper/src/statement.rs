use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;

use crate::error::{Contradiction, ContradictionKind};
use crate::grid::Point;

/// A logical fact about the board: exactly `count` of `cells` are mines.
///
/// Cells are kept ordered so that two statements over the same cells compare
/// equal and print the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    cells: BTreeSet<Point>,
    count: usize,
}

impl Statement {
    /// Builds a statement, rejecting a count that exceeds the number of cells.
    pub fn new(
        cells: impl IntoIterator<Item = Point>,
        count: usize,
    ) -> Result<Self, Contradiction> {
        let cells: BTreeSet<Point> = cells.into_iter().collect();
        if count > cells.len() {
            let kind = if cells.is_empty() {
                ContradictionKind::EmptyWithMines
            } else {
                ContradictionKind::CountExceedsCells
            };
            return Err(Contradiction::new(kind, cells, count as i64));
        }
        Ok(Statement { cells, count })
    }

    pub fn cells(&self) -> &BTreeSet<Point> {
        &self.cells
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn contains(&self, cell: Point) -> bool {
        self.cells.contains(&cell)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every cell is a mine when there are exactly as many mines as cells.
    pub fn known_mines(&self) -> BTreeSet<Point> {
        if self.count > 0 && self.cells.len() == self.count {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Every cell is safe when the statement holds no mines.
    pub fn known_safes(&self) -> BTreeSet<Point> {
        if self.count == 0 {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Drops `cell` and one mine from the count. The caller must not ask a
    /// statement with a zero count to give up a mine.
    pub(crate) fn mark_mine(&mut self, cell: Point) -> bool {
        if self.cells.remove(&cell) {
            debug_assert!(self.count > 0, "mine removed from a zero-count statement");
            self.count -= 1;
            true
        } else {
            false
        }
    }

    /// Drops `cell`; the count is unchanged.
    pub(crate) fn mark_safe(&mut self, cell: Point) -> bool {
        self.cells.remove(&cell)
    }

    pub fn is_subset(&self, other: &Statement) -> bool {
        self.cells.is_subset(&other.cells)
    }

    pub(crate) fn contradiction(&self, kind: ContradictionKind, count: i64) -> Contradiction {
        Contradiction::new(kind, self.cells.iter().copied(), count)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}} = {}", self.cells.iter().join(", "), self.count)
    }
}
