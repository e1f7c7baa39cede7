//! The knowledge base: statements about unknown cells plus the cells already
//! proven safe or proven to be mines.
//!
//! New facts only ever reach existing statements through [`KnowledgeBase::mark_safe`]
//! and [`KnowledgeBase::mark_mine`], so every statement keeps describing cells of
//! unknown status only.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, instrument, trace, warn};

use crate::error::{Contradiction, ContradictionKind};
use crate::grid::{Bounds, Point};
use crate::statement::Statement;

/// What was learned about a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Fact {
    Safe,
    Mine,
}

/// Why a cell's status is known. Kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Rationale {
    /// The cell was played and survived.
    Played,
    /// Neighbour of a cell observed with no adjacent mines.
    ZeroNeighborhood { source: Point },
    /// Difference of two statements, one contained in the other.
    SubsetDifference { source: Point },
    /// A statement whose count left no freedom (all mines or all safe).
    Exhausted { source: Point },
}

/// A fact learned while processing an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Deduction {
    pub cell: Point,
    pub fact: Fact,
    pub rationale: Rationale,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    safes: HashSet<Point>,
    mines: HashSet<Point>,
    statements: Vec<Statement>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn safes(&self) -> &HashSet<Point> {
        &self.safes
    }

    pub fn mines(&self) -> &HashSet<Point> {
        &self.mines
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_known(&self, cell: Point) -> bool {
        self.safes.contains(&cell) || self.mines.contains(&cell)
    }

    /// Records `cell` as a mine and removes it from every statement.
    ///
    /// Returns whether the cell was newly learned. Nothing is changed when the
    /// mark would contradict what is already known.
    pub fn mark_mine(&mut self, cell: Point) -> Result<bool, Contradiction> {
        if self.safes.contains(&cell) {
            return Err(Contradiction::new(ContradictionKind::SafeAndMine, [cell], 1));
        }
        if let Some(statement) = self
            .statements
            .iter()
            .find(|s| s.contains(cell) && s.count() == 0)
        {
            return Err(statement.contradiction(ContradictionKind::NegativeCount, -1));
        }
        if !self.mines.insert(cell) {
            return Ok(false);
        }
        for statement in &mut self.statements {
            statement.mark_mine(cell);
        }
        Ok(true)
    }

    /// Records `cell` as safe and removes it from every statement.
    pub fn mark_safe(&mut self, cell: Point) -> Result<bool, Contradiction> {
        if self.mines.contains(&cell) {
            return Err(Contradiction::new(ContradictionKind::SafeAndMine, [cell], 0));
        }
        if let Some(statement) = self
            .statements
            .iter()
            .find(|s| s.contains(cell) && s.count() == s.cells().len())
        {
            return Err(statement.contradiction(
                ContradictionKind::CountExceedsCells,
                statement.count() as i64,
            ));
        }
        if !self.safes.insert(cell) {
            return Ok(false);
        }
        for statement in &mut self.statements {
            statement.mark_safe(cell);
        }
        Ok(true)
    }

    /// Takes in that `cell` was played safely and has `count` adjacent mines.
    ///
    /// The new statement is compared once against every statement that was
    /// already present; statements derived here are only compared during
    /// later observations.
    #[instrument(level = "debug", skip(self, bounds))]
    pub fn observe(
        &mut self,
        cell: Point,
        count: usize,
        bounds: Bounds,
    ) -> Result<Vec<Deduction>, Contradiction> {
        let mut learned = Vec::new();

        // Removes the cell from every older statement whose neighbourhood
        // overlapped this one.
        self.mark_safe(cell)?;

        let mut residual = BTreeSet::new();
        let mut remaining = count as i64;
        for neighbor in bounds.neighbors(cell) {
            if self.safes.contains(&neighbor) {
                continue;
            }
            if self.mines.contains(&neighbor) {
                remaining -= 1;
                continue;
            }
            residual.insert(neighbor);
        }

        if remaining < 0 {
            warn!(%cell, count, remaining, "observation below known mine count");
            return Err(Contradiction::new(
                ContradictionKind::NegativeCount,
                residual,
                remaining,
            ));
        }
        if residual.is_empty() {
            if remaining > 0 {
                warn!(%cell, count, remaining, "observation has mines but no unknown neighbours");
                return Err(Contradiction::new(
                    ContradictionKind::EmptyWithMines,
                    residual,
                    remaining,
                ));
            }
            self.resolve(cell, None, &mut learned)?;
            return Ok(learned);
        }

        let fresh = Statement::new(residual, remaining as usize)?;
        let existing = self.statements.len();
        let zero_index = if self.statements.contains(&fresh) {
            trace!(%fresh, "statement already known");
            None
        } else {
            debug!(%fresh, "new statement");
            self.statements.push(fresh.clone());
            (fresh.count() == 0).then_some(existing)
        };

        let mut safe_marks = BTreeSet::new();
        let mut mine_marks = BTreeSet::new();
        let mut derived = Vec::new();

        for statement in &self.statements[..existing] {
            if statement.count() == 0 {
                continue;
            }
            let (rest, difference) = if fresh.is_subset(statement) {
                (
                    statement.cells() - fresh.cells(),
                    statement.count() as i64 - fresh.count() as i64,
                )
            } else if statement.is_subset(&fresh) {
                (
                    fresh.cells() - statement.cells(),
                    fresh.count() as i64 - statement.count() as i64,
                )
            } else {
                continue;
            };
            trace!(%statement, %fresh, difference, "subset relation");

            match difference {
                0 => safe_marks.extend(rest),
                1 if rest.len() == 1 => mine_marks.extend(rest),
                _ => derived.push((rest, difference)),
            }
        }

        for safe in safe_marks {
            if self.mark_safe(safe)? {
                debug!(cell = %safe, "safe by subset difference");
                learned.push(Deduction {
                    cell: safe,
                    fact: Fact::Safe,
                    rationale: Rationale::SubsetDifference { source: cell },
                });
            }
        }
        for mine in mine_marks {
            if self.mark_mine(mine)? {
                debug!(cell = %mine, "mine by subset difference");
                learned.push(Deduction {
                    cell: mine,
                    fact: Fact::Mine,
                    rationale: Rationale::SubsetDifference { source: cell },
                });
            }
        }
        for (cells, count) in derived {
            self.insert_derived(cells, count)?;
        }

        self.resolve(cell, zero_index, &mut learned)?;
        Ok(learned)
    }

    /// Adds a derived statement after stripping cells whose status became
    /// known, unless an identical one already exists.
    fn insert_derived(&mut self, cells: BTreeSet<Point>, count: i64) -> Result<(), Contradiction> {
        let mut remaining = count;
        let mut unknown = BTreeSet::new();
        for cell in cells {
            if self.mines.contains(&cell) {
                remaining -= 1;
            } else if !self.safes.contains(&cell) {
                unknown.insert(cell);
            }
        }
        if remaining < 0 {
            return Err(Contradiction::new(
                ContradictionKind::NegativeCount,
                unknown,
                remaining,
            ));
        }
        let statement = Statement::new(unknown, remaining as usize)?;
        if statement.is_empty() || self.statements.contains(&statement) {
            return Ok(());
        }
        debug!(%statement, "derived statement");
        self.statements.push(statement);
        Ok(())
    }

    /// Marks the cells of every statement that leaves no freedom, until no
    /// single statement yields anything new, then drops emptied statements.
    fn resolve(
        &mut self,
        source: Point,
        zero_index: Option<usize>,
        learned: &mut Vec<Deduction>,
    ) -> Result<(), Contradiction> {
        loop {
            let mut pending = Vec::new();
            for (index, statement) in self.statements.iter().enumerate() {
                let rationale = if zero_index == Some(index) {
                    Rationale::ZeroNeighborhood { source }
                } else {
                    Rationale::Exhausted { source }
                };
                pending.extend(
                    statement
                        .known_safes()
                        .into_iter()
                        .map(|cell| (cell, Fact::Safe, rationale)),
                );
                pending.extend(
                    statement
                        .known_mines()
                        .into_iter()
                        .map(|cell| (cell, Fact::Mine, rationale)),
                );
            }
            if pending.is_empty() {
                break;
            }

            for (cell, fact, rationale) in pending {
                let fresh = match fact {
                    Fact::Safe => self.mark_safe(cell)?,
                    Fact::Mine => self.mark_mine(cell)?,
                };
                if fresh {
                    debug!(%cell, ?fact, ?rationale, "resolved");
                    learned.push(Deduction {
                        cell,
                        fact,
                        rationale,
                    });
                }
            }
        }

        // Both marks refuse to leave a count above the cell count, so an
        // emptied statement always has count 0.
        self.statements.retain(|s| !s.is_empty());
        Ok(())
    }

    /// Verifies the structural invariants: no cell is both safe and a mine,
    /// and statements only hold cells of unknown status with a feasible count.
    pub fn check_invariants(&self) -> Result<(), Contradiction> {
        if let Some(&cell) = self.safes.intersection(&self.mines).next() {
            return Err(Contradiction::new(ContradictionKind::SafeAndMine, [cell], 0));
        }
        for statement in &self.statements {
            if statement.count() > statement.cells().len() {
                let kind = if statement.is_empty() {
                    ContradictionKind::EmptyWithMines
                } else {
                    ContradictionKind::CountExceedsCells
                };
                return Err(statement.contradiction(kind, statement.count() as i64));
            }
            if statement.cells().iter().any(|&c| self.is_known(c)) {
                return Err(statement.contradiction(
                    ContradictionKind::StaleCell,
                    statement.count() as i64,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: usize, y: usize) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_mark_safe_is_idempotent() {
        let mut kb = KnowledgeBase::new();
        kb.statements.push(Statement::new([p(0, 0), p(1, 0)], 1).unwrap());

        assert!(kb.mark_safe(p(0, 0)).unwrap());
        let statements = kb.statements.clone();
        assert!(!kb.mark_safe(p(0, 0)).unwrap());

        assert_eq!(kb.statements, statements);
        assert_eq!(kb.safes.len(), 1);
    }

    #[test]
    fn test_mark_mine_is_idempotent() {
        let mut kb = KnowledgeBase::new();
        kb.statements.push(Statement::new([p(0, 0), p(1, 0)], 1).unwrap());

        assert!(kb.mark_mine(p(1, 0)).unwrap());
        assert!(!kb.mark_mine(p(1, 0)).unwrap());

        assert_eq!(kb.statements[0], Statement::new([p(0, 0)], 0).unwrap());
        assert_eq!(kb.mines.len(), 1);
    }

    #[test]
    fn test_mark_mine_on_safe_cell_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        kb.mark_safe(p(0, 0)).unwrap();
        let err = kb.mark_mine(p(0, 0)).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::SafeAndMine);
        assert!(kb.mines.is_empty());
    }

    #[test]
    fn test_mark_mine_in_zero_statement_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        kb.statements.push(Statement::new([p(0, 0), p(1, 0)], 0).unwrap());
        let err = kb.mark_mine(p(0, 0)).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::NegativeCount);
        assert_eq!(err.cells, vec![p(0, 0), p(1, 0)]);
        // Untouched.
        assert!(kb.mines.is_empty());
        assert_eq!(kb.statements[0].cells().len(), 2);
    }

    #[test]
    fn test_zero_observation_marks_neighbors_safe() {
        let mut kb = KnowledgeBase::new();
        let learned = kb.observe(p(1, 1), 0, Bounds::new(3, 3)).unwrap();

        assert_eq!(kb.safes.len(), 9);
        assert!(kb.statements.is_empty());
        assert_eq!(learned.len(), 8);
        assert!(learned.iter().all(|d| d.fact == Fact::Safe
            && d.rationale == Rationale::ZeroNeighborhood { source: p(1, 1) }));
    }

    #[test]
    fn test_residual_drops_known_cells() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(3, 3);
        kb.mark_mine(p(0, 0)).unwrap();
        kb.mark_safe(p(1, 0)).unwrap();

        // Corner (0,1) touches (0,0), (1,0), (1,1), (0,2), (1,2).
        kb.observe(p(0, 1), 2, bounds).unwrap();

        assert_eq!(
            kb.statements,
            vec![Statement::new([p(1, 1), p(0, 2), p(1, 2)], 1).unwrap()]
        );
    }

    #[test]
    fn test_negative_residual_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        kb.mark_mine(p(0, 0)).unwrap();
        kb.mark_mine(p(1, 0)).unwrap();

        let err = kb.observe(p(0, 1), 1, Bounds::new(3, 3)).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::NegativeCount);
        assert_eq!(err.count, -1);
    }

    #[test]
    fn test_empty_residual_with_mines_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 2);
        kb.mark_safe(p(1, 0)).unwrap();

        let err = kb.observe(p(0, 0), 1, bounds).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::EmptyWithMines);
        assert!(err.cells.is_empty());
    }

    #[test]
    fn test_fully_explained_observation_adds_nothing() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 3);
        kb.mark_mine(p(0, 0)).unwrap();
        kb.mark_safe(p(2, 0)).unwrap();

        let learned = kb.observe(p(1, 0), 1, bounds).unwrap();
        assert!(learned.is_empty());
        assert!(kb.statements.is_empty());
    }

    #[test]
    fn test_observation_removes_cell_from_older_statements() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 3);

        kb.observe(p(1, 0), 1, bounds).unwrap();
        assert_eq!(
            kb.statements,
            vec![Statement::new([p(0, 0), p(2, 0)], 1).unwrap()]
        );

        // Playing (0,0) leaves {(2,0)} = 1 behind, which resolves to a mine.
        let learned = kb.observe(p(0, 0), 0, bounds).unwrap();
        assert!(kb.mines.contains(&p(2, 0)));
        assert!(kb.statements.is_empty());
        assert_eq!(
            learned,
            vec![Deduction {
                cell: p(2, 0),
                fact: Fact::Mine,
                rationale: Rationale::Exhausted { source: p(0, 0) },
            }]
        );
        kb.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_statement_is_not_appended() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(3, 5);
        kb.statements.push(Statement::new([p(1, 0), p(2, 0), p(3, 0)], 1).unwrap());

        for cell in [p(1, 1), p(3, 1), p(1, 2), p(2, 2), p(3, 2)] {
            kb.mark_safe(cell).unwrap();
        }
        kb.observe(p(2, 1), 1, bounds).unwrap();
        assert_eq!(kb.statements.len(), 1);
    }

    #[test]
    fn test_derived_statement_is_deferred() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 7);

        kb.statements.push(
            Statement::new([p(0, 0), p(1, 0), p(2, 0), p(4, 0), p(5, 0)], 3).unwrap(),
        );

        // (3,0) sees (2,0) and (4,0): {(2,0),(4,0)} = 1, a subset.
        kb.observe(p(3, 0), 1, bounds).unwrap();

        // Difference {(0,0),(1,0),(5,0)} = 2 is appended, not resolved.
        assert!(kb
            .statements
            .contains(&Statement::new([p(0, 0), p(1, 0), p(5, 0)], 2).unwrap()));
        assert!(kb.mines.is_empty());
        kb.check_invariants().unwrap();
    }

    #[test]
    fn test_superset_observation_derives_from_older_statement() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 5);

        kb.statements.push(Statement::new([p(3, 0)], 1).unwrap());

        // (2,0) sees (1,0) and (3,0): {(1,0),(3,0)} = 1 contains {(3,0)} = 1.
        let learned = kb.observe(p(2, 0), 1, bounds).unwrap();
        assert!(kb.safes.contains(&p(1, 0)));
        assert!(kb.mines.contains(&p(3, 0)));
        assert!(learned.iter().any(|d| d.cell == p(1, 0)
            && d.rationale == Rationale::SubsetDifference { source: p(2, 0) }));
        kb.check_invariants().unwrap();
    }

    #[test]
    fn test_subset_with_more_mines_than_superset_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(2, 3);
        kb.statements.push(Statement::new([p(0, 0), p(1, 0), p(2, 0)], 1).unwrap());
        kb.mark_safe(p(1, 1)).unwrap();

        // (0,1) sees {(0,0),(1,0)} = 2 inside a statement holding only one mine.
        let err = kb.observe(p(0, 1), 2, bounds).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::NegativeCount);
        assert_eq!(err.cells, vec![p(2, 0)]);
        assert_eq!(err.count, -1);
    }

    #[test]
    fn test_equal_cells_with_different_counts_is_contradiction() {
        let mut kb = KnowledgeBase::new();
        let bounds = Bounds::new(1, 3);
        kb.statements.push(Statement::new([p(0, 0), p(2, 0)], 2).unwrap());

        let err = kb.observe(p(1, 0), 1, bounds).unwrap_err();
        assert_eq!(err.kind, ContradictionKind::EmptyWithMines);
        assert!(err.cells.is_empty());
        assert_eq!(err.count, 1);
    }

    #[test]
    fn test_statement_with_known_cell_is_stale() {
        let mut kb = KnowledgeBase::new();
        kb.statements.push(Statement::new([p(0, 0), p(1, 0)], 1).unwrap());
        kb.safes.insert(p(0, 0));

        let err = kb.check_invariants().unwrap_err();
        assert_eq!(err.kind, ContradictionKind::StaleCell);
        assert_eq!(err.cells, vec![p(0, 0), p(1, 0)]);
    }

    #[test]
    fn test_empty_statement_with_mines_breaks_invariants() {
        let mut kb = KnowledgeBase::new();
        let mut statement = Statement::new([p(0, 0)], 1).unwrap();
        statement.mark_safe(p(0, 0));
        kb.statements.push(statement);

        let err = kb.check_invariants().unwrap_err();
        assert_eq!(err.kind, ContradictionKind::EmptyWithMines);
        assert_eq!(err.count, 1);
    }
}
