//! Error types for the agent, the environment and the oracle.

use derive_more::{Display, Error, From};

use crate::grid::Point;

/// The flavour of logical impossibility that was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ContradictionKind {
    #[display("mine count below zero")]
    NegativeCount,
    #[display("empty cell set required to hold mines")]
    EmptyWithMines,
    #[display("more mines than cells")]
    CountExceedsCells,
    #[display("cell known to be both safe and a mine")]
    SafeAndMine,
    /// A statement still lists a cell whose status is already known.
    #[display("statement holds a cell of known status")]
    StaleCell,
}

/// A logically impossible knowledge base state.
///
/// Carries the offending statement (its cells and the signed count that
/// broke it) so the deduction that produced it can be traced.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("contradiction ({kind}): {cells:?} = {count}")]
pub struct Contradiction {
    pub kind: ContradictionKind,
    pub cells: Vec<Point>,
    pub count: i64,
}

impl Contradiction {
    pub fn new(kind: ContradictionKind, cells: impl IntoIterator<Item = Point>, count: i64) -> Self {
        let mut cells: Vec<Point> = cells.into_iter().collect();
        cells.sort();
        Contradiction { kind, cells, count }
    }
}

/// Failures surfaced by [`crate::Agent`].
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, From)]
pub enum AgentError {
    /// The caller observed a cell twice.
    #[display("move already made at {_0}")]
    DuplicateMove(#[error(not(source))] Point),
    #[display("{_0} is outside the board")]
    OutOfBounds(#[error(not(source))] Point),
    /// A flag was requested for a cell the agent has not proven to be a mine.
    #[display("{_0} is not a known mine")]
    NotAMine(#[error(not(source))] Point),
    #[display("invalid state: {_0}")]
    #[from]
    InvalidState(Contradiction),
}

/// Failures of the board environment.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameError {
    #[display("{mines} mines do not fit on a board of {area} cells")]
    TooManyMines { mines: usize, area: usize },
    #[display("{_0} is outside the board")]
    OutOfBounds(#[error(not(source))] Point),
    #[display("game already ended")]
    Ended,
}

/// Failures of the SAT audit.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum OracleError {
    /// No mine layout satisfies the knowledge base.
    #[display("knowledge base is unsatisfiable")]
    Unsatisfiable,
    #[display("solver failed: {_0}")]
    Solver(#[error(not(source))] String),
    /// The agent holds a fact that some consistent layout violates.
    #[display("unsound deduction at {_0}")]
    Unsound(#[error(not(source))] Point),
}
