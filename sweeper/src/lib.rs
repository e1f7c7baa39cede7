//! A minesweeper player that moves by logical deduction.
//!
//! The [`Agent`] keeps a [`KnowledgeBase`] of statements of the form "exactly
//! N of these cells are mines", learns from every cell it plays, and only
//! guesses when nothing can be proven safe. [`Game`] is the board it plays
//! against and [`oracle`] cross-checks its deductions with a SAT solver.

pub mod agent;
pub mod error;
pub mod game;
pub mod grid;
pub mod knowledge;
pub mod oracle;
pub mod statement;

pub use agent::Agent;
pub use error::{AgentError, Contradiction, ContradictionKind, GameError, OracleError};
pub use game::{Cell, Game, GameState, Reveal};
pub use grid::{Bounds, Point};
pub use knowledge::{Deduction, Fact, KnowledgeBase, Rationale};
pub use statement::Statement;
