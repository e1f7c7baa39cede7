//! Exhaustive cross-check of the agent's deductions with a SAT solver.
//!
//! The agent's subset reasoning is deliberately weaker than full constraint
//! solving, so the oracle is never used to pick moves. It answers three
//! questions about a position: can the agent's statements all hold at once,
//! is every fact the agent holds forced by the visible board, and which
//! forced facts did the agent miss.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, instrument, warn};
use varisat::{CnfFormula, ExtendFormula, Lit, Solver, Var};

use crate::agent::Agent;
use crate::error::OracleError;
use crate::game::{Cell, Game};
use crate::grid::Point;
use crate::knowledge::KnowledgeBase;

/// Exactly `mines` of `cells` are mines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub cells: Vec<Point>,
    pub mines: usize,
}

/// The possible outcomes of the analysis for a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeducedState {
    ForcedMine,   // All valid layouts require this cell to be a mine.
    ForcedSafe,   // All valid layouts require this cell to be safe.
    Undetermined, // Valid layouts exist for this cell being either.
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub deductions: HashMap<Point, DeducedState>,
}

/// Outcome of auditing an agent against the visible board.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Audit {
    /// Unplayed cells whose agent-held status the oracle confirmed.
    pub confirmed: usize,
    /// Cells the oracle can decide that the agent has not.
    pub missed: Vec<Point>,
}

/// One constraint per revealed cell over its hidden or flagged neighbours.
/// Reads only what a player can see.
pub fn board_constraints(game: &Game) -> Vec<Constraint> {
    let bounds = game.bounds();
    bounds
        .points()
        .filter_map(|point| match game.cell(point) {
            Some(Cell::Revealed(number)) => {
                let cells: Vec<Point> = bounds
                    .neighbors(point)
                    .filter(|&n| !matches!(game.cell(n), Some(Cell::Revealed(_))))
                    .collect();
                (!cells.is_empty()).then_some(Constraint {
                    cells,
                    mines: number as usize,
                })
            }
            _ => None,
        })
        .collect()
}

/// The knowledge base's active statements as constraints.
pub fn knowledge_constraints(knowledge: &KnowledgeBase) -> Vec<Constraint> {
    knowledge
        .statements()
        .iter()
        .map(|statement| Constraint {
            cells: statement.cells().iter().copied().collect(),
            mines: statement.count(),
        })
        .collect()
}

/// Classifies every constrained cell as forced mine, forced safe or
/// undetermined.
pub fn analyze(constraints: &[Constraint]) -> Result<Analysis, OracleError> {
    let mut solver = Solver::new();
    let mut var_map: HashMap<Point, Var> = HashMap::new();

    for constraint in constraints {
        for &point in &constraint.cells {
            var_map.entry(point).or_insert_with(|| solver.new_var());
        }
    }

    let mut formula = CnfFormula::new();
    for constraint in constraints {
        let lits: Vec<Lit> = constraint
            .cells
            .iter()
            .filter_map(|p| var_map.get(p).map(|&v| Lit::from_var(v, true)))
            .collect();
        encode_exactly(&mut formula, &lits, constraint.mines);
    }
    solver.add_formula(&formula);

    if !solve(&mut solver, &[])? {
        return Err(OracleError::Unsatisfiable);
    }

    let mut deductions = HashMap::new();
    for (&point, &var) in &var_map {
        let mine_possible = solve(&mut solver, &[Lit::from_var(var, true)])?;
        let safe_possible = solve(&mut solver, &[Lit::from_var(var, false)])?;

        let state = match (mine_possible, safe_possible) {
            (true, true) => DeducedState::Undetermined,
            (true, false) => DeducedState::ForcedMine,
            (false, true) => DeducedState::ForcedSafe,
            (false, false) => return Err(OracleError::Unsatisfiable),
        };
        deductions.insert(point, state);
    }

    Ok(Analysis { deductions })
}

/// Fails with [`OracleError::Unsatisfiable`] when no mine layout satisfies
/// every active statement at once, a state pairwise deduction cannot spot.
pub fn check_knowledge(knowledge: &KnowledgeBase) -> Result<Analysis, OracleError> {
    analyze(&knowledge_constraints(knowledge)).inspect_err(|_| {
        warn!(statements = knowledge.statements().len(), "knowledge base is inconsistent");
    })
}

/// Checks that the agent's statements are jointly satisfiable, then checks
/// every unplayed cell the agent claims to know against the visible board
/// of `game`.
#[instrument(level = "debug", skip_all)]
pub fn audit(agent: &Agent, game: &Game) -> Result<Audit, OracleError> {
    let knowledge = agent.knowledge();
    check_knowledge(knowledge)?;
    let analysis = analyze(&board_constraints(game))?;

    let mut confirmed = 0;
    for (cells, expected) in [
        (knowledge.safes(), DeducedState::ForcedSafe),
        (knowledge.mines(), DeducedState::ForcedMine),
    ] {
        for &cell in cells {
            if matches!(game.cell(cell), Some(Cell::Revealed(_))) {
                continue;
            }
            if analysis.deductions.get(&cell) != Some(&expected) {
                warn!(%cell, ?expected, "agent holds an unforced fact");
                return Err(OracleError::Unsound(cell));
            }
            confirmed += 1;
        }
    }

    let missed: Vec<Point> = analysis
        .deductions
        .iter()
        .filter(|&(&cell, &state)| state != DeducedState::Undetermined && !knowledge.is_known(cell))
        .map(|(&cell, _)| cell)
        .sorted()
        .collect();
    debug!(confirmed, missed = missed.len(), "audit finished");

    Ok(Audit { confirmed, missed })
}

fn solve(solver: &mut Solver, assumptions: &[Lit]) -> Result<bool, OracleError> {
    solver.assume(assumptions);
    let result = solver
        .solve()
        .map_err(|e| OracleError::Solver(e.to_string()));
    solver.assume(&[]);
    result
}

/// Encodes "exactly k of `lits` are true". Constraints here never span more
/// than a cell's neighbourhood, so the direct binomial encoding is used.
fn encode_exactly(formula: &mut CnfFormula, lits: &[Lit], k: usize) {
    if k > lits.len() {
        formula.add_clause(&[]);
        return;
    }
    // At most k: any k + 1 of them contain a false one.
    if k < lits.len() {
        for combo in lits.iter().copied().combinations(k + 1) {
            let clause: Vec<Lit> = combo.iter().map(|&lit| !lit).collect();
            formula.add_clause(&clause);
        }
    }
    // At least k: any n - k + 1 of them contain a true one.
    if k > 0 {
        for combo in lits.iter().copied().combinations(lits.len() - k + 1) {
            formula.add_clause(&combo);
        }
    }
}
