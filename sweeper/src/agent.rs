use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::prelude::IndexedRandom;
use tracing::{debug, instrument};

use crate::error::AgentError;
use crate::grid::{Bounds, Point};
use crate::knowledge::{KnowledgeBase, Rationale};

/// A player that only commits to moves it can prove safe, and guesses
/// uniformly among the remaining cells otherwise.
#[derive(Debug, Clone)]
pub struct Agent {
    bounds: Bounds,
    /// Cells already played or flagged. Only ever grows.
    moves_made: HashSet<Point>,
    knowledge: KnowledgeBase,
    /// Why each known cell is known. Never consulted when deducing.
    rationales: HashMap<Point, Rationale>,
}

impl Agent {
    pub fn new(height: usize, width: usize) -> Self {
        Self::with_bounds(Bounds::new(height, width))
    }

    pub fn with_bounds(bounds: Bounds) -> Self {
        Agent {
            bounds,
            moves_made: HashSet::new(),
            knowledge: KnowledgeBase::new(),
            rationales: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn moves_made(&self) -> &HashSet<Point> {
        &self.moves_made
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn rationale(&self, cell: Point) -> Option<Rationale> {
        self.rationales.get(&cell).copied()
    }

    pub fn rationales(&self) -> &HashMap<Point, Rationale> {
        &self.rationales
    }

    /// Feeds back the result of playing `cell`: it was safe and has `count`
    /// mines around it.
    ///
    /// Playing the same cell twice is a caller bug and leaves the agent
    /// untouched. A contradiction leaves the agent in an unusable state; the
    /// session should be abandoned.
    #[instrument(level = "debug", skip(self))]
    pub fn record_observation(&mut self, cell: Point, count: usize) -> Result<(), AgentError> {
        if !self.bounds.contains(cell) {
            return Err(AgentError::OutOfBounds(cell));
        }
        if self.moves_made.contains(&cell) {
            return Err(AgentError::DuplicateMove(cell));
        }

        self.moves_made.insert(cell);
        self.rationales.insert(cell, Rationale::Played);

        let learned = self.knowledge.observe(cell, count, self.bounds)?;
        debug!(learned = learned.len(), "observation processed");
        for deduction in learned {
            self.rationales
                .entry(deduction.cell)
                .or_insert(deduction.rationale);
        }
        Ok(())
    }

    /// Records that the known mine `cell` has been flagged, so it is not
    /// offered again.
    pub fn record_flag(&mut self, cell: Point) -> Result<(), AgentError> {
        if self.moves_made.contains(&cell) {
            return Err(AgentError::DuplicateMove(cell));
        }
        if !self.knowledge.mines().contains(&cell) {
            return Err(AgentError::NotAMine(cell));
        }
        self.moves_made.insert(cell);
        Ok(())
    }

    /// A cell proven safe that has not been played yet.
    pub fn next_safe_move(&self) -> Option<Point> {
        self.knowledge
            .safes()
            .iter()
            .find(|cell| !self.moves_made.contains(*cell))
            .copied()
    }

    /// A cell proven to be a mine that has not been flagged yet. Never to be
    /// played.
    pub fn next_mine_flagging_move(&self) -> Option<Point> {
        self.knowledge
            .mines()
            .iter()
            .find(|cell| !self.moves_made.contains(*cell))
            .copied()
    }

    /// A uniformly chosen cell that has not been played and is not a known
    /// mine, or `None` when every such cell is exhausted.
    pub fn next_random_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Point> {
        let candidates: Vec<Point> = self
            .bounds
            .points()
            .filter(|cell| {
                !self.moves_made.contains(cell) && !self.knowledge.mines().contains(cell)
            })
            .collect();
        candidates.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fresh_agent_has_no_safe_move() {
        let agent = Agent::new(4, 4);
        assert_eq!(agent.next_safe_move(), None);
        assert_eq!(agent.next_mine_flagging_move(), None);
    }

    #[test]
    fn test_zero_observation_offers_neighbors() {
        let mut agent = Agent::new(3, 3);
        agent.record_observation(Point::new(0, 0), 0).unwrap();

        let next = agent.next_safe_move().unwrap();
        assert!(
            [Point::new(1, 0), Point::new(0, 1), Point::new(1, 1)].contains(&next),
            "{next} is not next to the origin"
        );
        assert_eq!(agent.rationale(Point::new(0, 0)), Some(Rationale::Played));
        assert_eq!(
            agent.rationale(Point::new(1, 1)),
            Some(Rationale::ZeroNeighborhood {
                source: Point::new(0, 0)
            })
        );
    }

    #[test]
    fn test_out_of_bounds_observation() {
        let mut agent = Agent::new(2, 2);
        let err = agent.record_observation(Point::new(2, 0), 0).unwrap_err();
        assert_eq!(err, AgentError::OutOfBounds(Point::new(2, 0)));
        assert!(agent.moves_made().is_empty());
    }

    #[test]
    fn test_flagging_known_mine() {
        let mut agent = Agent::new(1, 2);
        agent.record_observation(Point::new(0, 0), 1).unwrap();

        let mine = agent.next_mine_flagging_move().unwrap();
        assert_eq!(mine, Point::new(1, 0));
        agent.record_flag(mine).unwrap();
        assert_eq!(agent.next_mine_flagging_move(), None);
        assert_eq!(
            agent.record_flag(mine),
            Err(AgentError::DuplicateMove(mine))
        );
    }

    #[test]
    fn test_flagging_unknown_cell_is_rejected() {
        let mut agent = Agent::new(3, 3);
        assert_eq!(
            agent.record_flag(Point::new(1, 1)),
            Err(AgentError::NotAMine(Point::new(1, 1)))
        );
    }

    #[test]
    fn test_random_move_avoids_played_and_mines() {
        let mut agent = Agent::new(1, 3);
        agent.record_observation(Point::new(0, 0), 1).unwrap();
        // {(1,0)} = 1: a mine. Only (2,0) remains.
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(agent.next_random_move(&mut rng), Some(Point::new(2, 0)));
        }
    }

    #[test]
    fn test_random_move_none_when_exhausted() {
        let mut agent = Agent::new(1, 2);
        agent.record_observation(Point::new(0, 0), 1).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(agent.next_random_move(&mut rng), None);
    }
}
