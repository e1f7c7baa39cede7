use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use rand::seq::IteratorRandom;

use crate::error::GameError;
use crate::grid::{Bounds, Point};

/// The visible state of a single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Cell {
    Hidden,
    Flagged,
    Revealed(u8), // The u8 is the number of adjacent mines.
}

/// Represents the current state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameState {
    Playing,
    Won,
    Lost,
}

/// What the player learns by revealing a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    Mine,
    Safe(u8),
}

/// The board the agent plays against. Owns the true mine layout, which the
/// agent never sees.
#[derive(Debug, Clone)]
pub struct Game {
    bounds: Bounds,
    board: Vec<Vec<Cell>>,
    mines: HashSet<Point>,
    /// Flags placed on actual mines.
    mines_found: HashSet<Point>,
    state: GameState,
}

impl Game {
    /// Places `mines` mines uniformly at random.
    pub fn new<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let bounds = Bounds::new(height, width);
        if mines >= bounds.area() {
            return Err(GameError::TooManyMines {
                mines,
                area: bounds.area(),
            });
        }
        let layout = bounds.points().choose_multiple(rng, mines);
        Self::from_mines(bounds, layout)
    }

    /// Builds a board with a fixed mine layout.
    pub fn from_mines(
        bounds: Bounds,
        mines: impl IntoIterator<Item = Point>,
    ) -> Result<Self, GameError> {
        let mines: HashSet<Point> = mines.into_iter().collect();
        if let Some(&outside) = mines.iter().find(|&&p| !bounds.contains(p)) {
            return Err(GameError::OutOfBounds(outside));
        }
        Ok(Game {
            bounds,
            board: vec![vec![Cell::Hidden; bounds.width]; bounds.height],
            mines,
            mines_found: HashSet::new(),
            state: GameState::Playing,
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn total_mines(&self) -> usize {
        self.mines.len()
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn cell(&self, at: Point) -> Option<Cell> {
        self.board.get(at.y).and_then(|row| row.get(at.x)).copied()
    }

    pub fn is_mine(&self, at: Point) -> bool {
        self.mines.contains(&at)
    }

    /// Counts mines around a point, not including the point itself.
    pub fn adjacent_mine_count(&self, at: Point) -> u8 {
        self.bounds
            .neighbors(at)
            .filter(|neighbor| self.mines.contains(neighbor))
            .count() as u8
    }

    /// Reveals a cell. Revealing a mine loses the game.
    pub fn reveal(&mut self, at: Point) -> Result<Reveal, GameError> {
        if !self.bounds.contains(at) {
            return Err(GameError::OutOfBounds(at));
        }
        if self.state != GameState::Playing {
            return Err(GameError::Ended);
        }

        if self.is_mine(at) {
            self.state = GameState::Lost;
            return Ok(Reveal::Mine);
        }

        let count = self.adjacent_mine_count(at);
        self.board[at.y][at.x] = Cell::Revealed(count);
        if self.won() {
            self.state = GameState::Won;
        }
        Ok(Reveal::Safe(count))
    }

    /// Places a flag. Flags only count towards winning when they sit on mines.
    pub fn flag(&mut self, at: Point) -> Result<(), GameError> {
        if !self.bounds.contains(at) {
            return Err(GameError::OutOfBounds(at));
        }
        if self.state != GameState::Playing {
            return Err(GameError::Ended);
        }
        if self.board[at.y][at.x] == Cell::Hidden {
            self.board[at.y][at.x] = Cell::Flagged;
        }
        if self.is_mine(at) {
            self.mines_found.insert(at);
        }
        if self.won() {
            self.state = GameState::Won;
        }
        Ok(())
    }

    /// The game is won once every mine is flagged, or once every safe cell has
    /// been revealed. A board without mines is only won by revealing it.
    pub fn won(&self) -> bool {
        if !self.mines.is_empty() && self.mines_found == self.mines {
            return true;
        }
        self.bounds
            .points()
            .filter(|p| !self.mines.contains(p))
            .all(|p| matches!(self.board[p.y][p.x], Cell::Revealed(_)))
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print header
        write!(f, "   ")?;
        for x in 0..self.bounds.width {
            write!(f, "{:^3}", x)?;
        }
        writeln!(f, "\n  +{}", "---".repeat(self.bounds.width))?;

        // Print rows
        for (y, row) in self.board.iter().enumerate() {
            write!(f, "{:^2}|", y)?;
            for (x, cell) in row.iter().enumerate() {
                let display = match cell {
                    Cell::Hidden if self.state == GameState::Lost && self.is_mine(Point { x, y }) => {
                        " * ".to_string()
                    }
                    Cell::Hidden => " ■ ".to_string(),
                    Cell::Flagged => " F ".to_string(),
                    Cell::Revealed(n) => format!(" {} ", n),
                };
                write!(f, "{}", display)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
