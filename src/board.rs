//! The 6×7 game board and the rules for placing pieces on it

use thiserror::Error;

use std::convert::TryFrom;
use std::fmt;

use crate::{HEIGHT, WIDTH};

/// Errors raised when building or modifying a [`Board`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid move, column {column} is full or out of range")]
    InvalidMove { column: usize },
    #[error("invalid cell value {value} at row {row}, column {column}")]
    InvalidCell { row: usize, column: usize, value: u8 },
    #[error("floating piece at row {row}, column {column}")]
    FloatingPiece { row: usize, column: usize },
    #[error("could not parse '{0}' as a valid move")]
    Parse(char),
}

/// One of the two players
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The opponent of this player
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// The numeric form used by callers, `1` or `2`
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(other),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Cell {
    Empty,
    Piece(Player),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The numeric form used by callers, `0`, `1` or `2`
    pub fn number(&self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Piece(player) => player.number(),
        }
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        Cell::Piece(player)
    }
}

/// A Connect 4 board
///
/// Cells are stored left-to-right, bottom-to-top, and can only be filled
/// through [`Board::apply_move`], which drops a piece to the lowest open row
/// of a column. This keeps every column free of floating pieces.
///
/// The board is `Copy`: every move produces a fresh board, so searches running
/// on different threads never share mutable state.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Board {
    cells: [Cell; WIDTH * HEIGHT],
    heights: [usize; WIDTH],
    num_moves: usize,
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; WIDTH * HEIGHT],
            heights: [0; WIDTH],
            num_moves: 0,
        }
    }

    /// Builds a board from a string of 1-indexed column digits
    ///
    /// Player one moves first and the players alternate. The game is not
    /// checked for a winner, so positions past the end of a game can be built.
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self, BoardError> {
        let mut board = Self::new();
        let mut player = Player::One;

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    board = board.apply_move(column - 1, player)?;
                    player = player.other();
                }
                _ => return Err(BoardError::Parse(column_char)),
            }
        }
        Ok(board)
    }

    /// Builds a board from a matrix of `0`, `1` and `2` values
    ///
    /// Row 0 is the top of the board and row `HEIGHT - 1` the bottom.
    pub fn from_rows(rows: &[[u8; WIDTH]; HEIGHT]) -> Result<Self, BoardError> {
        let mut board = Self::new();

        for column in 0..WIDTH {
            // walk each column from the bottom up, an empty cell ends the stack
            let mut stacked = true;
            for row in (0..HEIGHT).rev() {
                let value = rows[row][column];
                let cell = match value {
                    0 => Cell::Empty,
                    _ => Player::try_from(value)
                        .map(Cell::Piece)
                        .map_err(|value| BoardError::InvalidCell { row, column, value })?,
                };
                match cell {
                    Cell::Empty => stacked = false,
                    Cell::Piece(_) if !stacked => {
                        return Err(BoardError::FloatingPiece { row, column })
                    }
                    Cell::Piece(_) => {
                        board.cells[column + WIDTH * board.heights[column]] = cell;
                        board.heights[column] += 1;
                        board.num_moves += 1;
                    }
                }
            }
        }
        Ok(board)
    }

    /// The matrix form of the board, row 0 at the top
    pub fn to_rows(&self) -> [[u8; WIDTH]; HEIGHT] {
        let mut rows = [[0; WIDTH]; HEIGHT];
        for (row, values) in rows.iter_mut().enumerate() {
            for (column, value) in values.iter_mut().enumerate() {
                *value = self.cells[column + WIDTH * (HEIGHT - 1 - row)].number();
            }
        }
        rows
    }

    /// Reads a cell, with row 0 at the top of the board
    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        if row >= HEIGHT || column >= WIDTH {
            return None;
        }
        Some(self.cells[column + WIDTH * (HEIGHT - 1 - row)])
    }

    /// Reads a cell by its position in bottom-to-top storage order
    pub(crate) fn cell_at(&self, index: usize) -> Cell {
        self.cells[index]
    }

    pub fn is_legal(&self, column: usize) -> bool {
        column < WIDTH && self.heights[column] < HEIGHT
    }

    /// Returns a new board with `player`'s piece dropped into `column`
    pub fn apply_move(&self, column: usize, player: Player) -> Result<Self, BoardError> {
        if !self.is_legal(column) {
            return Err(BoardError::InvalidMove { column });
        }
        let mut next = *self;
        next.cells[column + WIDTH * next.heights[column]] = Cell::Piece(player);
        next.heights[column] += 1;
        next.num_moves += 1;
        Ok(next)
    }

    /// The legal columns in ascending order
    pub fn legal_moves(&self) -> Vec<usize> {
        (0..WIDTH).filter(|&column| self.is_legal(column)).collect()
    }

    pub fn heights(&self) -> [usize; WIDTH] {
        self.heights
    }

    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    pub fn is_full(&self) -> bool {
        self.num_moves == WIDTH * HEIGHT
    }

    /// The player whose turn it is, assuming player one moved first
    pub fn player_to_move(&self) -> Player {
        if self.num_moves % 2 == 0 {
            Player::One
        } else {
            Player::Two
        }
    }

    /// Key for the lookup table
    ///
    /// Returns the smaller of the board's prefix code and its mirror's, and
    /// whether the mirror was the smaller one.
    pub fn canonical_code(&self) -> (u128, bool) {
        let code = self.prefix_code(false);
        let mirror = self.prefix_code(true);
        if mirror < code {
            (mirror, true)
        } else {
            (code, false)
        }
    }

    // 0 terminates a column
    // 10 is a player one tile
    // 11 is a player two tile
    // a full board needs 7 + 2 * 42 = 91 bits
    fn prefix_code(&self, mirror: bool) -> u128 {
        let mut code = 0u128;

        for i in 0..WIDTH {
            let column = if mirror { WIDTH - 1 - i } else { i };
            for row in 0..self.heights[column] {
                code = match self.cells[column + WIDTH * row] {
                    Cell::Piece(Player::One) => (code << 2) | 0b10,
                    _ => (code << 2) | 0b11,
                };
            }
            code <<= 1;
        }
        code
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..HEIGHT).rev() {
            for column in 0..WIDTH {
                let symbol = match self.cells[column + WIDTH * row] {
                    Cell::Empty => '.',
                    Cell::Piece(Player::One) => 'X',
                    Cell::Piece(Player::Two) => 'O',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        let footer: String = (0..WIDTH).map(|x| x.to_string()).collect();
        write!(f, "{}", footer)
    }
}

pub fn is_legal(board: &Board, column: usize) -> bool {
    board.is_legal(column)
}

pub fn apply_move(board: &Board, column: usize, player: Player) -> Result<Board, BoardError> {
    board.apply_move(column, player)
}
