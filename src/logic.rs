use std::{fmt, str::FromStr};

use bevy_math::{USizeVec2, usizevec2};
use serde::{Deserialize, Serialize};

use crate::error::ParseSquareError;

pub const BOARD_SIZE: usize = 8;

/// Which participant owns a clock or a turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Local, Side::Remote];

    pub fn index(&self) -> usize {
        match self {
            Side::Local => 0,
            Side::Remote => 1,
        }
    }

}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// A board location as produced by the input layer. `x` is the column (file `a` is 0) and `y` is
/// the row counted from the top of the board, so row 0 is rank 8.
///
/// On the wire a square is its notation (`"e2"`), so nothing off the board can be deserialized.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    pos: USizeVec2,
}

impl Square {
    pub fn from_grid(column: usize, row: usize) -> Option<Self> {
        (column < BOARD_SIZE && row < BOARD_SIZE).then(|| Self {
            pos: usizevec2(column, row),
        })
    }

    /// Builds a square from chess notation parts, e.g. `('e', 2)`.
    pub fn from_file_rank(file: char, rank: usize) -> Option<Self> {
        let file = file.to_ascii_lowercase();
        if !('a'..='h').contains(&file) || !(1..=BOARD_SIZE).contains(&rank) {
            return None;
        }
        Self::from_grid(file as usize - 'a' as usize, BOARD_SIZE - rank)
    }

    pub fn file(&self) -> char {
        char::from(b'a' + self.pos.x as u8)
    }

    pub fn rank(&self) -> usize {
        BOARD_SIZE - self.pos.y
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ParseSquareError::BadLength(s.to_string()));
        };
        let rank = rank
            .to_digit(10)
            .ok_or_else(|| ParseSquareError::OutOfBoard(s.to_string()))?;
        Square::from_file_rank(file, rank as usize)
            .ok_or_else(|| ParseSquareError::OutOfBoard(s.to_string()))
    }
}

impl TryFrom<String> for Square {
    type Error = ParseSquareError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

/// One move, logged and then discarded. Local moves are an origin/destination pair; the opponent
/// side only ever produces opaque text since nothing here knows the rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MoveDescriptor {
    Local { origin: Square, destination: Square },
    Opaque(String),
}

impl MoveDescriptor {
    pub fn notation(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MoveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveDescriptor::Local {
                origin,
                destination,
            } => write!(f, "{origin}:{destination}"),
            MoveDescriptor::Opaque(text) => write!(f, "{text}"),
        }
    }
}
