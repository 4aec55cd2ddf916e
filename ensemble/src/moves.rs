//! Move notation shared by agents and the aggregator
//!
//! A [`Move`] is the opaque action the ensemble votes on. It only needs to be
//! comparable for equality and totally ordered; the order matches the
//! lexicographic order of the UCI string (`a1a2` < `a1b1` < `b1a1`), so
//! tie-breaks are reproducible from the serialized form alone.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for move and square parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveParseError {
    #[error("Invalid square: {0:?}")]
    InvalidSquare(String),

    #[error("Invalid promotion piece: {0:?}")]
    InvalidPromotion(char),

    #[error("Invalid move length {len} in {text:?} (expected 4 or 5 characters)")]
    InvalidLength { text: String, len: usize },

    #[error("Null move {0:?} has the same origin and destination")]
    NullMove(String),
}

/// A board square, indexed `rank * 8 + file` with a1 = 0 and h8 = 63
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square(u8);

impl Square {
    /// Build a square from zero-based file (a = 0) and rank (1 = 0)
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then(|| Self(rank * 8 + file))
    }

    /// Build a square from its 0..64 index
    pub fn from_index(index: u8) -> Option<Self> {
        (index < 64).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn file(self) -> u8 {
        self.0 % 8
    }

    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Offset this square by a file/rank delta, if it stays on the board
    pub fn offset(self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let file = self.file() as i8 + file_delta;
        let rank = self.rank() as i8 + rank_delta;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Self::new(file as u8, rank as u8)
        } else {
            None
        }
    }
}

impl Ord for Square {
    fn cmp(&self, other: &Self) -> Ordering {
        // File-major so the order follows the algebraic name ("a8" < "b1")
        (self.file(), self.rank()).cmp(&(other.file(), other.rank()))
    }
}

impl PartialOrd for Square {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{}{}", file, rank)
    }
}

impl FromStr for Square {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(MoveParseError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Self::new(file, rank).ok_or_else(|| MoveParseError::InvalidSquare(s.to_string()))
    }
}

/// Promotion piece
///
/// Variant order follows the UCI suffix letters (b < n < q < r).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Promotion {
    Bishop,
    Knight,
    Queen,
    Rook,
}

impl Promotion {
    /// UCI suffix letter
    pub fn as_char(self) -> char {
        match self {
            Self::Bishop => 'b',
            Self::Knight => 'n',
            Self::Queen => 'q',
            Self::Rook => 'r',
        }
    }

    pub fn from_char(c: char) -> Result<Self, MoveParseError> {
        match c.to_ascii_lowercase() {
            'b' => Ok(Self::Bishop),
            'n' => Ok(Self::Knight),
            'q' => Ok(Self::Queen),
            'r' => Ok(Self::Rook),
            other => Err(MoveParseError::InvalidPromotion(other)),
        }
    }
}

/// A candidate move: origin, destination and optional promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Promotion>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: Promotion) -> Self {
        self.promotion = Some(piece);
        self
    }

    /// Long algebraic (UCI) form, e.g. `e2e4` or `e7e8q`
    pub fn uci(&self) -> String {
        self.to_string()
    }

    /// Unit file/rank direction if the move travels along a rank, file or
    /// diagonal
    pub fn direction(&self) -> Option<(i8, i8)> {
        let df = self.to.file() as i8 - self.from.file() as i8;
        let dr = self.to.rank() as i8 - self.from.rank() as i8;
        let is_line = df == 0 || dr == 0 || df.abs() == dr.abs();
        (is_line && (df, dr) != (0, 0)).then(|| (df.signum(), dr.signum()))
    }

    /// First square entered when travelling from origin towards destination
    ///
    /// `None` for moves that are not along a line (knight jumps). For a
    /// one-square move this is the destination itself.
    pub fn first_step(&self) -> Option<Square> {
        let (df, dr) = self.direction()?;
        self.from.offset(df, dr)
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(MoveParseError::InvalidLength {
                text: text.to_string(),
                len: text.chars().count(),
            });
        }

        let from: Square = text[0..2].parse()?;
        let to: Square = text[2..4].parse()?;
        if from == to {
            return Err(MoveParseError::NullMove(text.to_string()));
        }

        let mut mv = Move::new(from, to);
        if let Some(c) = text[4..].chars().next() {
            mv = mv.with_promotion(Promotion::from_char(c)?);
        }
        Ok(mv)
    }
}

impl TryFrom<String> for Move {
    type Error = MoveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Move> for String {
    fn from(mv: Move) -> Self {
        mv.uci()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn test_square_roundtrip_names() {
        let sq: Square = "e4".parse().unwrap();
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 3);
        assert_eq!(sq.to_string(), "e4");
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("a".parse::<Square>().is_err());
    }

    #[test]
    fn test_parse_promotion() {
        let m = mv("e7e8q");
        assert_eq!(m.promotion, Some(Promotion::Queen));
        assert_eq!(m.uci(), "e7e8q");
        assert!(matches!(
            "e7e8k".parse::<Move>(),
            Err(MoveParseError::InvalidPromotion('k'))
        ));
    }

    #[test]
    fn test_rejects_null_and_malformed_moves() {
        assert!(matches!(
            "e2e2".parse::<Move>(),
            Err(MoveParseError::NullMove(_))
        ));
        assert!(matches!(
            "e2e".parse::<Move>(),
            Err(MoveParseError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_order_matches_uci_string_order() {
        let mut moves = vec![
            mv("b1c3"),
            mv("a7a8r"),
            mv("a2a4"),
            mv("a7a8"),
            mv("a7a8b"),
            mv("a8b1"),
            mv("a2a3"),
        ];
        let mut by_string: Vec<String> = moves.iter().map(Move::uci).collect();
        moves.sort();
        by_string.sort();
        let sorted: Vec<String> = moves.iter().map(Move::uci).collect();
        assert_eq!(sorted, by_string);
    }

    #[test]
    fn test_first_step_for_sliding_moves() {
        assert_eq!(mv("a1h8").first_step(), Some("b2".parse().unwrap()));
        assert_eq!(mv("d1d7").first_step(), Some("d2".parse().unwrap()));
        assert_eq!(mv("h5a5").first_step(), Some("g5".parse().unwrap()));
        assert_eq!(mv("e1f1").first_step(), Some("f1".parse().unwrap()));
        assert_eq!(mv("g1f3").first_step(), None);
    }

    #[test]
    fn test_serde_as_uci_string() {
        let json = serde_json::to_string(&mv("g7g8n")).unwrap();
        assert_eq!(json, "\"g7g8n\"");
        let back: Move = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mv("g7g8n"));
        assert!(serde_json::from_str::<Move>("\"zz99\"").is_err());
    }
}
