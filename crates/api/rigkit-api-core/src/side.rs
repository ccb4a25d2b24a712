//! Rig sides. Items either carry an own side or inherit one from their
//! module; preset addresses and reference names encode it as a single letter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    #[default]
    Center,
    Right,
}

impl Side {
    /// Single-letter form used in preset channel addresses and reference names.
    pub fn letter(self) -> char {
        match self {
            Side::Left => 'L',
            Side::Center => 'C',
            Side::Right => 'R',
        }
    }

    pub fn from_letter(c: char) -> Option<Side> {
        match c {
            'L' => Some(Side::Left),
            'C' => Some(Side::Center),
            'R' => Some(Side::Right),
            _ => None,
        }
    }

    /// Left <-> Right; Center maps to itself.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Center => Side::Center,
            Side::Right => Side::Left,
        }
    }

    pub fn is_lateral(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Left => "left",
            Side::Center => "center",
            Side::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" | "L" => Ok(Side::Left),
            "center" | "C" => Ok(Side::Center),
            "right" | "R" => Ok(Side::Right),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involution() {
        for side in [Side::Left, Side::Center, Side::Right] {
            assert_eq!(side.opposite().opposite(), side);
        }
    }

    #[test]
    fn letters_round_trip() {
        for side in [Side::Left, Side::Center, Side::Right] {
            assert_eq!(Side::from_letter(side.letter()), Some(side));
        }
        assert_eq!(Side::from_letter('x'), None);
    }
}
