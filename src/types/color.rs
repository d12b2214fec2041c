// ABOUTME: The two parallel fleet colors of a blue-green environment.
// ABOUTME: Colors are a closed two-variant enum with a total `other()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown color '{0}' (expected blue/green or a/b)")]
pub struct ParseColorError(String);

/// One of the two identically-configured fleets of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::Blue, Color::Green];

    /// The opposite color.
    pub fn other(self) -> Color {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" | "a" => Ok(Color::Blue),
            "green" | "b" => Ok(Color::Green),
            _ => Err(ParseColorError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn other_swaps_colors() {
        assert_eq!(Color::Blue.other(), Color::Green);
        assert_eq!(Color::Green.other(), Color::Blue);
    }

    #[test]
    fn parses_names_and_letters() {
        assert_eq!("blue".parse::<Color>().unwrap(), Color::Blue);
        assert_eq!("GREEN".parse::<Color>().unwrap(), Color::Green);
        assert_eq!("a".parse::<Color>().unwrap(), Color::Blue);
        assert_eq!("B".parse::<Color>().unwrap(), Color::Green);
        assert!("red".parse::<Color>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Color::Green).unwrap(), "\"green\"");
    }

    proptest! {
        #[test]
        fn other_is_an_involution(blue in any::<bool>()) {
            let color = if blue { Color::Blue } else { Color::Green };
            prop_assert_eq!(color.other().other(), color);
            prop_assert_ne!(color.other(), color);
        }
    }
}
