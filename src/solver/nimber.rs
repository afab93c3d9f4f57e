use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// A Grundy value. Independent subgames merge via XOR.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct Nimber(pub u8);

impl Nimber {
    pub const LOSS: Self = Self(0);

    #[must_use]
    pub const fn is_loss(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_win(self) -> bool {
        self.0 != 0
    }

    #[must_use]
    pub const fn merge(x: Self, y: Self) -> Self {
        Self(x.0 ^ y.0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Nimber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nimber {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u8>()
            .map(Self)
            .map_err(|_| SolverError::InvalidInput(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_commutative() {
        for a in 0..=16u8 {
            for b in 0..=16u8 {
                assert_eq!(
                    Nimber::merge(Nimber(a), Nimber(b)),
                    Nimber::merge(Nimber(b), Nimber(a))
                );
            }
        }
    }

    #[test]
    fn merge_identity_and_involution() {
        for a in 0..=255u8 {
            assert_eq!(Nimber::merge(Nimber(a), Nimber::LOSS), Nimber(a));
            assert_eq!(Nimber::merge(Nimber(a), Nimber(a)), Nimber::LOSS);
        }
    }

    #[test]
    fn win_iff_nonzero() {
        assert!(Nimber::LOSS.is_loss());
        assert!(!Nimber::LOSS.is_win());
        assert!(Nimber(3).is_win());
    }

    #[test]
    fn parses_decimal() {
        assert_eq!("7".parse::<Nimber>().unwrap(), Nimber(7));
        assert!("x".parse::<Nimber>().is_err());
        assert!("300".parse::<Nimber>().is_err());
    }
}
