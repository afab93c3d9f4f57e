use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::game::Outcome;

/// A proof or disproof number: an unsigned value whose maximum means
/// infinity. Addition and subtraction are fallible so the INF and overflow
/// edge cases stay explicit.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pn(u64);

impl Pn {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);
    pub const INF: Self = Self(u64::MAX);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_inf(self) -> bool {
        self.0 == u64::MAX
    }

    pub fn add(self, other: Self) -> SolverResult<Self> {
        if self.is_inf() || other.is_inf() {
            return Ok(Self::INF);
        }

        match self.0.checked_add(other.0) {
            Some(sum) if sum != u64::MAX => Ok(Self(sum)),
            _ => Err(SolverError::Overflow),
        }
    }

    pub fn sub(self, other: Self) -> SolverResult<Self> {
        if self.is_inf() {
            if other.is_inf() {
                return Err(SolverError::UndefinedSubtraction);
            }

            return Ok(Self::INF);
        }

        if self.0 < other.0 {
            return Err(SolverError::Underflow);
        }

        Ok(Self(self.0 - other.0))
    }

    /// INF-absorbing addition used for virtual-loss complexities, where a
    /// hard failure is not wanted.
    #[must_use]
    pub const fn saturating_add(self, value: u64) -> Self {
        if self.is_inf() {
            return Self::INF;
        }

        match self.0.checked_add(value) {
            Some(sum) => Self(sum),
            None => Self::INF,
        }
    }

    #[must_use]
    pub const fn saturating_sub(self, value: u64) -> Self {
        if self.is_inf() {
            return Self::INF;
        }

        Self(self.0.saturating_sub(value))
    }
}

impl fmt::Display for Pn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inf() {
            write!(f, "INF")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ProofNumbers {
    pub proof: Pn,
    pub disproof: Pn,
}

impl ProofNumbers {
    pub const WIN: Self = Self {
        proof: Pn::ZERO,
        disproof: Pn::INF,
    };
    pub const LOSS: Self = Self {
        proof: Pn::INF,
        disproof: Pn::ZERO,
    };

    #[must_use]
    pub const fn new(proof: Pn, disproof: Pn) -> Self {
        Self { proof, disproof }
    }

    #[must_use]
    pub const fn is_win(self) -> bool {
        self.proof.value() == 0
    }

    #[must_use]
    pub const fn is_loss(self) -> bool {
        self.disproof.value() == 0
    }

    #[must_use]
    pub const fn is_proved(self) -> bool {
        self.is_win() || self.is_loss()
    }

    #[must_use]
    pub const fn to_outcome(self) -> Outcome {
        if self.is_win() {
            Outcome::Win
        } else if self.is_loss() {
            Outcome::Loss
        } else {
            Outcome::Unknown
        }
    }
}

impl Default for ProofNumbers {
    fn default() -> Self {
        Self::new(Pn::ONE, Pn::ONE)
    }
}

impl fmt::Display for ProofNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.proof, self.disproof)
    }
}
