//! ADA amount representation.
//!
//! Amounts are stored as lovelace (base units) so arithmetic stays exact,
//! with a decimal ADA view for display.

use crate::LOVELACE_PER_ADA;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// An amount of ADA, stored as lovelace (1 ADA = 10^6 lovelace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lovelace(u64);

impl Lovelace {
    /// Zero ADA.
    pub const ZERO: Self = Self(0);

    /// Maximum amount (`u64::MAX` lovelace).
    pub const MAX: Self = Self(u64::MAX);

    /// Create an amount from lovelace.
    #[must_use]
    pub const fn new(lovelace: u64) -> Self {
        Self(lovelace)
    }

    /// Create an amount from whole ADA.
    #[must_use]
    pub const fn from_ada(ada: u64) -> Self {
        Self(ada.saturating_mul(LOVELACE_PER_ADA))
    }

    /// Get the amount in lovelace.
    #[must_use]
    pub const fn lovelace(&self) -> u64 {
        self.0
    }

    /// Get the amount in ADA as a float, for display only.
    #[must_use]
    pub fn as_ada(&self) -> f64 {
        self.0 as f64 / LOVELACE_PER_ADA as f64
    }

    /// Whole ADA part.
    #[must_use]
    pub const fn whole_ada(&self) -> u64 {
        self.0 / LOVELACE_PER_ADA
    }

    /// Lovelace remaining after the whole ADA part.
    #[must_use]
    pub const fn fractional_lovelace(&self) -> u64 {
        self.0 % LOVELACE_PER_ADA
    }

    /// Check if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(&self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(lovelace) => Some(Self(lovelace)),
            None => None,
        }
    }

    /// Checked subtraction.
    #[must_use]
    pub const fn checked_sub(&self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(lovelace) => Some(Self(lovelace)),
            None => None,
        }
    }
}

impl Default for Lovelace {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Lovelace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06} ADA", self.whole_ada(), self.fractional_lovelace())
    }
}

impl Add for Lovelace {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

impl From<u64> for Lovelace {
    fn from(lovelace: u64) -> Self {
        Self(lovelace)
    }
}

impl std::iter::Sum for Lovelace {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc.saturating_add(x))
    }
}
