// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelsError;

/// Token balance of an account, in the smallest indivisible unit.
/// Arithmetic never wraps: checked operations return `None` on overflow or underflow.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash, Serialize, Deserialize,
)]
pub struct Balance(u64);

impl Balance {
    /// Create a zero balance
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Raw `u64` representation
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// Build from the raw `u64` representation
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// returns true if the balance is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// safely add, returning None on overflow
    /// ```
    /// # use zchain_models::Balance;
    /// assert_eq!(Balance::from_raw(42).checked_add(Balance::from_raw(7)), Some(Balance::from_raw(49)));
    /// assert_eq!(Balance::from_raw(u64::MAX).checked_add(Balance::from_raw(1)), None);
    /// ```
    pub fn checked_add(self, other: Balance) -> Option<Self> {
        self.0.checked_add(other.0).map(Balance)
    }

    /// safely subtract, returning None on underflow
    /// ```
    /// # use zchain_models::Balance;
    /// assert_eq!(Balance::from_raw(42).checked_sub(Balance::from_raw(7)), Some(Balance::from_raw(35)));
    /// assert_eq!(Balance::from_raw(7).checked_sub(Balance::from_raw(42)), None);
    /// ```
    pub fn checked_sub(self, other: Balance) -> Option<Self> {
        self.0.checked_sub(other.0).map(Balance)
    }

    /// add, saturating on overflow
    #[must_use]
    pub fn saturating_add(self, other: Balance) -> Self {
        Balance(self.0.saturating_add(other.0))
    }

    /// subtract, saturating on underflow
    #[must_use]
    pub fn saturating_sub(self, other: Balance) -> Self {
        Balance(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Balance {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s)
            .map(Balance)
            .map_err(|err| ModelsError::DeserializeError(format!("balance {}: {}", s, err)))
    }
}

impl From<u64> for Balance {
    fn from(value: u64) -> Self {
        Balance(value)
    }
}
