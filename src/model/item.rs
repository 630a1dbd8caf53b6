//! Item types: a tracked physical unit and its lifecycle state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Address;

/// Sequential item identifier. Assigned from 1; 0 never names an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// The reserved "does not exist" id.
    pub const NONE: Self = Self(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Where an item stands in its lifecycle.
///
/// Ordered: a later variant is always further along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    Harvested,
    Processed,
    Shipped,
    Received,
}

impl State {
    /// The state that follows this one, or `None` at the end of the lifecycle.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Harvested => Some(Self::Processed),
            Self::Processed => Some(Self::Shipped),
            Self::Shipped => Some(Self::Received),
            Self::Received => None,
        }
    }

    /// The state a transition into `self` must start from.
    pub fn prerequisite(self) -> Option<Self> {
        match self {
            Self::Harvested => None,
            Self::Processed => Some(Self::Harvested),
            Self::Shipped => Some(Self::Processed),
            Self::Received => Some(Self::Shipped),
        }
    }

    /// Stable numeric code used in storage and hashing.
    pub fn code(self) -> u8 {
        match self {
            Self::Harvested => 0,
            Self::Processed => 1,
            Self::Shipped => 2,
            Self::Received => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Harvested),
            1 => Some(Self::Processed),
            2 => Some(Self::Shipped),
            3 => Some(Self::Received),
            _ => None,
        }
    }
}

/// A tracked physical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Current custodian. Changes only when the item is shipped.
    pub owner: Address,
    pub current_state: State,
}
