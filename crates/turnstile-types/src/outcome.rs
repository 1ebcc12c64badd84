//! # Outcomes
//!
//! An outcome is an ordered list of per-asset allocations describing how a
//! channel's holdings pay out if the state carrying it finalizes.

use serde::{Deserialize, Serialize};

use crate::entities::{Address, Destination, U256};

/// One `(destination, amount)` payout entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Who is paid.
    pub destination: Destination,
    /// How much, in the asset's base units.
    pub amount: U256,
}

/// All payout entries for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAllocation {
    /// Asset holder contract address (zero address for the native asset).
    pub asset: Address,
    /// Payout entries in priority order.
    pub allocations: Vec<Allocation>,
}

impl AssetAllocation {
    /// Sum of all allocation amounts for this asset.
    pub fn total(&self) -> U256 {
        self.allocations
            .iter()
            .fold(U256::zero(), |acc, a| acc.saturating_add(a.amount))
    }

    /// Amount allocated to a specific destination (zero if absent).
    pub fn allocated_to(&self, destination: &Destination) -> U256 {
        self.allocations
            .iter()
            .filter(|a| &a.destination == destination)
            .fold(U256::zero(), |acc, a| acc.saturating_add(a.amount))
    }
}

/// An ordered list of asset allocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Outcome(pub Vec<AssetAllocation>);

impl Outcome {
    /// Single-asset convenience constructor.
    pub fn simple(asset: Address, allocations: Vec<Allocation>) -> Self {
        Self(vec![AssetAllocation { asset, allocations }])
    }

    /// The allocation list for an asset, if present.
    pub fn for_asset(&self, asset: &Address) -> Option<&AssetAllocation> {
        self.0.iter().find(|a| &a.asset == asset)
    }

    /// Iterate over the per-asset allocations.
    pub fn assets(&self) -> impl Iterator<Item = &AssetAllocation> {
        self.0.iter()
    }

    /// True when both outcomes move the same total per asset.
    ///
    /// Equal-turn transformations must conserve allocation totals unless the
    /// app validator explicitly authorizes a redistribution.
    pub fn conserves(&self, other: &Outcome) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().zip(other.0.iter()).all(|(a, b)| {
            a.asset == b.asset && a.total() == b.total()
        })
    }
}
