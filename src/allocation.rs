use crate::amount::TokenAmount;
use serde::{Deserialize, Serialize};

//------------------------------------         Allocations         ------------------------------------------------//

/// One party's entitlement within a channel: who gets paid, in which asset, and how much.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAllocation {
    /// The account that this allocation pays out to.
    pub destination: String,
    /// The asset this allocation is denominated in.
    pub token: String,
    pub amount: TokenAmount,
}

impl ChannelAllocation {
    pub fn new(destination: impl Into<String>, token: impl Into<String>, amount: TokenAmount) -> Self {
        ChannelAllocation { destination: destination.into(), token: token.into(), amount }
    }
}

/// The checked sum of all allocation amounts. `None` on overflow.
pub fn total(allocations: &[ChannelAllocation]) -> Option<TokenAmount> {
    allocations.iter().try_fold(TokenAmount::ZERO, |acc, a| acc.checked_add(a.amount))
}

/// Moves `amount` from the allocation at `from` to the allocation at `to`, leaving the total
/// unchanged. Returns `None` if either index is out of range, or the debited party would be
/// left with a negative balance.
pub fn transfer(
    allocations: &[ChannelAllocation],
    from: usize,
    to: usize,
    amount: TokenAmount,
) -> Option<Vec<ChannelAllocation>> {
    if from == to {
        // A self-transfer moves nothing
        allocations.get(from)?;
        return Some(allocations.to_vec());
    }
    let debited = allocations.get(from)?.amount.checked_sub(amount)?;
    let credited = allocations.get(to)?.amount.checked_add(amount)?;
    let mut next = allocations.to_vec();
    next[from].amount = debited;
    next[to].amount = credited;
    Some(next)
}
