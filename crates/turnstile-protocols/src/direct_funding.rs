//! # Direct Funding
//!
//! Participants deposit on-chain in participant order. A deposit is only
//! submitted once the holdings show every prior funder's deposit landed, and
//! the transaction itself carries `expected_held` so the chain refuses it if
//! a race slipped through anyway.

use turnstile_store::ChannelRecord;
use turnstile_types::{ChainTransaction, U256};

/// The deposit this participant owes right now, if any.
///
/// Funding targets come from the opening (turn 0) state: allocation `i`
/// belongs to participant `i`. Returns `None` while prior funders' deposits
/// have not landed, or once our share is covered.
pub fn next_deposit(record: &ChannelRecord) -> Option<ChainTransaction> {
    let opening = record.state_at(0)?;
    let me = record.my_index();

    for asset in opening.state.outcome.assets() {
        let Some(mine) = asset.allocations.get(me) else {
            continue;
        };
        if mine.amount.is_zero() {
            continue;
        }

        let expected_held = asset.allocations[..me]
            .iter()
            .fold(U256::zero(), |acc, a| acc.saturating_add(a.amount));
        let held = record.holding(&asset.asset);

        if held >= expected_held.saturating_add(mine.amount) {
            // Our share (and everything before it) already landed.
            continue;
        }
        if held < expected_held {
            // Prior funders still pending on this asset.
            continue;
        }
        return Some(ChainTransaction::Deposit {
            channel_id: record.channel_id(),
            asset: asset.asset,
            amount: mine.amount,
            expected_held,
        });
    }
    None
}
