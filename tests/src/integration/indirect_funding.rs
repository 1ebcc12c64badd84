//! Ledger and hub-mediated funding: sub-channels backed by off-chain
//! guarantees instead of fresh deposits.

use std::time::Duration;

use turnstile_types::{
    ChannelId, Destination, FundLedgerChannel, FundVirtualChannel, FundingStrategy, Objective,
    U256, ADDRESS_ZERO,
};

use crate::support::{wait_until_async, TestNetwork, TestWallet};

const SETTLE: Duration = Duration::from_secs(10);

/// Open a fake-funded channel between the given wallets and wait for the
/// postfund round everywhere.
async fn open_between(
    net: &TestNetwork,
    indices: &[usize],
    amounts: &[u64],
    strategy: FundingStrategy,
) -> ChannelId {
    let creator = &net.wallets[indices[0]];
    let created = creator
        .scheduler
        .create_channel(net.create_params_for(indices, amounts, strategy))
        .await
        .unwrap();
    let channel_id = created.channel_result.unwrap().channel_id;

    for index in &indices[1..] {
        let wallet = &net.wallets[*index];
        assert!(
            wait_until_async(
                || async { wallet.scheduler.get_state(channel_id).await.is_ok() },
                SETTLE
            )
            .await
        );
        wallet.scheduler.join_channel(channel_id).await.unwrap();
    }
    channel_id
}

async fn wait_for_postfund(wallets: &[&TestWallet], channel_id: ChannelId, turn: u64) {
    assert!(
        wait_until_async(
            || async {
                for wallet in wallets {
                    match wallet.scheduler.get_state(channel_id).await {
                        Ok(result) if result.turn_num >= Some(turn) => {}
                        _ => return false,
                    }
                }
                true
            },
            SETTLE
        )
        .await,
        "setup rounds did not complete"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_channel_funds_a_sub_channel() {
    let net = TestNetwork::start(2);
    let a = &net.wallets[0];
    let b = &net.wallets[1];

    // A running ledger channel holding (10, 10).
    let ledger_id = open_between(&net, &[0, 1], &[10, 10], FundingStrategy::Fake).await;
    wait_for_postfund(&[a, b], ledger_id, 3).await;

    // A sub-channel targeting (3, 2), funded out of the ledger.
    let target_id = open_between(&net, &[0, 1], &[3, 2], FundingStrategy::Ledger).await;

    a.scheduler
        .register_objective(Objective::FundLedgerChannel(FundLedgerChannel {
            target_channel: target_id,
            ledger_channel: ledger_id,
        }))
        .await
        .unwrap();

    // The sub-channel reaches a funded postfund without any deposit.
    assert!(
        wait_until_async(
            || async {
                for wallet in [a, b] {
                    match wallet.scheduler.get_state(target_id).await {
                        Ok(result) if result.turn_num == Some(3) && result.funded => {}
                        _ => return false,
                    }
                }
                true
            },
            SETTLE
        )
        .await,
        "ledger funding did not complete"
    );
    assert!(net.chain.holdings(target_id, ADDRESS_ZERO).is_zero());

    // The ledger's supported outcome was debited 3 and 2 and credits the
    // sub-channel's guarantee with 5.
    let ledger_outcome = a
        .scheduler
        .get_state(ledger_id)
        .await
        .unwrap()
        .outcome
        .unwrap();
    let asset = ledger_outcome.for_asset(&ADDRESS_ZERO).unwrap();
    assert_eq!(
        asset.allocated_to(&a.participant.destination),
        U256::from(7)
    );
    assert_eq!(
        asset.allocated_to(&b.participant.destination),
        U256::from(8)
    );
    assert_eq!(
        asset.allocated_to(&Destination::from_channel(target_id)),
        U256::from(5)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn hub_guarantees_a_virtual_channel_without_moving_its_own_funds() {
    let net = TestNetwork::start(3);
    let a = &net.wallets[0];
    let b = &net.wallets[1];
    let hub = &net.wallets[2];

    // The joint channel holds (5, 5, 10) across a, b and the hub.
    let joint_id = open_between(&net, &[0, 1, 2], &[5, 5, 10], FundingStrategy::Fake).await;
    wait_for_postfund(&[a, b, hub], joint_id, 5).await;

    // A virtual channel (3, 2) between a and b only.
    let target_id = open_between(&net, &[0, 1], &[3, 2], FundingStrategy::Virtual).await;

    a.scheduler
        .register_objective(Objective::FundVirtualChannel(FundVirtualChannel {
            target_channel: target_id,
            joint_channel: joint_id,
            hub: hub.participant.signing_address,
        }))
        .await
        .unwrap();

    assert!(
        wait_until_async(
            || async {
                for wallet in [a, b] {
                    match wallet.scheduler.get_state(target_id).await {
                        Ok(result) if result.turn_num == Some(3) && result.funded => {}
                        _ => return false,
                    }
                }
                true
            },
            SETTLE
        )
        .await,
        "virtual funding did not complete"
    );

    // The hub's joint-channel allocation is exactly where it started.
    let joint_outcome = hub
        .scheduler
        .get_state(joint_id)
        .await
        .unwrap()
        .outcome
        .unwrap();
    let asset = joint_outcome.for_asset(&ADDRESS_ZERO).unwrap();
    assert_eq!(
        asset.allocated_to(&hub.participant.destination),
        U256::from(10)
    );
    assert_eq!(
        asset.allocated_to(&Destination::from_channel(target_id)),
        U256::from(5)
    );
}
