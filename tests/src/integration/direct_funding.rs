//! Directly funded channel lifecycle: open, fund, update, close, with and
//! without transport loss and latency.

use std::time::Duration;

use turnstile_types::{ChannelId, FundingStrategy, Stage, U256, ADDRESS_ZERO};

use crate::support::{wait_until_async, LatencyOptions, TestNetwork};

const SETTLE: Duration = Duration::from_secs(10);

/// Open a direct channel between wallets a and b, healing lost messages by
/// re-syncing, and wait for both setup rounds and the full deposit.
async fn open_direct(net: &TestNetwork, amounts: &[u64]) -> ChannelId {
    let a = &net.wallets[0];
    let b = &net.wallets[1];

    let created = a
        .scheduler
        .create_channel(net.create_params(amounts, FundingStrategy::Direct))
        .await
        .unwrap();
    let channel_id = created.channel_result.unwrap().channel_id;

    // Wait for the proposal to reach b, resending through sync on loss.
    let arrived = wait_until_async(
        || async {
            if b.scheduler.get_state(channel_id).await.is_ok() {
                return true;
            }
            let _ = a.scheduler.sync_channel(channel_id).await;
            false
        },
        SETTLE,
    )
    .await;
    assert!(arrived, "proposal never reached the peer");

    b.scheduler.join_channel(channel_id).await.unwrap();

    // Both engines must reach the funded postfund head.
    let settled = wait_until_async(
        || async {
            for wallet in [a, b] {
                let Ok(result) = wallet.scheduler.get_state(channel_id).await else {
                    return false;
                };
                if result.turn_num != Some(3) || !result.funded {
                    let _ = wallet.scheduler.sync_channel(channel_id).await;
                    return false;
                }
            }
            true
        },
        SETTLE,
    )
    .await;
    assert!(settled, "channel never reached a funded postfund");
    channel_id
}

async fn lifecycle(options: LatencyOptions, closer: usize) {
    let net = TestNetwork::start(2);
    net.transport.set_latency_options(options);

    let channel_id = open_direct(&net, &[3, 2]).await;

    // Funding conservation: exactly the target landed, no more, no less.
    assert_eq!(
        net.chain.holdings(channel_id, ADDRESS_ZERO),
        U256::from(5)
    );

    // Redistribute (3, 2) -> (1, 4) on the first running turn.
    let participants: Vec<_> = net.wallets.iter().map(|w| w.participant.clone()).collect();
    let updated = net.wallets[0]
        .scheduler
        .update_channel(
            channel_id,
            crate::support::allocation(&participants, &[1, 4]),
            vec![2],
        )
        .await
        .unwrap();
    assert_eq!(updated.channel_result.unwrap().turn_num, Some(4));

    let peer_caught_up = wait_until_async(
        || async {
            let Ok(result) = net.wallets[1].scheduler.get_state(channel_id).await else {
                return false;
            };
            if result.turn_num == Some(4) {
                return true;
            }
            let _ = net.wallets[0].scheduler.sync_channel(channel_id).await;
            false
        },
        SETTLE,
    )
    .await;
    assert!(peer_caught_up, "update never reached the peer");

    // Either side closes; funds leave per the final allocation.
    net.wallets[closer]
        .scheduler
        .close_channel(channel_id)
        .await
        .unwrap();

    let closed = wait_until_async(
        || async {
            let drained = net.chain.holdings(channel_id, ADDRESS_ZERO).is_zero();
            let a_paid = net.chain.balance_of(net.wallets[0].participant.signing_address, ADDRESS_ZERO)
                == U256::from(1);
            let b_paid = net.chain.balance_of(net.wallets[1].participant.signing_address, ADDRESS_ZERO)
                == U256::from(4);
            if drained && a_paid && b_paid {
                return true;
            }
            for wallet in &net.wallets {
                let _ = wallet.scheduler.sync_channel(channel_id).await;
            }
            false
        },
        SETTLE,
    )
    .await;
    assert!(closed, "close did not pay out the final allocation");
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_on_a_perfect_transport_closed_by_a() {
    lifecycle(LatencyOptions::default(), 0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_on_a_perfect_transport_closed_by_b() {
    lifecycle(LatencyOptions::default(), 1).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_on_a_lossy_transport_closed_by_a() {
    lifecycle(
        LatencyOptions {
            drop_rate: 0.1,
            mean_delay: Some(Duration::from_millis(20)),
        },
        0,
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_on_a_lossy_transport_closed_by_b() {
    lifecycle(
        LatencyOptions {
            drop_rate: 0.1,
            mean_delay: Some(Duration::from_millis(20)),
        },
        1,
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn both_wallets_converge_on_the_same_stage() {
    let net = TestNetwork::start(2);
    let channel_id = open_direct(&net, &[3, 2]).await;

    for wallet in &net.wallets {
        let result = wallet.scheduler.get_state(channel_id).await.unwrap();
        assert_eq!(result.stage, Stage::PostfundSetup);
        assert!(result.funded);
    }
}
