//! Dispute paths end to end: challenge answered by the counterparty,
//! challenge maturing into a forced payout, and refutation at the chain
//! boundary.

use std::time::Duration;

use turnstile_chain::{ChainError, ChainService, MockChain};
use turnstile_crypto::{channel_storage_hash, state_hash, ChannelKeyPair, StateSigner};
use turnstile_dispute::ChallengeRecord;
use turnstile_types::{
    Allocation, ChainTransaction, Destination, FixedPart, FundingStrategy, Outcome, SignedState,
    State, U256, ADDRESS_ZERO,
};

use crate::support::{allocation, wait_until, wait_until_async, TestNetwork};

const SETTLE: Duration = Duration::from_secs(10);

async fn open_direct(net: &TestNetwork, amounts: &[u64]) -> turnstile_types::ChannelId {
    let a = &net.wallets[0];
    let b = &net.wallets[1];
    let created = a
        .scheduler
        .create_channel(net.create_params(amounts, FundingStrategy::Direct))
        .await
        .unwrap();
    let channel_id = created.channel_result.unwrap().channel_id;

    assert!(
        wait_until_async(
            || async { b.scheduler.get_state(channel_id).await.is_ok() },
            SETTLE
        )
        .await
    );
    b.scheduler.join_channel(channel_id).await.unwrap();
    assert!(
        wait_until_async(
            || async {
                for wallet in [a, b] {
                    match wallet.scheduler.get_state(channel_id).await {
                        Ok(result) if result.turn_num == Some(3) && result.funded => {}
                        _ => return false,
                    }
                }
                true
            },
            SETTLE
        )
        .await
    );
    channel_id
}

/// A challenges after an update; turn 5 moves B, so B answers with a signed
/// response and the challenge clears with the record advanced.
#[tokio::test(flavor = "multi_thread")]
async fn challenge_is_cleared_by_the_counterparty_response() {
    let net = TestNetwork::start(2);
    let channel_id = open_direct(&net, &[3, 2]).await;

    let participants: Vec<_> = net.wallets.iter().map(|w| w.participant.clone()).collect();
    net.wallets[0]
        .scheduler
        .update_channel(channel_id, allocation(&participants, &[1, 4]), vec![2])
        .await
        .unwrap();
    assert!(
        wait_until_async(
            || async {
                net.wallets[1]
                    .scheduler
                    .get_state(channel_id)
                    .await
                    .is_ok_and(|r| r.turn_num == Some(4))
            },
            SETTLE
        )
        .await
    );

    net.wallets[0].scheduler.challenge(channel_id).await.unwrap();

    // B's responder clears the challenge: storage becomes a cleared record
    // at turn 5.
    let cleared = ChallengeRecord::cleared(5).storage_hash();
    assert!(
        wait_until(
            || net.chain.storage_hash(channel_id) == Some(cleared),
            SETTLE
        )
        .await,
        "challenge was not cleared by a response"
    );
}

/// A challenge nobody can answer matures and pays out the challenged
/// outcome.
#[tokio::test(flavor = "multi_thread")]
async fn unanswered_challenge_matures_and_defunds() {
    let net = TestNetwork::start(2);
    let channel_id = open_direct(&net, &[3, 2]).await;

    // Head is the postfund state (turn 3); turn 4 moves A itself, so B can
    // neither checkpoint nor respond.
    net.wallets[0].scheduler.challenge(channel_id).await.unwrap();
    assert!(
        wait_until(
            || net
                .chain
                .storage_hash(channel_id)
                .is_some_and(|hash| hash != ChallengeRecord::cleared(3).storage_hash()),
            SETTLE
        )
        .await
    );

    // The countdown elapses on-chain.
    net.chain.advance_time(1_000);

    let a_address = net.wallets[0].participant.signing_address;
    let b_address = net.wallets[1].participant.signing_address;
    assert!(
        wait_until(
            || {
                net.chain.holdings(channel_id, ADDRESS_ZERO).is_zero()
                    && net.chain.balance_of(a_address, ADDRESS_ZERO) == U256::from(3)
                    && net.chain.balance_of(b_address, ADDRESS_ZERO) == U256::from(2)
            },
            SETTLE
        )
        .await,
        "matured challenge did not pay out the challenged outcome"
    );
}

// =============================================================================
// REFUTE (chain boundary)
// =============================================================================
// Challenge registered at turn 8 with a 1000-second duration; a refutation
// at turn 99 signed by the challenger clears storage to
// (8, 0, HashZero, AddressZero, HashZero) before expiry and reverts after.

struct RefuteHarness {
    chain: MockChain,
    fixed: FixedPart,
    keys: Vec<ChannelKeyPair>,
    channel_id: turnstile_types::ChannelId,
}

impl RefuteHarness {
    async fn challenged(channel_nonce: u64) -> Self {
        let keys: Vec<ChannelKeyPair> = (0..3).map(|_| ChannelKeyPair::generate()).collect();
        let fixed = FixedPart {
            chain_id: 1234,
            participants: keys.iter().map(|k| k.address()).collect(),
            channel_nonce,
            app_definition: [9u8; 20],
            challenge_duration: 1000,
        };
        let channel_id = turnstile_crypto::channel_id(&fixed);
        let chain = MockChain::new();

        let candidate = signed_by(&fixed, 8, &keys, &keys.iter().collect::<Vec<_>>());
        chain
            .submit(ChainTransaction::Challenge {
                fixed: fixed.clone(),
                support: vec![candidate],
                challenger: keys[2].address(),
            })
            .await
            .unwrap();

        Self {
            chain,
            fixed,
            keys,
            channel_id,
        }
    }

    async fn refute(
        &self,
        declared_turn_num_record: u64,
        refutation_signer: &ChannelKeyPair,
    ) -> Result<(), ChainError> {
        let refutation = signed_by(&self.fixed, 99, &self.keys, &[refutation_signer]);
        self.chain
            .submit(ChainTransaction::Refute {
                fixed: self.fixed.clone(),
                declared_turn_num_record,
                refutation,
            })
            .await
            .map(|_| ())
    }
}

fn signed_by(
    fixed: &FixedPart,
    turn_num: u64,
    all_keys: &[ChannelKeyPair],
    signers: &[&ChannelKeyPair],
) -> SignedState {
    let state = State {
        turn_num,
        is_final: false,
        channel_id: turnstile_crypto::channel_id(fixed),
        app_data: vec![0],
        outcome: Outcome::simple(
            ADDRESS_ZERO,
            all_keys
                .iter()
                .map(|key| Allocation {
                    destination: Destination::from_address(key.address()),
                    amount: U256::from(1),
                })
                .collect(),
        ),
    };
    let hash = state_hash(fixed, &state);
    let mut signed = SignedState::unsigned(state);
    for signer in signers {
        signed.add_signature(signer.sign(&hash));
    }
    signed
}

#[tokio::test]
async fn refute_accepts_for_an_ongoing_challenge() {
    let harness = RefuteHarness::challenged(1001).await;
    harness.refute(8, &harness.keys[2]).await.unwrap();

    let expected = channel_storage_hash(
        8,
        0,
        &turnstile_types::HASH_ZERO,
        &turnstile_types::ADDRESS_ZERO,
        &turnstile_types::HASH_ZERO,
    );
    assert_eq!(harness.chain.storage_hash(harness.channel_id), Some(expected));
}

#[tokio::test]
async fn refute_reverts_once_the_challenge_expired() {
    let harness = RefuteHarness::challenged(1002).await;
    harness.chain.advance_time(1000);

    let err = harness.refute(8, &harness.keys[2]).await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::Revert { ref reason } if reason == "Refute too late!"
    ));
}

#[tokio::test]
async fn refute_reverts_on_a_mismatched_turn_num_record() {
    let harness = RefuteHarness::challenged(1003).await;

    let err = harness.refute(7, &harness.keys[2]).await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::Revert { ref reason }
            if reason == "Challenge State does not match stored version"
    ));
}

#[tokio::test]
async fn refute_reverts_when_not_signed_by_the_challenger() {
    let harness = RefuteHarness::challenged(1004).await;
    let non_participant = ChannelKeyPair::generate();

    let err = harness.refute(8, &non_participant).await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::Revert { ref reason }
            if reason == "Refutation state not signed by challenger"
    ));
}
