//! End-to-end swap: the user's BTC buys ERC-20 through an M1 hop.
//!
//! Drives a full three-leg swap through the orchestrator against all
//! three rails, connecting M1 blocks between ticks the way a block
//! producer would, and checks that one hashlock triple carries the
//! whole flow byte for byte.

use trident_chains::adapters::{btc, evm};
use trident_core::state_machine::SwapPhase;
use trident_core::types::LegIndex;
use trident_crypto::encoding::{hashlock_bytes, triple_bytes};
use trident_integration_tests::{lp1_m1, lp2_m1, standard_drafts, Testbed, START_TIME};
use trident_ledger::Outpoint;
use trident_swap::SwapEvent;

fn leg_indexes<F>(events: &[SwapEvent], mut pick: F) -> Vec<LegIndex>
where
    F: FnMut(&SwapEvent) -> Option<LegIndex>,
{
    events.iter().filter_map(|e| pick(e)).collect()
}

#[tokio::test]
async fn test_full_swap_across_three_rails() {
    let bed = Testbed::new();
    // LP1 needs leg2's amount plus the flat lock fee.
    bed.fund_m0("btc-burn-a", &lp1_m1(), 100_010);

    let id = bed
        .orchestrator
        .create_swap(standard_drafts(), START_TIME)
        .unwrap();
    let phase = bed.drive(id, START_TIME, 6).await;
    assert_eq!(phase, SwapPhase::Completed);

    // Legs open, fund and claim strictly in canonical order.
    let events = bed.orchestrator.events(id).await.unwrap();
    let order = vec![LegIndex::Leg1, LegIndex::Leg2, LegIndex::Leg3];
    let opened = leg_indexes(&events, |e| match e {
        SwapEvent::LegOpened { index, .. } => Some(*index),
        _ => None,
    });
    let funded = leg_indexes(&events, |e| match e {
        SwapEvent::LegFunded { index, .. } => Some(*index),
        _ => None,
    });
    let claimed = leg_indexes(&events, |e| match e {
        SwapEvent::LegClaimed { index, .. } => Some(*index),
        _ => None,
    });
    assert_eq!(opened, order);
    assert_eq!(funded, order);
    assert_eq!(claimed, order);
    assert!(matches!(events.last(), Some(SwapEvent::SwapCompleted { .. })));

    // Every claim revealed preimages for exactly the plan's hashlocks.
    let plan = bed.orchestrator.plan(id).await.unwrap();
    for event in &events {
        if let SwapEvent::LegClaimed { revealed, .. } = event {
            assert!(plan.hashlocks.all_match(revealed));
        }
    }

    // The ledger's claim log carries the same secrets any watcher
    // would propagate to the remaining legs.
    let claims = bed.m1.claims_since(0);
    assert_eq!(claims.len(), 1);
    assert!(plan.hashlocks.all_match(&claims[0].secrets));

    // Leg2's value now sits under a fresh receipt for LP2, and the
    // monetary audit still balances.
    let receipt = bed.m1.receipt(&claims[0].new_outpoint).unwrap();
    assert_eq!(receipt.owner, lp2_m1());
    assert_eq!(receipt.amount, 100_000);
    let audit = bed.m1.audit();
    assert_eq!(audit.m0_liquid + audit.m0_vaulted, audit.finalized_burn_total);
    assert_eq!(audit.m0_vaulted, audit.m1_supply);
    assert!(!bed.m1.is_halted());
}

#[tokio::test]
async fn test_m1_leg_gates_progress_on_block_connects() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-b", &lp1_m1(), 100_010);
    let id = bed
        .orchestrator
        .create_swap(standard_drafts(), START_TIME)
        .unwrap();

    // BTC settles instantly; the M1 funding sits in the mempool.
    let phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    assert_eq!(phase, SwapPhase::AwaitingFund(LegIndex::Leg2));

    // Ticking again without a block changes nothing.
    let phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    assert_eq!(phase, SwapPhase::AwaitingFund(LegIndex::Leg2));

    // One block funds leg2; the same tick then funds leg3, claims the
    // BTC leg and submits the M1 claim, which waits for its own block.
    bed.m1.connect_block().unwrap();
    let phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    assert_eq!(phase, SwapPhase::Claimed(LegIndex::Leg1));

    // The claim connects; the rest of the chain completes.
    bed.m1.connect_block().unwrap();
    let phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    assert_eq!(phase, SwapPhase::Completed);
}

#[tokio::test]
async fn test_one_hashlock_triple_reaches_every_rail_byte_for_byte() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-c", &lp1_m1(), 100_010);
    let id = bed
        .orchestrator
        .create_swap(standard_drafts(), START_TIME)
        .unwrap();

    // Two ticks around one block: all legs exist, the M1 receipt is
    // still open (its claim sits unconnected in the mempool).
    bed.orchestrator.tick(id, START_TIME).await.unwrap();
    bed.m1.connect_block().unwrap();
    bed.orchestrator.tick(id, START_TIME).await.unwrap();

    let plan = bed.orchestrator.plan(id).await.unwrap();
    let canonical = triple_bytes(&plan.hashlocks);
    let events = bed.orchestrator.events(id).await.unwrap();

    // BTC: the redeem script pushes each 32-byte digest verbatim, in
    // canonical order.
    let script = btc::redeem_script(&plan.leg(LegIndex::Leg1).spec);
    let bytes = script.as_bytes().to_vec();
    let positions: Vec<usize> = plan
        .hashlocks
        .as_array()
        .iter()
        .map(|h| {
            let needle = hashlock_bytes(h);
            bytes
                .windows(32)
                .position(|w| w == needle.as_slice())
                .expect("hashlock bytes in script")
        })
        .collect();
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);

    // The BTC leg reference is the hex digest of that same script.
    let leg1 = events
        .iter()
        .find_map(|e| match e {
            SwapEvent::LegOpened {
                index: LegIndex::Leg1,
                leg,
                ..
            } => Some(leg.clone()),
            _ => None,
        })
        .expect("leg1 opened");
    assert_eq!(hex::decode(&leg1.chain_ref).unwrap().len(), 32);

    // M1: the receipt's HTLC stores the identical triple.
    let leg2 = events
        .iter()
        .find_map(|e| match e {
            SwapEvent::LegOpened {
                index: LegIndex::Leg2,
                leg,
                ..
            } => Some(leg.clone()),
            _ => None,
        })
        .expect("leg2 opened");
    let outpoint = Outpoint::from_uuid(leg2.chain_ref.parse().unwrap());
    let htlc = bed.m1.receipt(&outpoint).unwrap().htlc.unwrap();
    assert_eq!(triple_bytes(&htlc.hashlocks), canonical);

    // EVM: the deterministic contract id, which commits to the same 96
    // canonical bytes, recomputes to the entry the adapter holds.
    let evm_id = evm::htlc_id(&plan.leg(LegIndex::Leg3).spec, START_TIME);
    assert!(bed.evm_adapter.get_htlc(&evm_id).is_some());
}
