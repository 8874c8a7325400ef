//! Abort and refund paths: closed funding windows, strict timelock
//! ordering, and the per-rail refusal of premature refunds.

use trident_chains::{ChainAdapter, ChainError};
use trident_core::error::ErrorKind;
use trident_core::state_machine::SwapPhase;
use trident_core::types::LegIndex;
use trident_crypto::SecretManager;
use trident_integration_tests::{lp1_m1, standard_drafts, Testbed, START_TIME, T1, T2};
use trident_swap::{SwapError, SwapEvent, SwapPlanBuilder};

#[tokio::test]
async fn test_misordered_timelocks_never_reach_a_rail() {
    let bed = Testbed::new();
    let mut drafts = standard_drafts();
    drafts[0].timelock = drafts[2].timelock;

    let err = bed
        .orchestrator
        .create_swap(drafts, START_TIME)
        .unwrap_err();
    assert!(matches!(err, SwapError::TimelockOrdering { .. }));
    // Nothing was submitted anywhere.
    assert_eq!(bed.m1.height(), 0);
}

#[tokio::test]
async fn test_closed_funding_window_aborts_and_refunds() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-d", &lp1_m1(), 100_010);
    let id = bed
        .orchestrator
        .create_swap(standard_drafts(), START_TIME)
        .unwrap();

    // BTC funds instantly; the M1 funding is still in the mempool when
    // the tick parks.
    let phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    assert_eq!(phase, SwapPhase::AwaitingFund(LegIndex::Leg2));

    // The M1 lock lands on-chain anyway, then the window closes before
    // the orchestrator looks again.
    bed.m1.connect_block().unwrap();
    let ttl = bed.config.swap.plan_ttl_secs;
    let phase = bed.orchestrator.tick(id, START_TIME + ttl).await.unwrap();
    assert_eq!(phase, SwapPhase::ExpiredAborted);

    // Nothing is refundable while the leg timelocks are live.
    assert!(bed.orchestrator.refund_expired(id).await.unwrap().is_empty());

    // Both funded rails pass their timelocks; the sweep refunds both.
    bed.btc.advance_time(T1 - START_TIME + 1);
    bed.m1.advance_time(T2 - START_TIME + 1);
    let refunded = bed.orchestrator.refund_expired(id).await.unwrap();
    let legs: Vec<LegIndex> = refunded.iter().map(|(index, _)| *index).collect();
    assert_eq!(legs, vec![LegIndex::Leg1, LegIndex::Leg2]);

    // The ledger refund applies at the next connect; the vaulted value
    // survives under a fresh receipt for LP1 and the audit balances.
    bed.m1.connect_block().unwrap();
    let audit = bed.m1.audit();
    assert_eq!(audit.m0_vaulted, 100_000);
    assert_eq!(audit.m0_vaulted, audit.m1_supply);
    assert!(!bed.m1.is_halted());

    // The sweep is idempotent.
    assert!(bed.orchestrator.refund_expired(id).await.unwrap().is_empty());

    let events = bed.orchestrator.events(id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, SwapEvent::PlanExpired { .. })));
    let refund_events: Vec<LegIndex> = events
        .iter()
        .filter_map(|e| match e {
            SwapEvent::LegRefunded { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(refund_events, vec![LegIndex::Leg1, LegIndex::Leg2]);
}

#[tokio::test]
async fn test_live_legs_refuse_early_refunds_on_every_rail() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-e", &lp1_m1(), 100_010);

    // Adapter-level legs from one validated plan, so the refusals come
    // from the rails themselves rather than orchestrator scheduling.
    let manager = SecretManager::new();
    let (plan, _secrets) = SwapPlanBuilder::new(&manager, 900)
        .build(standard_drafts(), START_TIME)
        .unwrap();

    let leg1 = bed
        .btc_adapter
        .create(plan.leg(LegIndex::Leg1).spec.clone())
        .await
        .unwrap();
    bed.btc_adapter.fund(&leg1).await.unwrap();
    let leg2 = bed
        .m1_adapter
        .create(plan.leg(LegIndex::Leg2).spec.clone())
        .await
        .unwrap();
    bed.m1_adapter.fund(&leg2).await.unwrap();
    bed.m1.connect_block().unwrap();
    let leg3 = bed
        .evm_adapter
        .create(plan.leg(LegIndex::Leg3).spec.clone())
        .await
        .unwrap();
    bed.evm_adapter.fund(&leg3).await.unwrap();

    let e1 = bed.btc_adapter.refund(&leg1).await.unwrap_err();
    let e2 = bed.m1_adapter.refund(&leg2).await.unwrap_err();
    let e3 = bed.evm_adapter.refund(&leg3).await.unwrap_err();
    for err in [&e1, &e2, &e3] {
        assert_eq!(
            err.kind(),
            ErrorKind::Timing,
            "premature refund must be a timing error, got: {err}"
        );
    }
    // BTC and EVM refuse in the adapter; M1 refuses in the ledger.
    assert!(matches!(e1, ChainError::TimelockNotExpired(_)));
    assert!(matches!(e2, ChainError::Ledger(_)));
    assert!(matches!(e3, ChainError::TimelockNotExpired(_)));
}
