//! Adversarial claims and the monetary audit: wrong preimages die on
//! every rail, burns mint exactly once, and the ledger invariants hold
//! at every connected height of a full swap.

use trident_chains::{ChainAdapter, ChainError, LegStatus};
use trident_core::error::ErrorKind;
use trident_core::state_machine::SwapPhase;
use trident_core::types::LegIndex;
use trident_crypto::SecretManager;
use trident_integration_tests::{lp1_m1, standard_drafts, Testbed, START_TIME};
use trident_ledger::{BurnStatus, LedgerError, LedgerTx};
use trident_swap::SwapPlanBuilder;

#[tokio::test]
async fn test_wrong_preimages_rejected_on_every_rail() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-f", &lp1_m1(), 100_010);

    let manager = SecretManager::new();
    let (plan, secrets) = SwapPlanBuilder::new(&manager, 900)
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

    // Two of the three preimages are right; lp2's is not.
    let mut bad = secrets.clone();
    let (other, _) = manager.generate();
    bad.lp2 = other;

    let e1 = bed.btc_adapter.claim(&leg1, &bad).await.unwrap_err();
    let e2 = bed.m1_adapter.claim(&leg2, &bad).await.unwrap_err();
    let e3 = bed.evm_adapter.claim(&leg3, &bad).await.unwrap_err();
    for err in [&e1, &e2, &e3] {
        assert_eq!(
            err.kind(),
            ErrorKind::ProofInvalid,
            "wrong preimage must be a proof error, got: {err}"
        );
    }
    // The BTC and EVM adapters name the failing role; the M1 rejection
    // comes from the ledger itself.
    assert!(matches!(e1, ChainError::PreimageMismatch { role: "lp2", .. }));
    assert!(matches!(e2, ChainError::Ledger(_)));
    assert!(matches!(e3, ChainError::PreimageMismatch { role: "lp2", .. }));

    // Nothing settled, and the honest triple still claims every leg.
    assert_eq!(bed.btc_adapter.status(&leg1).await.unwrap(), LegStatus::Active);
    assert_eq!(bed.m1_adapter.status(&leg2).await.unwrap(), LegStatus::Active);
    assert_eq!(bed.evm_adapter.status(&leg3).await.unwrap(), LegStatus::Active);

    bed.btc_adapter.claim(&leg1, &secrets).await.unwrap();
    bed.m1_adapter.claim(&leg2, &secrets).await.unwrap();
    bed.m1.connect_block().unwrap();
    bed.evm_adapter.claim(&leg3, &secrets).await.unwrap();
    assert_eq!(bed.btc_adapter.status(&leg1).await.unwrap(), LegStatus::Claimed);
    assert_eq!(bed.m1_adapter.status(&leg2).await.unwrap(), LegStatus::Claimed);
    assert_eq!(bed.evm_adapter.status(&leg3).await.unwrap(), LegStatus::Claimed);
}

#[test]
fn test_burn_claims_mint_exactly_once() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-g", &lp1_m1(), 40_000);
    assert_eq!(bed.m1.balance(&lp1_m1()), 40_000);
    assert_eq!(
        bed.m1.burn_record("btc-burn-g").unwrap().status,
        BurnStatus::Minted
    );

    // Replaying the same BTC txid is refused at admission.
    let err = bed
        .m1
        .submit(LedgerTx::BurnClaim {
            btc_txid: "btc-burn-g".into(),
            btc_height: 2,
            dest: lp1_m1(),
            burned_sats: 40_000,
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateBurnClaim(_)));

    // Further blocks never re-mint.
    for _ in 0..3 {
        let summary = bed.m1.connect_block().unwrap();
        assert_eq!(summary.minted_sats, 0);
    }
    assert_eq!(bed.m1.balance(&lp1_m1()), 40_000);
    assert_eq!(bed.m1.audit().finalized_burn_total, 40_000);
}

#[tokio::test]
async fn test_monetary_invariants_hold_at_every_height() {
    let bed = Testbed::new();
    bed.fund_m0("btc-burn-h", &lp1_m1(), 100_010);
    let id = bed
        .orchestrator
        .create_swap(standard_drafts(), START_TIME)
        .unwrap();

    let mut phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    for _ in 0..4 {
        let summary = bed.m1.connect_block().unwrap();
        assert!(!summary.halted);
        let audit = bed.m1.audit();
        assert_eq!(audit.m0_liquid + audit.m0_vaulted, audit.finalized_burn_total);
        assert_eq!(audit.m0_vaulted, audit.m1_supply);
        phase = bed.orchestrator.tick(id, START_TIME).await.unwrap();
    }
    assert_eq!(phase, SwapPhase::Completed);

    // A reconcile on a healthy chain is a no-op that stays healthy.
    assert!(bed.m1.reconcile().unwrap());
}
