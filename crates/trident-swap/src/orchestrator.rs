//! Swap orchestration across the three rails.
//!
//! The orchestrator owns the secrets of the swaps it created and
//! drives each swap through the phase machine by submitting leg
//! operations to rail adapters and observing what the rails report
//! back. Phases only advance on observed chain state, never on the
//! act of submission, so a swap whose rail settles slowly (the ledger
//! confirms on block connection) simply stays in place until a later
//! tick sees the settlement.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use trident_chains::{retry_transport, AdapterRegistry, ChainError, LegRef, LegStatus};
use trident_core::config::{RetryConfig, SwapConfig, TridentConfig};
use trident_core::state_machine::{PhaseEvent, SwapPhase, SwapStateMachine};
use trident_core::types::{LegIndex, SwapId, TxId, UnixSeconds};
use trident_crypto::{SecretManager, SecretTriple};

use crate::error::SwapError;
use crate::events::SwapEvent;
use crate::plan::{LegDraft, SwapPlan, SwapPlanBuilder};

fn slot(index: LegIndex) -> usize {
    (index.position() - 1) as usize
}

/// Mutable tracking state for one swap.
struct SwapRun {
    plan: SwapPlan,
    secrets: SecretTriple,
    phase: SwapPhase,
    legs: [Option<LegRef>; 3],
    fund_txids: [Option<TxId>; 3],
    claim_txids: [Option<TxId>; 3],
    refund_txids: [Option<TxId>; 3],
    events: Vec<SwapEvent>,
}

impl SwapRun {
    fn new(plan: SwapPlan, secrets: SecretTriple) -> Self {
        Self {
            plan,
            secrets,
            phase: SwapPhase::Init,
            legs: [None, None, None],
            fund_txids: [None, None, None],
            claim_txids: [None, None, None],
            refund_txids: [None, None, None],
            events: Vec::new(),
        }
    }

    fn leg_ref(&self, index: LegIndex) -> Result<LegRef, SwapError> {
        self.legs[slot(index)]
            .clone()
            .ok_or(SwapError::LegNotOpened {
                swap: self.plan.id,
                index,
            })
    }

    fn emit(&mut self, event: SwapEvent) {
        tracing::info!(swap_id = %self.plan.id, event = ?event, "swap event");
        self.events.push(event);
    }
}

/// Drives swaps through their phases by talking to rail adapters.
///
/// `tick` is level-triggered: it looks at the current phase, performs
/// at most one submission per leg, then advances the phase for every
/// transition the observed chain state justifies. Ticking again with
/// nothing new to observe is a no-op, so a scheduler can poll on
/// `poll_interval_ms` without double-submitting.
///
/// Thread-safe: uses `DashMap` for concurrent access; each swap is
/// serialized behind its own async mutex.
pub struct SwapOrchestrator {
    registry: Arc<AdapterRegistry>,
    secrets: SecretManager,
    swap_config: SwapConfig,
    retry_config: RetryConfig,
    swaps: DashMap<SwapId, Arc<Mutex<SwapRun>>>,
}

impl SwapOrchestrator {
    /// Create an orchestrator over a set of registered rails.
    pub fn new(registry: Arc<AdapterRegistry>, config: &TridentConfig) -> Self {
        Self {
            registry,
            secrets: SecretManager::new(),
            swap_config: config.swap.clone(),
            retry_config: config.retry.clone(),
            swaps: DashMap::new(),
        }
    }

    /// Validate three leg drafts into a plan and start tracking the
    /// swap. The secret triple stays inside the orchestrator; observers
    /// see it only once a claim has already revealed it on-chain.
    pub fn create_swap(
        &self,
        drafts: [LegDraft; 3],
        now: UnixSeconds,
    ) -> Result<SwapId, SwapError> {
        let builder = SwapPlanBuilder::new(&self.secrets, self.swap_config.plan_ttl_secs);
        let (plan, secrets) = builder.build(drafts, now)?;
        let id = plan.id;
        let expires_at = plan.plan_expires_at;
        let mut run = SwapRun::new(plan, secrets);
        run.emit(SwapEvent::PlanCreated {
            swap: id,
            plan_expires_at: expires_at,
        });
        self.swaps.insert(id, Arc::new(Mutex::new(run)));
        Ok(id)
    }

    fn run(&self, id: SwapId) -> Result<Arc<Mutex<SwapRun>>, SwapError> {
        self.swaps
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(SwapError::SwapNotFound(id))
    }

    /// Current phase of a swap.
    pub async fn phase(&self, id: SwapId) -> Result<SwapPhase, SwapError> {
        Ok(self.run(id)?.lock().await.phase)
    }

    /// The validated plan of a swap.
    pub async fn plan(&self, id: SwapId) -> Result<SwapPlan, SwapError> {
        Ok(self.run(id)?.lock().await.plan.clone())
    }

    /// All events recorded for a swap so far, in order.
    pub async fn events(&self, id: SwapId) -> Result<Vec<SwapEvent>, SwapError> {
        Ok(self.run(id)?.lock().await.events.clone())
    }

    /// Advance a swap as far as current chain state allows and return
    /// the phase it settled on this tick.
    ///
    /// `now` is the orchestrator's clock, used only for the plan
    /// funding window; each rail keeps its own clock for timelocks.
    pub async fn tick(&self, id: SwapId, now: UnixSeconds) -> Result<SwapPhase, SwapError> {
        let run = self.run(id)?;
        let mut run = run.lock().await;
        loop {
            let before = run.phase;
            self.step(&mut run, now).await?;
            if run.phase == before {
                break;
            }
        }
        Ok(run.phase)
    }

    /// Sweep this swap's legs for expired contracts and refund them.
    ///
    /// Safe to call at any phase: legs that are unopened, still live or
    /// already settled are left alone, and a leg is refunded at most
    /// once. Returns the refunds submitted by this call.
    pub async fn refund_expired(&self, id: SwapId) -> Result<Vec<(LegIndex, TxId)>, SwapError> {
        let run = self.run(id)?;
        let mut run = run.lock().await;
        self.registry.check_expiry_all().await?;

        let mut refunded = Vec::new();
        for index in LegIndex::ALL {
            let leg = match &run.legs[slot(index)] {
                Some(leg) => leg.clone(),
                None => continue,
            };
            if run.refund_txids[slot(index)].is_some() {
                continue;
            }
            if self.leg_status(&leg).await? != LegStatus::Expired {
                continue;
            }
            run.emit(SwapEvent::LegExpired { swap: id, index });
            let txid = self.registry.refund(&leg).await?;
            run.refund_txids[slot(index)] = Some(txid.clone());
            run.emit(SwapEvent::LegRefunded {
                swap: id,
                index,
                txid: txid.clone(),
            });
            refunded.push((index, txid));
        }
        Ok(refunded)
    }

    async fn step(&self, run: &mut SwapRun, now: UnixSeconds) -> Result<(), SwapError> {
        match run.phase {
            SwapPhase::Init => {
                if self.abort_if_expired(run, now)? {
                    return Ok(());
                }
                self.open_leg(run, LegIndex::Leg1).await
            }
            SwapPhase::AwaitingFund(index) => {
                if self.abort_if_expired(run, now)? {
                    return Ok(());
                }
                self.drive_funding(run, index).await
            }
            SwapPhase::Funded(done) => {
                if self.abort_if_expired(run, now)? {
                    return Ok(());
                }
                match done.next() {
                    Some(next) => self.open_leg(run, next).await,
                    None => Ok(()),
                }
            }
            SwapPhase::AllFunded => {
                let secrets = run.secrets.clone();
                self.drive_claim(run, LegIndex::Leg1, &secrets).await
            }
            SwapPhase::Claimed(done) => match done.next() {
                Some(next) => {
                    // Claims propagate: the secrets for the next leg are
                    // read back from the previous leg's claim artifact,
                    // exactly as a liquidity provider would learn them.
                    let upstream = run.leg_ref(done)?;
                    let revealed = self.leg_reveal(&upstream).await?;
                    self.drive_claim(run, next, &revealed).await
                }
                None => {
                    self.advance(run, PhaseEvent::Completed)?;
                    run.emit(SwapEvent::SwapCompleted { swap: run.plan.id });
                    Ok(())
                }
            },
            SwapPhase::Completed | SwapPhase::ExpiredAborted => Ok(()),
        }
    }

    /// Expire-abort the plan if its funding window has closed.
    fn abort_if_expired(&self, run: &mut SwapRun, now: UnixSeconds) -> Result<bool, SwapError> {
        if !run.plan.is_expired(now) {
            return Ok(false);
        }
        self.advance(run, PhaseEvent::PlanExpired)?;
        tracing::warn!(swap_id = %run.plan.id, "plan expired before all legs were funded");
        run.emit(SwapEvent::PlanExpired { swap: run.plan.id });
        Ok(true)
    }

    async fn open_leg(&self, run: &mut SwapRun, index: LegIndex) -> Result<(), SwapError> {
        let spec = run.plan.leg(index).spec.clone();
        let leg = self.registry.create(spec).await?;
        run.legs[slot(index)] = Some(leg.clone());
        self.advance(run, PhaseEvent::LegOpened(index))?;
        run.emit(SwapEvent::LegOpened {
            swap: run.plan.id,
            index,
            leg,
        });
        Ok(())
    }

    async fn drive_funding(&self, run: &mut SwapRun, index: LegIndex) -> Result<(), SwapError> {
        let leg = run.leg_ref(index)?;
        if run.fund_txids[slot(index)].is_none() {
            // Submissions are never retried; a transport failure here
            // surfaces to the caller instead of risking a double spend.
            let txid = self.registry.fund(&leg).await?;
            run.fund_txids[slot(index)] = Some(txid);
        }
        if self.leg_status(&leg).await? == LegStatus::Active {
            self.advance(run, PhaseEvent::LegFunded(index))?;
            if let Some(txid) = run.fund_txids[slot(index)].clone() {
                run.emit(SwapEvent::LegFunded {
                    swap: run.plan.id,
                    index,
                    txid,
                });
            }
            if run.phase == SwapPhase::AllFunded {
                run.emit(SwapEvent::AllLegsFunded { swap: run.plan.id });
            }
        }
        Ok(())
    }

    async fn drive_claim(
        &self,
        run: &mut SwapRun,
        index: LegIndex,
        secrets: &SecretTriple,
    ) -> Result<(), SwapError> {
        let leg = run.leg_ref(index)?;
        if run.claim_txids[slot(index)].is_none() {
            let txid = self.registry.claim(&leg, secrets).await?;
            run.claim_txids[slot(index)] = Some(txid);
        }
        if self.leg_status(&leg).await? == LegStatus::Claimed {
            let revealed = self.leg_reveal(&leg).await?;
            self.advance(run, PhaseEvent::LegClaimed(index))?;
            if let Some(txid) = run.claim_txids[slot(index)].clone() {
                run.emit(SwapEvent::LegClaimed {
                    swap: run.plan.id,
                    index,
                    txid,
                    revealed,
                });
            }
        }
        Ok(())
    }

    async fn leg_status(&self, leg: &LegRef) -> Result<LegStatus, ChainError> {
        retry_transport("leg status", &self.retry_config, || {
            self.registry.status(leg)
        })
        .await
    }

    async fn leg_reveal(&self, leg: &LegRef) -> Result<SecretTriple, ChainError> {
        retry_transport("leg reveal", &self.retry_config, || {
            self.registry.reveal(leg)
        })
        .await
    }

    fn advance(&self, run: &mut SwapRun, event: PhaseEvent) -> Result<(), SwapError> {
        let next = SwapStateMachine::transition(run.phase, event)?;
        tracing::debug!(swap_id = %run.plan.id, from = %run.phase, to = %next, "phase transition");
        run.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trident_chains::adapters::{BtcAdapter, EvmAdapter};
    use trident_chains::SimChain;
    use trident_core::types::{Address, Amount, Asset, ChainId};

    fn draft(chain: ChainId, asset: Asset, timelock: UnixSeconds) -> LegDraft {
        LegDraft {
            chain,
            funder: Address::new("funder"),
            claimant: Address::new("claimant"),
            amount: Amount::new(75_000, asset),
            timelock,
            claim_address: Address::new("claim-dest"),
            refund_address: Address::new("refund-dest"),
        }
    }

    fn drafts() -> [LegDraft; 3] {
        [
            draft(ChainId::Btc, Asset::Btc, 5_000),
            draft(ChainId::Evm, Asset::Erc20("USDC".into()), 6_000),
            draft(ChainId::Btc, Asset::Btc, 7_000),
        ]
    }

    fn orchestrator() -> SwapOrchestrator {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(BtcAdapter::new(Arc::new(SimChain::with_clock(
            ChainId::Btc,
            100,
            1_000,
        )))));
        registry.register(Arc::new(EvmAdapter::new(Arc::new(SimChain::with_clock(
            ChainId::Evm,
            500,
            1_000,
        )))));
        SwapOrchestrator::new(Arc::new(registry), &TridentConfig::default())
    }

    #[tokio::test]
    async fn test_swap_runs_to_completion() {
        let orch = orchestrator();
        let id = orch.create_swap(drafts(), 1_000).unwrap();
        assert_eq!(orch.phase(id).await.unwrap(), SwapPhase::Init);

        // Both rails settle instantly, so a single tick walks the whole
        // open -> fund -> claim chain.
        let phase = orch.tick(id, 1_000).await.unwrap();
        assert_eq!(phase, SwapPhase::Completed);

        let events = orch.events(id).await.unwrap();
        assert!(matches!(events.first(), Some(SwapEvent::PlanCreated { .. })));
        assert!(matches!(events.last(), Some(SwapEvent::SwapCompleted { .. })));
        let funded = events
            .iter()
            .filter(|e| matches!(e, SwapEvent::LegFunded { .. }))
            .count();
        let claimed = events
            .iter()
            .filter(|e| matches!(e, SwapEvent::LegClaimed { .. }))
            .count();
        assert_eq!(funded, 3);
        assert_eq!(claimed, 3);
        assert!(events
            .iter()
            .any(|e| matches!(e, SwapEvent::AllLegsFunded { .. })));

        // Every claim revealed preimages for exactly the plan's hashlocks.
        let plan = orch.plan(id).await.unwrap();
        for event in &events {
            if let SwapEvent::LegClaimed { revealed, .. } = event {
                assert_eq!(revealed.hashlocks(), plan.hashlocks);
            }
        }
    }

    #[tokio::test]
    async fn test_tick_idles_once_final() {
        let orch = orchestrator();
        let id = orch.create_swap(drafts(), 1_000).unwrap();
        orch.tick(id, 1_000).await.unwrap();

        let events_before = orch.events(id).await.unwrap().len();
        let phase = orch.tick(id, 1_001).await.unwrap();
        assert_eq!(phase, SwapPhase::Completed);
        assert_eq!(orch.events(id).await.unwrap().len(), events_before);
    }

    #[tokio::test]
    async fn test_plan_expiry_aborts_unfunded_swap() {
        let orch = orchestrator();
        let id = orch.create_swap(drafts(), 1_000).unwrap();

        // Default TTL is 900s; the first tick arrives after the window.
        let phase = orch.tick(id, 2_000).await.unwrap();
        assert_eq!(phase, SwapPhase::ExpiredAborted);
        let events = orch.events(id).await.unwrap();
        assert!(matches!(events.last(), Some(SwapEvent::PlanExpired { .. })));

        // Final states stay final.
        assert_eq!(
            orch.tick(id, 3_000).await.unwrap(),
            SwapPhase::ExpiredAborted
        );
    }

    #[tokio::test]
    async fn test_rejects_unordered_timelocks() {
        let orch = orchestrator();
        let mut bad = drafts();
        bad[2].timelock = 5_500;
        let err = orch.create_swap(bad, 1_000).unwrap_err();
        assert!(matches!(err, SwapError::TimelockOrdering { .. }));
    }

    #[tokio::test]
    async fn test_unknown_swap_reported() {
        let orch = orchestrator();
        let err = orch.phase(SwapId::new()).await.unwrap_err();
        assert!(matches!(err, SwapError::SwapNotFound(_)));
    }

    #[tokio::test]
    async fn test_refunds_funded_leg_after_abort() {
        let btc = Arc::new(SimChain::with_clock(ChainId::Btc, 100, 1_000));
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(BtcAdapter::new(btc.clone())));
        let orch = SwapOrchestrator::new(Arc::new(registry), &TridentConfig::default());

        let id = orch.create_swap(drafts(), 1_000).unwrap();
        // Leg2's rail is not registered, so funding stalls after leg1.
        let err = orch.tick(id, 1_000).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::Chain(ChainError::AdapterNotRegistered(ChainId::Evm))
        ));
        assert_eq!(orch.phase(id).await.unwrap(), SwapPhase::Funded(LegIndex::Leg1));

        // The funding window closes, then leg1's own timelock passes.
        assert_eq!(orch.tick(id, 2_000).await.unwrap(), SwapPhase::ExpiredAborted);
        btc.advance_time(4_500);

        let refunded = orch.refund_expired(id).await.unwrap();
        assert_eq!(refunded.len(), 1);
        assert_eq!(refunded[0].0, LegIndex::Leg1);
        // A second sweep finds nothing left to do.
        assert!(orch.refund_expired(id).await.unwrap().is_empty());

        let events = orch.events(id).await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            SwapEvent::LegRefunded {
                index: LegIndex::Leg1,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_refund_sweep_ignores_settled_legs() {
        let orch = orchestrator();
        let id = orch.create_swap(drafts(), 1_000).unwrap();
        orch.tick(id, 1_000).await.unwrap();

        let refunded = orch.refund_expired(id).await.unwrap();
        assert!(refunded.is_empty());
    }
}
