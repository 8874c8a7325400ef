//! Swap plan construction.
//!
//! A plan fixes everything the three rails need before any coin moves:
//! which chain each leg lives on, who funds and who claims, the three
//! hashlocks shared by every leg, and a strictly increasing timelock
//! per leg. Secrets are generated here and handed back exactly once;
//! the plan itself carries only hashlocks.

use serde::{Deserialize, Serialize};

use trident_chains::LegSpec;
use trident_core::types::{Address, Amount, ChainId, LegIndex, SwapId, UnixSeconds};
use trident_crypto::{HashlockTriple, SecretManager, SecretTriple};

use crate::error::SwapError;

/// One leg as the counterparties negotiate it, before any secrets
/// exist. The builder turns three drafts into a [`SwapPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegDraft {
    pub chain: ChainId,
    pub funder: Address,
    pub claimant: Address,
    pub amount: Amount,
    pub timelock: UnixSeconds,
    pub claim_address: Address,
    pub refund_address: Address,
}

impl LegDraft {
    fn into_spec(self, hashlocks: HashlockTriple) -> LegSpec {
        LegSpec {
            chain: self.chain,
            funder: self.funder,
            claimant: self.claimant,
            amount: self.amount,
            hashlocks,
            timelock: self.timelock,
            claim_address: self.claim_address,
            refund_address: self.refund_address,
        }
    }
}

/// One leg of a validated plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegPlan {
    pub index: LegIndex,
    pub spec: LegSpec,
}

/// A validated three-leg swap plan. All legs share the same hashlock
/// triple; timelocks increase strictly from leg1 to leg3 so every
/// upstream refund window opens before the downstream one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapPlan {
    pub id: SwapId,
    pub hashlocks: HashlockTriple,
    pub legs: [LegPlan; 3],
    pub created_at: UnixSeconds,
    /// After this instant the plan may no longer start funding new legs.
    pub plan_expires_at: UnixSeconds,
}

impl SwapPlan {
    /// The plan entry for one leg position.
    pub fn leg(&self, index: LegIndex) -> &LegPlan {
        &self.legs[(index.position() - 1) as usize]
    }

    /// Whether the funding window has closed.
    pub fn is_expired(&self, now: UnixSeconds) -> bool {
        now >= self.plan_expires_at
    }
}

/// Builds plans from drafts: validates ordering, generates a fresh
/// secret triple and binds its hashlocks against reuse.
pub struct SwapPlanBuilder<'a> {
    secrets: &'a SecretManager,
    plan_ttl_secs: u64,
}

impl<'a> SwapPlanBuilder<'a> {
    pub fn new(secrets: &'a SecretManager, plan_ttl_secs: u64) -> Self {
        Self {
            secrets,
            plan_ttl_secs,
        }
    }

    /// Validate three drafts and produce a plan plus the secret triple
    /// behind its hashlocks. The triple is returned only here; callers
    /// decide who gets to hold it.
    pub fn build(
        &self,
        drafts: [LegDraft; 3],
        now: UnixSeconds,
    ) -> Result<(SwapPlan, SecretTriple), SwapError> {
        let [d1, d2, d3] = &drafts;
        if !(d1.timelock < d2.timelock && d2.timelock < d3.timelock) {
            return Err(SwapError::TimelockOrdering {
                leg1: d1.timelock,
                leg2: d2.timelock,
                leg3: d3.timelock,
            });
        }
        for (index, draft) in LegIndex::ALL.into_iter().zip(&drafts) {
            if draft.amount.is_zero() {
                return Err(SwapError::NonPositiveAmount(index));
            }
            if draft.timelock <= now {
                return Err(SwapError::TimelockNotFuture {
                    leg: index,
                    timelock: draft.timelock,
                    now,
                });
            }
        }

        let (triple, hashlocks) = self.secrets.generate_triple();
        self.secrets.bind(&hashlocks)?;

        let [d1, d2, d3] = drafts;
        let plan = SwapPlan {
            id: SwapId::new(),
            hashlocks,
            legs: [
                LegPlan {
                    index: LegIndex::Leg1,
                    spec: d1.into_spec(hashlocks),
                },
                LegPlan {
                    index: LegIndex::Leg2,
                    spec: d2.into_spec(hashlocks),
                },
                LegPlan {
                    index: LegIndex::Leg3,
                    spec: d3.into_spec(hashlocks),
                },
            ],
            created_at: now,
            plan_expires_at: now.saturating_add(self.plan_ttl_secs),
        };
        tracing::info!(
            swap_id = %plan.id,
            expires_at = plan.plan_expires_at,
            "swap plan created"
        );
        Ok((plan, triple))
    }
}
