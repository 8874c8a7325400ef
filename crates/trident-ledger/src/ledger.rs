use std::collections::HashMap;

use trident_core::config::LedgerConfig;
use trident_core::types::{Address, BlockHeight, UnixSeconds};
use trident_crypto::{HashlockTriple, SecretTriple};

use crate::error::LedgerError;
use crate::types::{LedgerTx, Outpoint, Receipt, ReceiptHtlc};

/// The M0/M1 settlement ledger.
///
/// M0 is liquid base money held in `balances`; M1 is the set of
/// outstanding receipts. Lock destroys M0 and mints a receipt of equal
/// amount, Unlock does the reverse, so the vaulted counter and the
/// receipt set must agree at all times.
///
/// All mutation goes through [`SettlementLedger::apply_tx`] (plus the
/// crate-internal mint path fed by the burn pipeline), called only at
/// block-connect time by a single sequential writer. There is no
/// interior locking here on purpose.
#[derive(Debug, Clone)]
pub struct SettlementLedger {
    /// Liquid M0 balances.
    balances: HashMap<Address, u64>,
    /// Outstanding M1 receipts.
    receipts: HashMap<Outpoint, Receipt>,
    /// M0 destroyed via Lock and not yet returned via Unlock.
    vaulted: u64,
    /// Total M0 ever minted from finalized burns.
    minted_total: u64,
    /// Account credited with fees. Fees move inside M0, never out of it.
    fee_collector: Address,
    /// Flat fee for Transfer, Lock and Unlock.
    fee: u64,
    /// Fee-exempt settlement ops allowed per receipt per block.
    settlement_ops_per_receipt: u32,
    /// Per-receipt settlement-op marks for the current heights.
    op_marks: HashMap<Outpoint, (BlockHeight, u32)>,
    /// Set after a consensus invariant violation; blocks Lock and mint
    /// until reconciled.
    halted: bool,
}

impl SettlementLedger {
    /// Create an empty ledger. All M0 enters through burn mints.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            balances: HashMap::new(),
            receipts: HashMap::new(),
            vaulted: 0,
            minted_total: 0,
            fee_collector: Address::new(config.fee_collector.clone()),
            fee: config.fee,
            settlement_ops_per_receipt: config.settlement_ops_per_receipt,
            op_marks: HashMap::new(),
            halted: false,
        }
    }

    /// Apply one transaction. Either the full effect lands or none of
    /// it does; every check runs before the first write.
    ///
    /// Burn claims and mints route through the burn pipeline at the
    /// block-connect layer, not here.
    pub fn apply_tx(
        &mut self,
        tx: &LedgerTx,
        height: BlockHeight,
        now: UnixSeconds,
    ) -> Result<(), LedgerError> {
        match tx {
            LedgerTx::Transfer { from, to, amount } => self.transfer(from, to, *amount),
            LedgerTx::Lock {
                owner,
                amount,
                outpoint,
            } => self.lock(owner, *amount, *outpoint),
            LedgerTx::Unlock { outpoint } => self.unlock(*outpoint),
            LedgerTx::HtlcCreate3s {
                outpoint,
                hashlocks,
                timelock,
                claim_to,
                refund_to,
            } => self.htlc_create(
                *outpoint,
                hashlocks,
                *timelock,
                claim_to.clone(),
                refund_to.clone(),
                height,
                now,
            ),
            LedgerTx::HtlcClaim3s {
                outpoint,
                new_outpoint,
                secrets,
            } => self.htlc_claim(*outpoint, *new_outpoint, secrets, height, now),
            LedgerTx::HtlcRefund3s {
                outpoint,
                new_outpoint,
            } => self.htlc_refund(*outpoint, *new_outpoint, height, now),
            LedgerTx::BurnClaim { .. } | LedgerTx::MintM0Btc { .. } => Err(
                LedgerError::MalformedBurnClaim("routed outside the burn pipeline".into()),
            ),
        }
    }

    /// Validate a transaction against current state without mutating
    /// it. Used for mempool admission; block connect re-validates.
    pub fn dry_run(
        &self,
        tx: &LedgerTx,
        height: BlockHeight,
        now: UnixSeconds,
    ) -> Result<(), LedgerError> {
        let mut probe = self.clone();
        probe.apply_tx(tx, height, now)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let required = amount.checked_add(self.fee).ok_or(LedgerError::Overflow)?;
        let available = self.balance(from);
        if available < required {
            return Err(LedgerError::InsufficientBalance {
                address: from.clone(),
                available,
                required,
            });
        }

        self.balances.insert(from.clone(), available - required);
        self.credit(to.clone(), amount)?;
        let collector = self.fee_collector.clone();
        self.credit(collector, self.fee)?;

        tracing::debug!(from = %from, to = %to, amount, "M0 transfer applied");
        Ok(())
    }

    fn lock(&mut self, owner: &Address, amount: u64, outpoint: Outpoint) -> Result<(), LedgerError> {
        if self.halted {
            return Err(LedgerError::Halted);
        }
        if amount == 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        if self.receipts.contains_key(&outpoint) {
            return Err(LedgerError::ReceiptExists(outpoint));
        }
        let required = amount.checked_add(self.fee).ok_or(LedgerError::Overflow)?;
        let available = self.balance(owner);
        if available < required {
            return Err(LedgerError::InsufficientBalance {
                address: owner.clone(),
                available,
                required,
            });
        }

        self.balances.insert(owner.clone(), available - required);
        let collector = self.fee_collector.clone();
        self.credit(collector, self.fee)?;
        self.vaulted = self.vaulted.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.receipts.insert(
            outpoint,
            Receipt {
                outpoint,
                amount,
                owner: owner.clone(),
                unlockable: true,
                htlc: None,
            },
        );

        tracing::info!(outpoint = %outpoint, owner = %owner, amount, "M0 locked into M1 receipt");
        Ok(())
    }

    fn unlock(&mut self, outpoint: Outpoint) -> Result<(), LedgerError> {
        let receipt = self
            .receipts
            .get(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        if !receipt.unlockable || receipt.htlc.is_some() {
            return Err(LedgerError::ReceiptAlreadyLocked(outpoint));
        }
        if receipt.amount <= self.fee {
            return Err(LedgerError::FeeExceedsValue(outpoint));
        }
        let owner = receipt.owner.clone();
        let amount = receipt.amount;

        self.receipts.remove(&outpoint);
        self.vaulted = self.vaulted.checked_sub(amount).ok_or(LedgerError::Overflow)?;
        self.credit(owner.clone(), amount - self.fee)?;
        let collector = self.fee_collector.clone();
        self.credit(collector, self.fee)?;

        tracing::info!(outpoint = %outpoint, owner = %owner, amount, "M1 receipt unlocked to M0");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn htlc_create(
        &mut self,
        outpoint: Outpoint,
        hashlocks: &HashlockTriple,
        timelock: UnixSeconds,
        claim_to: Address,
        refund_to: Address,
        height: BlockHeight,
        now: UnixSeconds,
    ) -> Result<(), LedgerError> {
        if hashlocks.any_zero() {
            return Err(LedgerError::ZeroHashlock);
        }
        if timelock <= now {
            return Err(LedgerError::TimelockNotFuture { timelock, now });
        }
        let receipt = self
            .receipts
            .get(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        if receipt.htlc.is_some() {
            return Err(LedgerError::ReceiptAlreadyLocked(outpoint));
        }
        self.mark_settlement_ops(&[outpoint], height)?;

        let receipt = self
            .receipts
            .get_mut(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        receipt.unlockable = false;
        receipt.htlc = Some(ReceiptHtlc {
            hashlocks: *hashlocks,
            timelock,
            claim_to: claim_to.clone(),
            refund_to,
        });

        tracing::info!(outpoint = %outpoint, claim_to = %claim_to, timelock, "receipt HTLC created");
        Ok(())
    }

    fn htlc_claim(
        &mut self,
        outpoint: Outpoint,
        new_outpoint: Outpoint,
        secrets: &SecretTriple,
        height: BlockHeight,
        now: UnixSeconds,
    ) -> Result<(), LedgerError> {
        let receipt = self
            .receipts
            .get(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        let htlc = receipt
            .htlc
            .as_ref()
            .ok_or(LedgerError::ReceiptNotLocked(outpoint))?;
        if now >= htlc.timelock {
            return Err(LedgerError::HtlcExpired(outpoint));
        }
        if !htlc.hashlocks.all_match(secrets) {
            return Err(LedgerError::PreimageMismatch(outpoint));
        }
        if self.receipts.contains_key(&new_outpoint) {
            return Err(LedgerError::ReceiptExists(new_outpoint));
        }
        self.mark_settlement_ops(&[outpoint, new_outpoint], height)?;

        let claimed = self
            .receipts
            .remove(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        let claim_to = claimed
            .htlc
            .as_ref()
            .map(|h| h.claim_to.clone())
            .ok_or(LedgerError::ReceiptNotLocked(outpoint))?;
        self.receipts.insert(
            new_outpoint,
            Receipt {
                outpoint: new_outpoint,
                amount: claimed.amount,
                owner: claim_to.clone(),
                unlockable: true,
                htlc: None,
            },
        );

        tracing::info!(
            outpoint = %outpoint,
            new_outpoint = %new_outpoint,
            claim_to = %claim_to,
            "receipt HTLC claimed"
        );
        Ok(())
    }

    fn htlc_refund(
        &mut self,
        outpoint: Outpoint,
        new_outpoint: Outpoint,
        height: BlockHeight,
        now: UnixSeconds,
    ) -> Result<(), LedgerError> {
        let receipt = self
            .receipts
            .get(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        let htlc = receipt
            .htlc
            .as_ref()
            .ok_or(LedgerError::ReceiptNotLocked(outpoint))?;
        if now < htlc.timelock {
            return Err(LedgerError::HtlcNotExpired(outpoint));
        }
        if self.receipts.contains_key(&new_outpoint) {
            return Err(LedgerError::ReceiptExists(new_outpoint));
        }
        self.mark_settlement_ops(&[outpoint, new_outpoint], height)?;

        let refunded = self
            .receipts
            .remove(&outpoint)
            .ok_or(LedgerError::ReceiptNotFound(outpoint))?;
        let refund_to = refunded
            .htlc
            .as_ref()
            .map(|h| h.refund_to.clone())
            .ok_or(LedgerError::ReceiptNotLocked(outpoint))?;
        self.receipts.insert(
            new_outpoint,
            Receipt {
                outpoint: new_outpoint,
                amount: refunded.amount,
                owner: refund_to.clone(),
                unlockable: true,
                htlc: None,
            },
        );

        tracing::info!(
            outpoint = %outpoint,
            new_outpoint = %new_outpoint,
            refund_to = %refund_to,
            "receipt HTLC refunded"
        );
        Ok(())
    }

    /// Mint M0 for a finalized burn. Only the block-connect layer calls
    /// this, and only with an authorization handed out by the burn
    /// pipeline's single mint transition.
    pub(crate) fn mint_m0(&mut self, dest: &Address, sats: u64) -> Result<(), LedgerError> {
        if self.halted {
            return Err(LedgerError::Halted);
        }
        // Validate both counters before writing either.
        let new_balance = self
            .balance(dest)
            .checked_add(sats)
            .ok_or(LedgerError::Overflow)?;
        let new_minted = self
            .minted_total
            .checked_add(sats)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(dest.clone(), new_balance);
        self.minted_total = new_minted;

        tracing::info!(dest = %dest, sats, "M0 minted for finalized burn");
        Ok(())
    }

    /// Check and record the per-receipt settlement-op marks for this
    /// block. Rejects before marking anything.
    fn mark_settlement_ops(
        &mut self,
        outpoints: &[Outpoint],
        height: BlockHeight,
    ) -> Result<(), LedgerError> {
        for outpoint in outpoints {
            if let Some((marked_height, count)) = self.op_marks.get(outpoint) {
                if *marked_height == height && *count >= self.settlement_ops_per_receipt {
                    return Err(LedgerError::SettlementRateLimited(*outpoint));
                }
            }
        }
        for outpoint in outpoints {
            let mark = self.op_marks.entry(*outpoint).or_insert((height, 0));
            if mark.0 != height {
                *mark = (height, 0);
            }
            mark.1 += 1;
        }
        Ok(())
    }

    fn credit(&mut self, address: Address, amount: u64) -> Result<(), LedgerError> {
        let balance = self.balances.entry(address).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Liquid M0 balance of one account.
    pub fn balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Total liquid M0, summed over all accounts.
    pub fn m0_liquid(&self) -> u64 {
        self.balances.values().sum()
    }

    /// M0 destroyed via Lock and still vaulted.
    pub fn m0_vaulted(&self) -> u64 {
        self.vaulted
    }

    /// Total M0: liquid plus vaulted.
    pub fn m0_total(&self) -> u64 {
        self.m0_liquid() + self.vaulted
    }

    /// Outstanding M1, summed over the actual receipt set rather than
    /// any counter, so audits compare independent derivations.
    pub fn m1_supply(&self) -> u64 {
        self.receipts.values().map(|r| r.amount).sum()
    }

    /// Total M0 ever minted from burns.
    pub fn minted_total(&self) -> u64 {
        self.minted_total
    }

    /// Look up a receipt.
    pub fn receipt(&self, outpoint: &Outpoint) -> Option<Receipt> {
        self.receipts.get(outpoint).cloned()
    }

    /// Number of outstanding receipts.
    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }

    /// The fee collector account.
    pub fn fee_collector(&self) -> &Address {
        &self.fee_collector
    }

    /// Whether the ledger is halted pending reconciliation.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn clear_halt(&mut self) {
        self.halted = false;
    }

    #[cfg(test)]
    pub(crate) fn force_vaulted(&mut self, vaulted: u64) {
        self.vaulted = vaulted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trident_crypto::SecretManager;

    fn alice() -> Address {
        Address::new("m1-alice")
    }

    fn bob() -> Address {
        Address::new("m1-bob")
    }

    fn funded_ledger() -> SettlementLedger {
        let mut ledger = SettlementLedger::new(&LedgerConfig::default());
        ledger.mint_m0(&alice(), 100_000).unwrap();
        ledger
    }

    fn locked_receipt(ledger: &mut SettlementLedger, amount: u64) -> Outpoint {
        let outpoint = Outpoint::new();
        ledger
            .apply_tx(
                &LedgerTx::Lock {
                    owner: alice(),
                    amount,
                    outpoint,
                },
                1,
                1_000,
            )
            .unwrap();
        outpoint
    }

    fn htlc_on_receipt(
        ledger: &mut SettlementLedger,
        outpoint: Outpoint,
        timelock: UnixSeconds,
    ) -> trident_crypto::SecretTriple {
        let manager = SecretManager::new();
        let (secrets, hashlocks) = manager.generate_triple();
        ledger
            .apply_tx(
                &LedgerTx::HtlcCreate3s {
                    outpoint,
                    hashlocks,
                    timelock,
                    claim_to: bob(),
                    refund_to: alice(),
                },
                2,
                1_000,
            )
            .unwrap();
        secrets
    }

    #[test]
    fn test_transfer_moves_value_and_fee() {
        let mut ledger = funded_ledger();
        ledger
            .apply_tx(
                &LedgerTx::Transfer {
                    from: alice(),
                    to: bob(),
                    amount: 1_000,
                },
                1,
                0,
            )
            .unwrap();

        assert_eq!(ledger.balance(&alice()), 100_000 - 1_000 - 10);
        assert_eq!(ledger.balance(&bob()), 1_000);
        assert_eq!(ledger.balance(ledger.fee_collector()), 10);
        // Fees stay liquid; total M0 unchanged
        assert_eq!(ledger.m0_total(), 100_000);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = funded_ledger();
        let result = ledger.apply_tx(
            &LedgerTx::Transfer {
                from: bob(),
                to: alice(),
                amount: 1,
            },
            1,
            0,
        );
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_transfer_zero_amount_rejected() {
        let mut ledger = funded_ledger();
        let result = ledger.apply_tx(
            &LedgerTx::Transfer {
                from: alice(),
                to: bob(),
                amount: 0,
            },
            1,
            0,
        );
        assert!(matches!(result, Err(LedgerError::NonPositiveAmount)));
    }

    #[test]
    fn test_lock_mints_receipt_and_vaults() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 40_000);

        let receipt = ledger.receipt(&outpoint).unwrap();
        assert_eq!(receipt.amount, 40_000);
        assert_eq!(receipt.owner, alice());
        assert!(receipt.unlockable);

        assert_eq!(ledger.balance(&alice()), 100_000 - 40_000 - 10);
        assert_eq!(ledger.m0_vaulted(), 40_000);
        assert_eq!(ledger.m1_supply(), 40_000);
        assert_eq!(ledger.m0_total(), 100_000);
    }

    #[test]
    fn test_lock_duplicate_outpoint_rejected() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 1_000);
        let result = ledger.apply_tx(
            &LedgerTx::Lock {
                owner: alice(),
                amount: 1_000,
                outpoint,
            },
            1,
            1_000,
        );
        assert!(matches!(result, Err(LedgerError::ReceiptExists(_))));
    }

    #[test]
    fn test_unlock_returns_m0_minus_fee() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 40_000);
        ledger
            .apply_tx(&LedgerTx::Unlock { outpoint }, 2, 1_000)
            .unwrap();

        assert!(ledger.receipt(&outpoint).is_none());
        assert_eq!(ledger.m0_vaulted(), 0);
        assert_eq!(ledger.m1_supply(), 0);
        // Two fees paid so far: one on lock, one on unlock
        assert_eq!(ledger.balance(&alice()), 100_000 - 20);
        assert_eq!(ledger.balance(ledger.fee_collector()), 20);
        assert_eq!(ledger.m0_total(), 100_000);
    }

    #[test]
    fn test_unlock_htlc_locked_receipt_rejected() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let result = ledger.apply_tx(&LedgerTx::Unlock { outpoint }, 3, 1_000);
        assert!(matches!(result, Err(LedgerError::ReceiptAlreadyLocked(_))));
    }

    #[test]
    fn test_htlc_create_locks_receipt() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let receipt = ledger.receipt(&outpoint).unwrap();
        assert!(!receipt.unlockable);
        let htlc = receipt.htlc.unwrap();
        assert_eq!(htlc.claim_to, bob());
        assert_eq!(htlc.timelock, 10_000);
    }

    #[test]
    fn test_htlc_create_rejects_past_timelock() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let manager = SecretManager::new();
        let (_, hashlocks) = manager.generate_triple();
        let result = ledger.apply_tx(
            &LedgerTx::HtlcCreate3s {
                outpoint,
                hashlocks,
                timelock: 500,
                claim_to: bob(),
                refund_to: alice(),
            },
            2,
            1_000,
        );
        assert!(matches!(result, Err(LedgerError::TimelockNotFuture { .. })));
    }

    #[test]
    fn test_htlc_create_rejects_zero_hashlock() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let manager = SecretManager::new();
        let (_, mut hashlocks) = manager.generate_triple();
        hashlocks.lp1 = trident_crypto::Hashlock::from_bytes([0u8; 32]);
        let result = ledger.apply_tx(
            &LedgerTx::HtlcCreate3s {
                outpoint,
                hashlocks,
                timelock: 10_000,
                claim_to: bob(),
                refund_to: alice(),
            },
            2,
            1_000,
        );
        assert!(matches!(result, Err(LedgerError::ZeroHashlock)));
    }

    #[test]
    fn test_htlc_claim_mints_fresh_receipt() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let secrets = htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let new_outpoint = Outpoint::new();
        ledger
            .apply_tx(
                &LedgerTx::HtlcClaim3s {
                    outpoint,
                    new_outpoint,
                    secrets,
                },
                3,
                2_000,
            )
            .unwrap();

        assert!(ledger.receipt(&outpoint).is_none());
        let fresh = ledger.receipt(&new_outpoint).unwrap();
        assert_eq!(fresh.owner, bob());
        assert_eq!(fresh.amount, 5_000);
        assert!(fresh.unlockable);
        // M1 supply conserved across the claim
        assert_eq!(ledger.m1_supply(), 5_000);
        assert_eq!(ledger.m0_vaulted(), 5_000);
    }

    #[test]
    fn test_htlc_claim_wrong_secret_rejected() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let mut secrets = htlc_on_receipt(&mut ledger, outpoint, 10_000);
        secrets.lp2 = trident_crypto::Secret::from_bytes([9u8; 32]);

        let result = ledger.apply_tx(
            &LedgerTx::HtlcClaim3s {
                outpoint,
                new_outpoint: Outpoint::new(),
                secrets,
            },
            3,
            2_000,
        );
        assert!(matches!(result, Err(LedgerError::PreimageMismatch(_))));
        // Receipt untouched
        assert!(ledger.receipt(&outpoint).unwrap().htlc.is_some());
    }

    #[test]
    fn test_htlc_claim_after_expiry_rejected() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let secrets = htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let result = ledger.apply_tx(
            &LedgerTx::HtlcClaim3s {
                outpoint,
                new_outpoint: Outpoint::new(),
                secrets,
            },
            3,
            10_000,
        );
        assert!(matches!(result, Err(LedgerError::HtlcExpired(_))));
    }

    #[test]
    fn test_htlc_refund_before_expiry_rejected() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let result = ledger.apply_tx(
            &LedgerTx::HtlcRefund3s {
                outpoint,
                new_outpoint: Outpoint::new(),
            },
            3,
            9_999,
        );
        assert!(matches!(result, Err(LedgerError::HtlcNotExpired(_))));
    }

    #[test]
    fn test_htlc_refund_after_expiry() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let new_outpoint = Outpoint::new();
        ledger
            .apply_tx(
                &LedgerTx::HtlcRefund3s {
                    outpoint,
                    new_outpoint,
                },
                3,
                10_000,
            )
            .unwrap();

        let refunded = ledger.receipt(&new_outpoint).unwrap();
        assert_eq!(refunded.owner, alice());
        assert!(refunded.unlockable);
    }

    #[test]
    fn test_settlement_rate_limit_same_block() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let secrets = htlc_on_receipt(&mut ledger, outpoint, 10_000);

        // Claim in the same block that created the HTLC: second
        // settlement op touching the same receipt at height 2.
        let result = ledger.apply_tx(
            &LedgerTx::HtlcClaim3s {
                outpoint,
                new_outpoint: Outpoint::new(),
                secrets,
            },
            2,
            2_000,
        );
        assert!(matches!(result, Err(LedgerError::SettlementRateLimited(_))));
    }

    #[test]
    fn test_settlement_rate_limit_resets_next_block() {
        let mut ledger = funded_ledger();
        let outpoint = locked_receipt(&mut ledger, 5_000);
        let secrets = htlc_on_receipt(&mut ledger, outpoint, 10_000);

        let result = ledger.apply_tx(
            &LedgerTx::HtlcClaim3s {
                outpoint,
                new_outpoint: Outpoint::new(),
                secrets,
            },
            3,
            2_000,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_dry_run_does_not_mutate() {
        let ledger = funded_ledger();
        let tx = LedgerTx::Transfer {
            from: alice(),
            to: bob(),
            amount: 1_000,
        };
        ledger.dry_run(&tx, 1, 0).unwrap();
        assert_eq!(ledger.balance(&alice()), 100_000);
        assert_eq!(ledger.balance(&bob()), 0);
    }

    #[test]
    fn test_halted_ledger_rejects_lock_and_mint() {
        let mut ledger = funded_ledger();
        ledger.halt();

        let result = ledger.apply_tx(
            &LedgerTx::Lock {
                owner: alice(),
                amount: 1_000,
                outpoint: Outpoint::new(),
            },
            1,
            0,
        );
        assert!(matches!(result, Err(LedgerError::Halted)));
        assert!(matches!(
            ledger.mint_m0(&alice(), 1),
            Err(LedgerError::Halted)
        ));

        // Transfers still flow while halted
        ledger
            .apply_tx(
                &LedgerTx::Transfer {
                    from: alice(),
                    to: bob(),
                    amount: 100,
                },
                1,
                0,
            )
            .unwrap();
    }

    #[test]
    fn test_mint_tracks_total() {
        let mut ledger = SettlementLedger::new(&LedgerConfig::default());
        ledger.mint_m0(&alice(), 30_000).unwrap();
        ledger.mint_m0(&bob(), 12_000).unwrap();
        assert_eq!(ledger.minted_total(), 42_000);
        assert_eq!(ledger.m0_total(), 42_000);
    }
}
