//! Trident Ledger
//!
//! The M1 settlement ledger and its chain: burn-backed M0 issuance,
//! Lock/Unlock between M0 and M1 receipts, three-hashlock receipt
//! HTLCs, and the per-block consensus audit that halts issuance when a
//! monetary invariant breaks.

pub mod burn;
pub mod chain;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod types;

pub use burn::{BurnPipeline, BurnRecord, BurnStatus, MintAuthorization};
pub use chain::{BlockSummary, ClaimRecord, M1Chain};
pub use error::LedgerError;
pub use invariants::{InvariantChecker, LedgerAudit, ISSUANCE_INVARIANT, VAULT_INVARIANT};
pub use ledger::SettlementLedger;
pub use types::{LedgerTx, Outpoint, Receipt, ReceiptHtlc, TxOutcome};
