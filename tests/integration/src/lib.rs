//! Shared harness for the end-to-end swap scenarios.
//!
//! Wires the three rails the way a deployment would: sim chains for
//! BTC and EVM, an in-process M1 settlement chain, one adapter per
//! rail, all behind a single registry and orchestrator. Tests own the
//! clocks and the M1 block producer, so every scenario is
//! deterministic.

use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

use trident_chains::{AdapterRegistry, BtcAdapter, EvmAdapter, M1Adapter, SimChain};
use trident_core::config::TridentConfig;
use trident_core::state_machine::SwapPhase;
use trident_core::types::{Address, Amount, Asset, ChainId, SwapId, UnixSeconds};
use trident_ledger::{LedgerTx, M1Chain};
use trident_swap::{LegDraft, SwapOrchestrator};

/// Clock shared by all rails when a testbed comes up.
pub const START_TIME: UnixSeconds = 1_000;
/// Leg timelocks, strictly increasing in canonical order.
pub const T1: UnixSeconds = 5_000;
pub const T2: UnixSeconds = 6_000;
pub const T3: UnixSeconds = 7_000;

const BTC_START_HEIGHT: u64 = 100;
const EVM_START_HEIGHT: u64 = 500;
/// BTC tip deep enough to finalize any burn claimed at height 1.
const BTC_FINAL_TIP: u64 = 1_000;

static TRACING: Once = Once::new();

/// Install the test subscriber once per process. The configured level
/// and format apply unless `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let logging = TridentConfig::default().logging;
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(logging.level));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer();
        if logging.format == "json" {
            builder.json().try_init().ok();
        } else {
            builder.try_init().ok();
        }
    });
}

/// The M1 account of the first liquidity provider (funder of leg2).
pub fn lp1_m1() -> Address {
    Address::new("m1-lp1")
}

/// The M1 account leg2 pays out to.
pub fn lp2_m1() -> Address {
    Address::new("m1-lp2")
}

/// Standard three-leg drafts: the user's BTC to LP1, LP1's M1 to LP2,
/// LP2's ERC-20 to the user.
pub fn standard_drafts() -> [LegDraft; 3] {
    [
        LegDraft {
            chain: ChainId::Btc,
            funder: Address::new("btc-user"),
            claimant: Address::new("btc-lp1"),
            amount: Amount::new(120_000, Asset::Btc),
            timelock: T1,
            claim_address: Address::new("btc-lp1"),
            refund_address: Address::new("btc-user"),
        },
        LegDraft {
            chain: ChainId::M1,
            funder: lp1_m1(),
            claimant: lp2_m1(),
            amount: Amount::new(100_000, Asset::M1),
            timelock: T2,
            claim_address: lp2_m1(),
            refund_address: lp1_m1(),
        },
        LegDraft {
            chain: ChainId::Evm,
            funder: Address::new("0xlp2"),
            claimant: Address::new("0xuser"),
            amount: Amount::new(95_000, Asset::Erc20("USDT".into())),
            timelock: T3,
            claim_address: Address::new("0xuser"),
            refund_address: Address::new("0xlp2"),
        },
    ]
}

/// One wired deployment against fresh chains.
///
/// Adapter handles are kept alongside the orchestrator so scenarios
/// can poke a single rail directly; the orchestrator talks to the same
/// instances through the registry.
pub struct Testbed {
    pub btc: Arc<SimChain>,
    pub evm: Arc<SimChain>,
    pub m1: Arc<M1Chain>,
    pub btc_adapter: Arc<BtcAdapter>,
    pub evm_adapter: Arc<EvmAdapter>,
    pub m1_adapter: Arc<M1Adapter>,
    pub orchestrator: SwapOrchestrator,
    pub config: TridentConfig,
}

impl Testbed {
    pub fn new() -> Self {
        Self::with_config(TridentConfig::default())
    }

    pub fn with_config(config: TridentConfig) -> Self {
        init_tracing();
        let btc = Arc::new(SimChain::with_clock(
            ChainId::Btc,
            BTC_START_HEIGHT,
            START_TIME,
        ));
        let evm = Arc::new(SimChain::with_clock(
            ChainId::Evm,
            EVM_START_HEIGHT,
            START_TIME,
        ));
        let m1 = Arc::new(M1Chain::new(&config));
        // The ledger clock starts at zero; line it up with the sims.
        m1.advance_time(START_TIME);

        let btc_adapter = Arc::new(BtcAdapter::new(btc.clone()));
        let evm_adapter = Arc::new(EvmAdapter::new(evm.clone()));
        let m1_adapter = Arc::new(M1Adapter::new(m1.clone()));

        let mut registry = AdapterRegistry::new();
        registry.register(btc_adapter.clone());
        registry.register(evm_adapter.clone());
        registry.register(m1_adapter.clone());
        let orchestrator = SwapOrchestrator::new(Arc::new(registry), &config);

        tracing::info!(start_time = START_TIME, "testbed wired with three rails");
        Self {
            btc,
            evm,
            m1,
            btc_adapter,
            evm_adapter,
            m1_adapter,
            orchestrator,
            config,
        }
    }

    /// Finalize a burn claim so `dest` holds liquid M0 on the ledger.
    pub fn fund_m0(&self, btc_txid: &str, dest: &Address, sats: u64) {
        self.m1
            .submit(LedgerTx::BurnClaim {
                btc_txid: btc_txid.to_string(),
                btc_height: 1,
                dest: dest.clone(),
                burned_sats: sats,
            })
            .expect("burn claim should admit");
        self.m1.observe_btc_tip(BTC_FINAL_TIP);
        let summary = self.m1.connect_block().expect("block connect should succeed");
        assert_eq!(summary.minted_sats, sats, "burn should finalize and mint");
    }

    /// Tick the orchestrator, connecting an M1 block between rounds the
    /// way a block producer would, until the swap reaches a final phase
    /// or `max_rounds` passes. Returns the last phase seen.
    pub async fn drive(&self, id: SwapId, now: UnixSeconds, max_rounds: usize) -> SwapPhase {
        let mut phase = SwapPhase::Init;
        for _ in 0..max_rounds {
            phase = self
                .orchestrator
                .tick(id, now)
                .await
                .expect("tick should succeed");
            if phase.is_final() {
                break;
            }
            self.m1.connect_block().expect("block connect should succeed");
        }
        phase
    }
}

impl Default for Testbed {
    fn default() -> Self {
        Self::new()
    }
}
