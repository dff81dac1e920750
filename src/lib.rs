// perps-vamm: virtual AMM pricing and margin settlement for perpetual futures.
// the pool holds no tokens: a constant-product curve over virtual reserves sets the price,
// collateral sits in a vault behind the bank trait.
// all computation is deterministic; time and state come from the Context.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: TokenPair, TraderAddr, Direction, Side, Coin, Timestamp
//   1.7  math.rs: 18-digit truncating fixed point
//   2.x  amm/: pool keeper: lifecycle, snapshots, prices, TWAP, swaps
//   3.x  snapshot.rs: reserve snapshot record
//   3.5  vpool.rs: bonding curve, trade/fluctuation/spread limits
//   4.x  position.rs: position struct, PnL, remaining margin
//   5.x  funding.rs: latest cumulative premium fraction per pair
//   6.x  oracle.rs: index price trait (posted + mock)
//   6.5  custody.rs: collateral vault trait (ledger + mock)
//   7.x  config.rs: pool risk bounds, engine params, env presets
//   8.x  engine/: settlement engine: margin, positions, funding, valuation
//   9.x  store.rs: key-value store, cache branch
//   10.x context.rs: block info, event log, atomic branches
//   11.x events.rs: state transition events for audit

// curve and pool state
pub mod amm;
pub mod math;
pub mod snapshot;
pub mod types;
pub mod vpool;

// settlement
pub mod engine;
pub mod events;
pub mod funding;
pub mod position;

// integration modules
pub mod config;
pub mod context;
pub mod custody;
pub mod oracle;
pub mod store;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use position::*;
pub use types::*;
pub use amm::{AmmError, SwapResult, VpoolKeeper};
pub use config::{ConfigError, Environment, PerpParams, VpoolConfig};
pub use context::Context;
pub use custody::{BankError, CollateralBank, MockBank, VaultLedger, VAULT_HOLDER};
pub use math::MathError;
pub use oracle::{MockOracle, OracleError, PostedPriceOracle, PriceOracle};
pub use snapshot::ReserveSnapshot;
pub use store::{CacheStore, KvStore, MemStore, StoreError, StoreKey};
pub use vpool::{Vpool, VpoolError};
