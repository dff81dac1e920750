// 8.0: settlement engine. combines pool prices, the oracle index and stored positions
// into funding payments, remaining margin, margin ratio and bad debt.
// every mutating operation runs in one Context::atomic branch; the bank transfer is its last fallible step.

mod config;
mod core;
mod funding;
mod margin;
mod positions;
mod pricing;
mod results;

pub use config::EngineConfig;
pub use core::Engine;
pub use margin::require_more_margin_ratio;
pub use results::{EngineError, FundingResult, PositionResult, RemoveMarginResult};
