// 2.0: pool keeper. owns every vpool record and its snapshot history in the store.
// reads go through &Context, reserve mutations through &mut Context. the keeper itself is stateless.

mod keeper;
mod prices;
mod results;
mod snapshots;
mod swap;

pub use keeper::VpoolKeeper;
pub use results::{AmmError, SwapResult};
