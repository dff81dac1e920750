// 2.2 amm/snapshots.rs: append-only reserve history. gapless counters from 0, one per mutation.

use super::keeper::VpoolKeeper;
use super::results::AmmError;
use crate::context::Context;
use crate::events::{EventPayload, SnapshotSavedEvent};
use crate::snapshot::ReserveSnapshot;
use crate::store::{encode, KvStore, StoreKey};
use crate::types::{Timestamp, TokenPair};
use crate::vpool::Vpool;
use rust_decimal::Decimal;

impl VpoolKeeper {
    /// Writes snapshot `counter` as given. Overwrites an existing entry, which
    /// only replay and reinitialization should ever do.
    #[allow(clippy::too_many_arguments)]
    pub fn save_snapshot<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        counter: u64,
        quote_asset_reserve: Decimal,
        base_asset_reserve: Decimal,
        timestamp: Timestamp,
        block_number: i64,
    ) -> Result<(), AmmError> {
        let snapshot = ReserveSnapshot {
            pair: pair.clone(),
            quote_asset_reserve,
            base_asset_reserve,
            timestamp_ms: timestamp.as_millis(),
            block_number,
        };
        ctx.store_mut()
            .set_record(&StoreKey::snapshot(pair, counter), &snapshot)?;
        Ok(())
    }

    pub fn save_snapshot_counter<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pair: &TokenPair,
        counter: u64,
    ) -> Result<(), AmmError> {
        ctx.store_mut()
            .set_record(&StoreKey::snapshot_counter(pair), &counter)?;
        Ok(())
    }

    pub fn get_snapshot<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
        counter: u64,
    ) -> Result<ReserveSnapshot, AmmError> {
        ctx.store()
            .get_record(&StoreKey::snapshot(pair, counter))?
            .ok_or_else(|| AmmError::SnapshotNotFound {
                pair: pair.clone(),
                counter,
            })
    }

    /// `None` means the pair was never initialized.
    pub fn get_snapshot_counter<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<Option<u64>, AmmError> {
        Ok(ctx.store().get_record(&StoreKey::snapshot_counter(pair))?)
    }

    pub fn get_latest_snapshot<S: KvStore>(
        &self,
        ctx: &Context<S>,
        pair: &TokenPair,
    ) -> Result<(ReserveSnapshot, u64), AmmError> {
        let counter = self
            .get_snapshot_counter(ctx, pair)?
            .ok_or_else(|| AmmError::SnapshotCounterNotFound(pair.clone()))?;
        Ok((self.get_snapshot(ctx, pair, counter)?, counter))
    }

    /// Appends the pool's current reserves as snapshot `latest + 1`.
    pub(super) fn add_reserve_snapshot<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        pool: &Vpool,
    ) -> Result<u64, AmmError> {
        let latest = self
            .get_snapshot_counter(ctx, &pool.pair)?
            .ok_or_else(|| AmmError::SnapshotCounterNotFound(pool.pair.clone()))?;
        let next = latest + 1;

        let snapshot = pool.to_snapshot(ctx.block_time(), ctx.block_height());
        let snapshot_key = StoreKey::snapshot(&pool.pair, next);
        let snapshot_raw = encode(&snapshot_key, &snapshot)?;
        let counter_key = StoreKey::snapshot_counter(&pool.pair);
        let counter_raw = encode(&counter_key, &next)?;

        let store = ctx.store_mut();
        store.set(snapshot_key.as_bytes().to_vec(), snapshot_raw);
        store.set(counter_key.as_bytes().to_vec(), counter_raw);

        self.emit_snapshot_saved(ctx, &snapshot, next);
        log::debug!(
            "saved snapshot {} for {} at block {}",
            next,
            pool.pair,
            ctx.block_height()
        );
        Ok(next)
    }

    pub(super) fn emit_snapshot_saved<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        snapshot: &ReserveSnapshot,
        counter: u64,
    ) {
        ctx.emit_event(EventPayload::SnapshotSaved(SnapshotSavedEvent {
            pair: snapshot.pair.clone(),
            counter,
            quote_asset_reserve: snapshot.quote_asset_reserve,
            base_asset_reserve: snapshot.base_asset_reserve,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use rust_decimal_macros::dec;

    fn pair() -> TokenPair {
        TokenPair::new("ubtc", "unusd").unwrap()
    }

    #[test]
    fn uninitialized_pair_has_no_counter() {
        let ctx = Context::new(MemStore::new());
        let keeper = VpoolKeeper::new();
        assert_eq!(keeper.get_snapshot_counter(&ctx, &pair()).unwrap(), None);
        assert_eq!(
            keeper.get_latest_snapshot(&ctx, &pair()),
            Err(AmmError::SnapshotCounterNotFound(pair()))
        );
        assert_eq!(
            keeper.get_snapshot(&ctx, &pair(), 0),
            Err(AmmError::SnapshotNotFound {
                pair: pair(),
                counter: 0
            })
        );
    }

    #[test]
    fn save_and_read_back() {
        let mut ctx = Context::new(MemStore::new());
        let keeper = VpoolKeeper::new();
        keeper
            .save_snapshot(&mut ctx, &pair(), 0, dec!(90), dec!(10), Timestamp::from_millis(10), 1)
            .unwrap();
        keeper
            .save_snapshot(&mut ctx, &pair(), 1, dec!(85), dec!(10), Timestamp::from_millis(20), 2)
            .unwrap();
        keeper.save_snapshot_counter(&mut ctx, &pair(), 1).unwrap();

        let (latest, counter) = keeper.get_latest_snapshot(&ctx, &pair()).unwrap();
        assert_eq!(counter, 1);
        assert_eq!(latest.quote_asset_reserve, dec!(85));
        assert_eq!(latest.timestamp(), Timestamp::from_millis(20));
    }

    #[test]
    fn overwrite_replaces_entry() {
        let mut ctx = Context::new(MemStore::new());
        let keeper = VpoolKeeper::new();
        keeper
            .save_snapshot(&mut ctx, &pair(), 0, dec!(90), dec!(10), Timestamp::from_millis(10), 1)
            .unwrap();
        keeper
            .save_snapshot(&mut ctx, &pair(), 0, dec!(95), dec!(10), Timestamp::from_millis(10), 1)
            .unwrap();
        let snap = keeper.get_snapshot(&ctx, &pair(), 0).unwrap();
        assert_eq!(snap.quote_asset_reserve, dec!(95));
    }
}
