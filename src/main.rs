//! vAMM settlement simulation.
//!
//! Walks one pool through swaps, TWAP pricing, margin changes, funding and
//! position round trips against the in-memory store and ledger.

use perps_vamm::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type SimEngine = Engine<PostedPriceOracle, VaultLedger>;

const BLOCK_MS: i64 = 6_000;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("vAMM Settlement Simulation");
    println!("One Pool, Isolated Margin, Virtual Reserves\n");

    let scenarios: [(&str, fn() -> Result<(), EngineError>); 5] = [
        ("pool pricing", scenario_1_pool_pricing),
        ("position round trip", scenario_2_round_trip),
        ("price impact and margin", scenario_3_price_impact),
        ("funding settlement", scenario_4_funding),
        ("limits", scenario_5_limits),
    ];
    for (name, scenario) in scenarios {
        if let Err(err) = scenario() {
            eprintln!("scenario '{}' failed: {}", name, err);
            std::process::exit(1);
        }
    }

    println!("\nAll simulations completed successfully.");
}

fn btc() -> Result<TokenPair, EngineError> {
    Ok(TokenPair::new("ubtc", "unusd")?)
}

fn trader(name: &str) -> Result<TraderAddr, EngineError> {
    Ok(TraderAddr::new(name)?)
}

fn leverage(value: Decimal) -> Result<Leverage, EngineError> {
    Leverage::new(value).ok_or(EngineError::InvalidLeverage {
        leverage: value,
        max_leverage: Decimal::ZERO,
    })
}

/// Pool at 1e6/1e6 with mark 1, the index posted at `index`, and funded traders.
fn setup(
    index: Decimal,
    traders: &[&TraderAddr],
) -> Result<(SimEngine, Context<MemStore>), EngineError> {
    let pair = btc()?;
    let mut oracle = PostedPriceOracle::new();
    let start = Timestamp::from_millis(1_700_000_000_000);
    oracle.set_time(start);
    oracle.post_price(&pair, index, start.saturating_add(chrono::Duration::days(1)))?;

    let mut ledger = VaultLedger::new();
    for t in traders {
        ledger.fund_account(t, &Coin::new("unusd", dec!(1000)))?;
    }

    let engine = Engine::new(EngineConfig::default(), oracle, ledger)?;
    let mut ctx = engine.new_context(MemStore::new()).with_block(1, start);
    engine.create_pool(&mut ctx, pair, dec!(0.1), dec!(1_000_000), dec!(1_000_000), dec!(0.1), None)?;
    ctx.advance_block(BLOCK_MS);
    Ok((engine, ctx))
}

/// Spot, base-asset and TWAP prices on a fresh pool.
fn scenario_1_pool_pricing() -> Result<(), EngineError> {
    println!("Scenario 1: Pool Pricing\n");

    let (engine, ctx) = setup(dec!(1), &[])?;
    let pair = btc()?;
    let keeper = engine.vpool_keeper();

    let pool = keeper.get_pool(&ctx, &pair)?;
    println!("  Reserves: {} quote / {} base", pool.quote_asset_reserve, pool.base_asset_reserve);
    println!("  Spot price: {}", keeper.get_spot_price(&ctx, &pair)?);
    println!(
        "  Selling 10 base returns {} quote",
        keeper.get_base_asset_price(&ctx, &pair, Direction::AddToPool, dec!(10))?
    );
    println!(
        "  Spot TWAP over the lookback: {}\n",
        keeper.get_spot_twap(&ctx, &pair, engine.config().params.twap_lookback_window())?
    );
    Ok(())
}

/// Open a long, close it in the next block, compare balances.
fn scenario_2_round_trip() -> Result<(), EngineError> {
    println!("Scenario 2: Position Round Trip\n");

    let alice = trader("nibi1alice")?;
    let (mut engine, mut ctx) = setup(dec!(1), &[&alice])?;
    let pair = btc()?;

    let opened = engine.open_position(&mut ctx, &alice, &pair, Side::Long, dec!(100), leverage(dec!(5))?, Decimal::ZERO)?;
    println!("  Alice opens {} base for {} quote at 5x", opened.exchanged_size, opened.exchanged_quote);
    println!("  Mark after open: {}", engine.vpool_keeper().get_pool(&ctx, &pair)?.mark_price());

    ctx.advance_block(BLOCK_MS);
    let closed = engine.close_position(&mut ctx, &alice, &pair)?;
    println!("  Alice closes for {} quote, realized PnL {}", closed.exchanged_quote, closed.realized_pnl);
    println!("  Balance: {}, vault: {}\n", engine.bank().balance(&alice, "unusd"), engine.bank().vault_balance("unusd"));
    Ok(())
}

/// A second trader moves the curve; the first one's margin ratio and free collateral follow.
fn scenario_3_price_impact() -> Result<(), EngineError> {
    println!("Scenario 3: Price Impact and Margin\n");

    let alice = trader("nibi1alice")?;
    let bob = trader("nibi1bob")?;
    let (mut engine, mut ctx) = setup(dec!(1), &[&alice, &bob])?;
    let pair = btc()?;

    engine.open_position(&mut ctx, &alice, &pair, Side::Long, dec!(100), leverage(dec!(10))?, Decimal::ZERO)?;
    ctx.advance_block(BLOCK_MS);
    engine.open_position(&mut ctx, &bob, &pair, Side::Long, dec!(500), leverage(dec!(10))?, Decimal::ZERO)?;
    ctx.advance_block(BLOCK_MS);

    let position = engine.get_position(&ctx, &pair, &alice)?;
    let spot = engine.position_notional_and_unrealized_pnl(&ctx, &position, PnlCalcOption::SpotPrice)?;
    println!("  Alice notional {}, unrealized PnL {}", spot.position_notional, spot.unrealized_pnl);
    println!("  Margin ratio: {}", engine.get_margin_ratio(&ctx, &position)?);

    let free = engine.calc_free_collateral(&ctx, &position)?;
    println!("  Free collateral: {}", free);

    let too_much = Coin::new("unusd", free + dec!(1));
    match engine.remove_margin(&mut ctx, &alice, &pair, too_much) {
        Err(EngineError::InsufficientFreeCollateral(left)) => {
            println!("  Removing {} rejected, free collateral would be {}", free + dec!(1), left)
        }
        Err(err) => return Err(err),
        Ok(_) => println!("  Removal unexpectedly accepted"),
    }
    if free > Decimal::ZERO {
        let out = engine.remove_margin(&mut ctx, &alice, &pair, Coin::new("unusd", free))?;
        println!("  Removed {}, margin now {}\n", out.margin_out, out.position.margin);
    } else {
        println!();
    }
    Ok(())
}

/// Mark above index: longs pay, and it shows up in the next margin computation.
fn scenario_4_funding() -> Result<(), EngineError> {
    println!("Scenario 4: Funding Settlement\n");

    let alice = trader("nibi1alice")?;
    let (mut engine, mut ctx) = setup(dec!(0.95), &[&alice])?;
    let pair = btc()?;

    engine.open_position(&mut ctx, &alice, &pair, Side::Long, dec!(100), leverage(dec!(2))?, Decimal::ZERO)?;

    let interval = engine.config().params.funding_interval_ms;
    ctx.advance_block(interval);
    let expiry = ctx.block_time().saturating_add(chrono::Duration::days(1));
    engine.oracle_mut().set_time(ctx.block_time());
    engine.oracle_mut().post_price(&pair, dec!(0.95), expiry)?;

    let funding = engine.settle_funding(&mut ctx, &pair)?;
    println!("  Mark TWAP {}, index {}", funding.mark_twap, funding.index_price);
    println!("  Premium fraction {}, cumulative {}", funding.premium_fraction, funding.cumulative_premium_fraction);

    let position = engine.get_position(&ctx, &pair, &alice)?;
    let remain = engine.calc_remain_margin_with_funding_payment(&ctx, &position, Decimal::ZERO)?;
    println!("  Alice owes {}, margin after funding {}\n", remain.funding_payment, remain.margin);
    Ok(())
}

/// Trade limit, fluctuation limit and leverage rejections.
fn scenario_5_limits() -> Result<(), EngineError> {
    println!("Scenario 5: Limits\n");

    let alice = trader("nibi1alice")?;
    let (mut engine, mut ctx) = setup(dec!(1), &[&alice])?;
    let pair = btc()?;
    let keeper = *engine.vpool_keeper();

    // trade limit is 10% of the quote reserve
    match keeper.swap_quote_for_base(&mut ctx, &pair, Direction::AddToPool, dec!(200_000), Decimal::ZERO) {
        Err(err) => println!("  200000 quote swap rejected: {}", err),
        Ok(_) => println!("  200000 quote swap accepted"),
    }
    // mark would reach 1.1236 against a 10% band
    match keeper.swap_quote_for_base(&mut ctx, &pair, Direction::AddToPool, dec!(60_000), Decimal::ZERO) {
        Err(err) => println!("  60000 quote swap rejected: {}", err),
        Ok(_) => println!("  60000 quote swap accepted"),
    }

    let before = engine.bank().balance(&alice, "unusd");
    match engine.open_position(&mut ctx, &alice, &pair, Side::Long, dec!(100), leverage(dec!(20))?, Decimal::ZERO) {
        Err(err) => println!("  20x rejected: {}", err),
        Ok(_) => println!("  20x accepted"),
    }
    println!("  Balance untouched: {}\n", engine.bank().balance(&alice, "unusd") == before);
    Ok(())
}
