//! Freddy exchange ledger simulation.
//!
//! Walks the full user lifecycle: registration, spot trading, a futures round trip,
//! a liquidation, wallet moves and the admin listing. Set FREDDY_DATA_DIR to keep
//! the resulting users on disk.

use freddy_core::*;
use rust_decimal_macros::dec;
use tracing::info;

type SimResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = LedgerConfig::from_env()?;
    let mut exchange = match config.data_dir.clone() {
        Some(dir) => {
            let store = JsonFileStore::open(dir)?;
            Exchange::new(config, Box::new(store))?
        }
        None => Exchange::in_memory(config)?,
    };
    exchange.set_time(Timestamp::now());

    println!("Freddy Exchange Ledger Simulation\n");

    scenario_1_registration(&mut exchange)?;
    scenario_2_spot_trading(&mut exchange)?;
    scenario_3_futures_round_trip(&mut exchange)?;
    scenario_4_liquidation(&mut exchange)?;
    scenario_5_wallet(&mut exchange)?;
    scenario_6_admin(&mut exchange)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

const LISTING: &str = r#"{
  "data": [
    {"symbol": "BTC", "slug": "bitcoin", "quote": {"USD": {"price": 50000.0, "percent_change_24h": 1.8}}},
    {"symbol": "ETH", "slug": "ethereum", "quote": {"USD": {"price": 3000.0, "percent_change_24h": -0.6}}},
    {"symbol": "SOL", "slug": "solana", "quote": {"USD": {"price": 150.0, "percent_change_24h": 4.2}}}
  ]
}"#;

fn user_by_email(exchange: &Exchange, email: &str) -> Result<UserId, ExchangeError> {
    exchange
        .find_by_email(email)
        .map(|u| u.id)
        .ok_or(ExchangeError::InvalidCredentials)
}

fn register_or_find(exchange: &mut Exchange, email: &str, name: &str) -> Result<UserId, ExchangeError> {
    match exchange.find_by_email(email) {
        Some(user) => Ok(user.id),
        None => exchange.register(email, "correct-horse", name),
    }
}

/// Registration, price listing, login.
fn scenario_1_registration(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 1: Registration and Prices\n");

    let applied = exchange.apply_listing(LISTING)?;
    println!("  Listing applied: {applied} quotes");

    let alice = register_or_find(exchange, "alice@example.com", "Alice")?;
    register_or_find(exchange, "bob@example.com", "Bob")?;
    register_or_find(exchange, "admin@freddy.exchange", "Admin")?;

    exchange.login("alice@example.com", "correct-horse")?;
    let user = exchange.user(alice)?;
    println!("  Alice logged in as user {}", user.id.0);
    println!(
        "  Balances: fiat ${}, usdt ${}, margin ${}\n",
        user.balances.fiat, user.balances.usdt, user.balances.margin
    );

    match exchange.register("alice@example.com", "correct-horse", "Alice Again") {
        Err(e) => println!("  Duplicate registration rejected: {e}\n"),
        Ok(_) => println!("  Duplicate registration unexpectedly accepted\n"),
    }
    Ok(())
}

/// Buy, average in, partial sell.
fn scenario_2_spot_trading(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 2: Spot Trading\n");

    let alice = user_by_email(exchange, "alice@example.com")?;
    let btc = CoinId::new("bitcoin");
    let eth = CoinId::new("ethereum");

    let cost = exchange.buy(alice, &btc, dec!(0.05))?;
    println!("  Alice buys 0.05 BTC @ $50,000 for ${cost}");

    exchange.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(46000)));
    exchange.buy(alice, &btc, dec!(0.05))?;
    exchange.buy(alice, &eth, dec!(0.5))?;

    if let Some(lot) = exchange.user(alice)?.get_asset(&btc) {
        println!("  Averaged in at $46,000: {} BTC @ avg ${}", lot.amount, lot.average_price);
    }

    match exchange.sell(alice, &btc, dec!(1)) {
        Err(e) => println!("  Oversell rejected: {e}"),
        Ok(_) => println!("  Oversell unexpectedly accepted"),
    }

    exchange.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(52000)));
    let proceeds = exchange.sell(alice, &btc, dec!(0.04))?;
    println!("  Alice sells 0.04 BTC @ $52,000 for ${proceeds}");

    let summary = exchange.portfolio_summary(alice)?;
    println!("  Spot value ${}, total equity ${}\n", summary.spot_value, summary.total_equity);
    Ok(())
}

/// Open a leveraged long, move the price, close.
fn scenario_3_futures_round_trip(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 3: Futures Round Trip\n");

    let bob = user_by_email(exchange, "bob@example.com")?;
    let eth = CoinId::new("ethereum");

    let pos = exchange.open_position(bob, &eth, Side::Long, dec!(5), dec!(0.2))?;
    if let Some(p) = exchange.user(bob)?.get_position(pos) {
        println!(
            "  Bob opens LONG 0.2 ETH 5x @ ${} at {}, margin ${}, liquidation ${}",
            p.entry_price,
            p.opened_at.to_rfc3339(),
            p.margin,
            p.liquidation_price
        );
    }

    exchange.advance_time(60_000);
    exchange.update_price("ethereum", "ETH", Price::new_unchecked(dec!(3150)));
    let status = exchange.position_status(bob, pos)?;
    println!(
        "  ETH moves to $3,150, unrealized P&L ${} (ROE {}%)",
        status.unrealized_pnl,
        (status.roe * dec!(100)).round_dp(2)
    );

    let realized = exchange.close_position(bob, pos)?;
    println!("  Closed, realized P&L ${realized}");
    println!("  Margin balance now ${}\n", exchange.user(bob)?.balances.margin);
    Ok(())
}

/// A short gets squeezed through its liquidation price.
fn scenario_4_liquidation(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 4: Liquidation\n");

    let bob = user_by_email(exchange, "bob@example.com")?;
    let sol = CoinId::new("solana");

    let pos = exchange.open_position(bob, &sol, Side::Short, dec!(20), dec!(2))?;
    if let Some(p) = exchange.user(bob)?.get_position(pos) {
        println!("  Bob opens SHORT 2 SOL 20x @ ${}, liquidation ${}", p.entry_price, p.liquidation_price);
    }

    for price in [dec!(152), dec!(153), dec!(155)] {
        exchange.advance_time(1_000);
        exchange.update_price("solana", "SOL", Price::new_unchecked(price));
        let liquidated = exchange.check_liquidations();
        println!("  SOL @ ${price}: {} liquidations", liquidated.len());
        for result in liquidated {
            info!(position = result.position_id.0, "sim observed liquidation");
            println!(
                "    position {} closed at ${}, lost ${}, returned ${}",
                result.position_id.0, result.liquidation_price, result.margin_lost, result.margin_returned
            );
        }
    }
    println!();
    Ok(())
}

/// Deposits, transfers, and a rejected withdrawal.
fn scenario_5_wallet(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 5: Wallet\n");

    let alice = user_by_email(exchange, "alice@example.com")?;

    exchange.deposit(alice, BalanceKind::Usdt, Quote::new(dec!(750)))?;
    exchange.transfer(alice, BalanceKind::Fiat, BalanceKind::Margin, Quote::new(dec!(1000)))?;
    println!("  Alice deposits $750 USDT and moves $1,000 fiat to margin");

    match exchange.withdraw(alice, BalanceKind::Usdt, Quote::new(dec!(1000000))) {
        Err(e) => println!("  Large withdrawal rejected: {e}"),
        Ok(_) => println!("  Large withdrawal unexpectedly accepted"),
    }

    let response = exchange.handle_json(r#"{"action":"portfolio"}"#);
    println!("  API portfolio response: {} bytes\n", response.len());
    Ok(())
}

/// Admin listing and a balance override.
fn scenario_6_admin(exchange: &mut Exchange) -> SimResult {
    println!("Scenario 6: Admin\n");

    let admin = user_by_email(exchange, "admin@freddy.exchange")?;
    let bob = user_by_email(exchange, "bob@example.com")?;

    let delta = exchange.adjust_balance(admin, bob, BalanceKind::Margin, Quote::new(dec!(5000)))?;
    println!("  Admin sets Bob's margin to $5,000 (change ${delta})");

    for summary in exchange.list_users(admin)? {
        println!(
            "  {:<24} {:?} positions {} value ${}",
            summary.email, summary.role, summary.open_positions, summary.portfolio_value
        );
    }

    exchange.logout()?;
    Ok(())
}
