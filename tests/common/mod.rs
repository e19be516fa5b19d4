// Common test utilities and helpers

use chrono::{DateTime, Duration, TimeZone, Utc};
use grid_backtester::{BacktestConfig, Bar};

/// Fixed start of every synthetic bar series.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Create a test configuration with a short indicator warm-up and a small
/// fixed position size, so hand-built bar paths stay easy to reason about.
pub fn create_test_config() -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.atr_period = 2;
    config.ma_period = 2;
    config.position_size = 10.0;
    config
}

/// One daily bar at `day` days after the series start.
pub fn bar_at(day: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(
        test_start() + Duration::days(day),
        open,
        high,
        low,
        close,
        1_000.0,
    )
}

/// Same as `bar_at` with the ATR column already populated.
pub fn bar_with_atr(day: i64, open: f64, high: f64, low: f64, close: f64, atr: f64) -> Bar {
    let mut bar = bar_at(day, open, high, low, close);
    bar.atr = Some(atr);
    bar
}

/// A zero-range bar; useful for seeding the reference close.
pub fn flat_bar(day: i64, price: f64, atr: f64) -> Bar {
    bar_with_atr(day, price, price, price, price, atr)
}

/// Generate a random-walk bar series for smoke and determinism tests.
pub fn generate_random_bars(base_price: f64, count: usize, volatility: f64) -> Vec<Bar> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let start = test_start();
    let mut previous_close = base_price;
    let mut bars = Vec::with_capacity(count);

    for i in 0..count {
        let drift = rng.gen_range(-volatility..volatility);
        let close = (previous_close * (1.0 + drift)).max(1.0);
        let open = previous_close;
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..volatility / 2.0));
        let low = (open.min(close) * (1.0 - rng.gen_range(0.0..volatility / 2.0))).max(0.5);
        bars.push(Bar::new(
            start + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            rng.gen_range(100.0..10_000.0),
        ));
        previous_close = close;
    }

    bars
}
