// ATR and moving-average columns, computed in place on a bar series.

use crate::types::Bar;

/// Populate both indicator columns the engine reads.
pub fn attach_indicators(bars: &mut [Bar], atr_period: usize, ma_period: usize) {
    attach_atr(bars, atr_period);
    attach_moving_average(bars, ma_period);
}

/// Average True Range with Wilder's smoothing.
///
/// The first true range needs a previous close, so bar 0 contributes nothing.
/// The seed at index `period` is the plain mean of the first `period` true
/// ranges; every later bar applies `atr = (prev * (period - 1) + tr) / period`.
/// Indices below `period` stay `None`.
pub fn attach_atr(bars: &mut [Bar], period: usize) {
    if period == 0 || bars.len() <= period {
        return;
    }

    let seed = (1..=period)
        .map(|i| bars[i].true_range(bars[i - 1].close))
        .sum::<f64>()
        / period as f64;
    bars[period].atr = Some(seed);

    let mut atr = seed;
    for i in period + 1..bars.len() {
        let tr = bars[i].true_range(bars[i - 1].close);
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        bars[i].atr = Some(atr);
    }
}

/// Simple moving average of closes, defined from index `period - 1` onwards.
pub fn attach_moving_average(bars: &mut [Bar], period: usize) {
    if period == 0 || bars.len() < period {
        return;
    }

    let mut window_sum: f64 = bars[..period].iter().map(|b| b.close).sum();
    bars[period - 1].moving_average = Some(window_sum / period as f64);

    for i in period..bars.len() {
        window_sum += bars[i].close - bars[i - period].close;
        bars[i].moving_average = Some(window_sum / period as f64);
    }
}
