// Historical bar ingestion: CSV files in, validated bar sequences out.

pub mod indicators;

pub use indicators::{attach_atr, attach_indicators, attach_moving_average};

use crate::core::position::Trade;
use crate::error::BacktestError;
use crate::types::Bar;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Raw CSV row: `timestamp,open,high,low,close,volume` with the timestamp as
/// epoch seconds, RFC 3339, or a plain `YYYY-MM-DD` date for daily bars.
#[derive(Debug, Deserialize)]
struct RawBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load and validate a bar file. Indicator columns are left unset; call
/// `attach_indicators` (or `load_bars_with_indicators`) afterwards.
pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>, BacktestError> {
    let file = File::open(&path)?;
    let bars = read_bars(file)?;
    info!(
        "📥 Loaded {} bars from {} ({} to {})",
        bars.len(),
        path.as_ref().display(),
        bars[0].timestamp.format("%Y-%m-%d"),
        bars[bars.len() - 1].timestamp.format("%Y-%m-%d")
    );
    Ok(bars)
}

/// Load a bar file and precompute its ATR and moving-average columns.
pub fn load_bars_with_indicators<P: AsRef<Path>>(
    path: P,
    atr_period: usize,
    ma_period: usize,
) -> Result<Vec<Bar>, BacktestError> {
    let mut bars = load_bars(path)?;
    attach_indicators(&mut bars, atr_period, ma_period);
    Ok(bars)
}

/// Parse bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, BacktestError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for record in csv_reader.deserialize::<RawBar>() {
        let raw = record?;
        bars.push(Bar::new(
            parse_timestamp(&raw.timestamp)?,
            raw.open,
            raw.high,
            raw.low,
            raw.close,
            raw.volume,
        ));
    }

    if bars.is_empty() {
        return Err(BacktestError::InsufficientData(
            "bar file contains no rows".to_string(),
        ));
    }

    validate_bars(&bars)?;
    Ok(bars)
}

/// Check the engine's bar-sequence contract: ascending unique timestamps,
/// positive finite prices, a coherent high/low.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BacktestError> {
    for bar in bars {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BacktestError::InvalidData(format!(
                "non-positive or non-finite price at {}",
                bar.timestamp
            )));
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(BacktestError::InvalidData(format!(
                "invalid volume at {}",
                bar.timestamp
            )));
        }
        if bar.high < bar.low {
            return Err(BacktestError::InvalidData(format!(
                "high below low at {}",
                bar.timestamp
            )));
        }
    }

    for pair in bars.windows(2) {
        if pair[1].timestamp == pair[0].timestamp {
            return Err(BacktestError::InvalidData(format!(
                "duplicate timestamp {}",
                pair[0].timestamp
            )));
        }
        if pair[1].timestamp < pair[0].timestamp {
            return Err(BacktestError::InvalidData(format!(
                "bars not sorted: {} follows {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
    }

    Ok(())
}

/// Write a trade ledger as CSV next to the JSON report.
pub fn write_trades_csv<P: AsRef<Path>>(trades: &[Trade], path: P) -> Result<(), BacktestError> {
    let mut writer = csv::Writer::from_path(&path).map_err(|e| BacktestError::Csv(e.to_string()))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    info!("💾 Wrote {} trades to {}", trades.len(), path.as_ref().display());
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, BacktestError> {
    if let Ok(seconds) = raw.parse::<i64>() {
        return Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
            BacktestError::InvalidData(format!("timestamp {} out of range", raw))
        });
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(BacktestError::InvalidData(format!(
        "unparseable timestamp \"{}\" (expected epoch seconds, RFC 3339 or YYYY-MM-DD)",
        raw
    )))
}
