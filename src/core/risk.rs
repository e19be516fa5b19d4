// ATR-derived stop-loss / take-profit computation

use crate::config::RiskConfig;
use crate::error::BacktestError;
use crate::types::Side;

/// Derives stop and target prices from volatility. The stop sits one
/// ATR-multiple away from the entry; the target covers `tp_sl_ratio` of the
/// stop distance on the profitable side.
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    config: RiskConfig,
}

impl RiskCalculator {
    pub fn new(config: RiskConfig) -> Result<Self, BacktestError> {
        if config.atr_multiplier <= 0.0 || !config.atr_multiplier.is_finite() {
            return Err(BacktestError::InvalidRiskConfig(format!(
                "atr_multiplier must be positive, got {}",
                config.atr_multiplier
            )));
        }
        if config.tp_sl_ratio <= 0.0 || !config.tp_sl_ratio.is_finite() {
            return Err(BacktestError::InvalidRiskConfig(format!(
                "tp_sl_ratio must be positive, got {}",
                config.tp_sl_ratio
            )));
        }
        Ok(Self { config })
    }

    /// Stop-loss and take-profit prices for an entry. `atr` must be a
    /// defined, positive indicator value; bars without one are skipped by
    /// the engine before this is ever called.
    pub fn stops(&self, entry_price: f64, side: Side, atr: f64) -> (f64, f64) {
        debug_assert!(atr > 0.0, "caller must skip bars with undefined ATR");

        let stop_distance = atr * self.config.atr_multiplier;
        let target_distance = stop_distance * self.config.tp_sl_ratio;

        match side {
            Side::Long => (entry_price - stop_distance, entry_price + target_distance),
            Side::Short => (entry_price + stop_distance, entry_price - target_distance),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_stops() {
        let calc = RiskCalculator::new(RiskConfig {
            atr_multiplier: 1.5,
            tp_sl_ratio: 0.5,
        })
        .unwrap();

        let (stop, target) = calc.stops(200.0, Side::Long, 4.0);
        assert_eq!(stop, 194.0);
        assert_eq!(target, 203.0);
    }

    #[test]
    fn test_short_stops_invert() {
        let calc = RiskCalculator::new(RiskConfig {
            atr_multiplier: 1.5,
            tp_sl_ratio: 0.5,
        })
        .unwrap();

        let (stop, target) = calc.stops(200.0, Side::Short, 4.0);
        assert_eq!(stop, 206.0);
        assert_eq!(target, 197.0);
    }

    #[test]
    fn test_unit_ratio_is_symmetric() {
        let calc = RiskCalculator::new(RiskConfig {
            atr_multiplier: 2.0,
            tp_sl_ratio: 1.0,
        })
        .unwrap();

        let (stop, target) = calc.stops(100.0, Side::Long, 1.0);
        assert_eq!(100.0 - stop, target - 100.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let err = RiskCalculator::new(RiskConfig {
            atr_multiplier: 0.0,
            tp_sl_ratio: 0.5,
        });
        assert!(matches!(err, Err(BacktestError::InvalidRiskConfig(_))));

        let err = RiskCalculator::new(RiskConfig {
            atr_multiplier: 1.5,
            tp_sl_ratio: -0.1,
        });
        assert!(matches!(err, Err(BacktestError::InvalidRiskConfig(_))));
    }
}
