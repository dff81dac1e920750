// 7.0 config.rs: all settings in one place. per-pool risk bounds and exchange-wide params.
// 7.1 VpoolConfig lives on each pool and is replaced wholesale, never patched field by field.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: Decimal },

    #[error("max leverage must be positive, got {0}")]
    NonPositiveLeverage(Decimal),

    #[error("maintenance margin ratio {maintenance_margin_ratio} * max leverage {max_leverage} exceeds 1")]
    LeverageTooHighForMaintenance {
        maintenance_margin_ratio: Decimal,
        max_leverage: Decimal,
    },

    #[error("collateral denom must not be empty")]
    EmptyCollateralDenom,

    #[error("{field} must be a positive duration")]
    NonPositiveWindow { field: &'static str },
}

/** 7.2: risk bounds for one pool. all ratios in [0, 1] */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpoolConfig {
    // share of the quote (or base) reserve a single swap may move
    pub trade_limit_ratio: Decimal,
    // max relative move of the mark price against the previous block's snapshot
    pub fluctuation_limit_ratio: Decimal,
    // max relative gap between mark and oracle index before the pool counts as diverged
    pub max_oracle_spread_ratio: Decimal,
    pub maintenance_margin_ratio: Decimal,
    pub max_leverage: Decimal,
}

impl Default for VpoolConfig {
    fn default() -> Self {
        Self {
            trade_limit_ratio: Decimal::ONE,
            fluctuation_limit_ratio: Decimal::ONE,
            max_oracle_spread_ratio: Decimal::ONE,
            maintenance_margin_ratio: dec!(0.0625),
            max_leverage: dec!(10),
        }
    }
}

impl VpoolConfig {
    pub fn with_trade_limit_ratio(mut self, ratio: Decimal) -> Self {
        self.trade_limit_ratio = ratio;
        self
    }

    pub fn with_fluctuation_limit_ratio(mut self, ratio: Decimal) -> Self {
        self.fluctuation_limit_ratio = ratio;
        self
    }

    pub fn with_max_oracle_spread_ratio(mut self, ratio: Decimal) -> Self {
        self.max_oracle_spread_ratio = ratio;
        self
    }

    pub fn with_maintenance_margin_ratio(mut self, ratio: Decimal) -> Self {
        self.maintenance_margin_ratio = ratio;
        self
    }

    pub fn with_max_leverage(mut self, leverage: Decimal) -> Self {
        self.max_leverage = leverage;
        self
    }

    /// 1 / max_leverage: the margin a freshly opened position must carry
    pub fn initial_margin_ratio(&self) -> Decimal {
        if self.max_leverage.is_zero() {
            return Decimal::ONE;
        }
        crate::math::quo_truncate(Decimal::ONE, self.max_leverage).unwrap_or(Decimal::ONE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("trade_limit_ratio", self.trade_limit_ratio),
            ("fluctuation_limit_ratio", self.fluctuation_limit_ratio),
            ("max_oracle_spread_ratio", self.max_oracle_spread_ratio),
            ("maintenance_margin_ratio", self.maintenance_margin_ratio),
        ];
        for (field, value) in ratios {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::RatioOutOfRange { field, value });
            }
        }

        if self.max_leverage <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveLeverage(self.max_leverage));
        }

        let product = self
            .maintenance_margin_ratio
            .checked_mul(self.max_leverage)
            .unwrap_or(Decimal::MAX);
        if product > Decimal::ONE {
            return Err(ConfigError::LeverageTooHighForMaintenance {
                maintenance_margin_ratio: self.maintenance_margin_ratio,
                max_leverage: self.max_leverage,
            });
        }

        Ok(())
    }
}

/** 7.3: exchange-wide parameters the settlement engine reads */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpParams {
    // the only denom accepted as margin
    pub collateral_denom: String,
    // window used for TWAP valuations of positions
    pub twap_lookback_window_ms: i64,
    // how often funding is settled; also the TWAP window for the funding mark
    pub funding_interval_ms: i64,
}

impl Default for PerpParams {
    fn default() -> Self {
        Self {
            collateral_denom: "unusd".to_string(),
            twap_lookback_window_ms: 15 * 60 * 1000,
            funding_interval_ms: 60 * 60 * 1000,
        }
    }
}

impl PerpParams {
    // short windows so a local chain shows funding quickly
    pub fn testnet() -> Self {
        Self {
            twap_lookback_window_ms: 60 * 1000,
            funding_interval_ms: 5 * 60 * 1000,
            ..Self::default()
        }
    }

    pub fn mainnet() -> Self {
        Self {
            twap_lookback_window_ms: 30 * 60 * 1000,
            ..Self::default()
        }
    }

    pub fn twap_lookback_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.twap_lookback_window_ms)
    }

    pub fn funding_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.funding_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collateral_denom.is_empty() {
            return Err(ConfigError::EmptyCollateralDenom);
        }
        if self.twap_lookback_window_ms <= 0 {
            return Err(ConfigError::NonPositiveWindow {
                field: "twap_lookback_window_ms",
            });
        }
        if self.funding_interval_ms <= 0 {
            return Err(ConfigError::NonPositiveWindow {
                field: "funding_interval_ms",
            });
        }
        Ok(())
    }
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn params(&self) -> PerpParams {
        match self {
            Environment::Development => PerpParams::default(),
            Environment::Testnet => PerpParams::testnet(),
            Environment::Mainnet => PerpParams::mainnet(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> VpoolConfig {
        VpoolConfig {
            trade_limit_ratio: dec!(0.10),
            fluctuation_limit_ratio: dec!(0.10),
            max_oracle_spread_ratio: dec!(0.10),
            maintenance_margin_ratio: dec!(0.0625),
            max_leverage: dec!(15),
        }
    }

    #[test]
    fn default_config_valid() {
        assert!(VpoolConfig::default().validate().is_ok());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn ratios_out_of_range() {
        let cases = [
            valid().with_trade_limit_ratio(dec!(-1)),
            valid().with_trade_limit_ratio(dec!(2)),
            valid().with_fluctuation_limit_ratio(dec!(-1)),
            valid().with_fluctuation_limit_ratio(dec!(2)),
            valid().with_max_oracle_spread_ratio(dec!(-1)),
            valid().with_max_oracle_spread_ratio(dec!(2)),
            valid().with_maintenance_margin_ratio(dec!(-1)),
            valid().with_maintenance_margin_ratio(dec!(2)),
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(ConfigError::RatioOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn negative_leverage_rejected() {
        let config = valid().with_max_leverage(dec!(-0.10));
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositiveLeverage(dec!(-0.10)))
        );
    }

    #[test]
    fn leverage_too_high_for_maintenance() {
        // 0.10 maintenance only supports 10x
        let config = valid()
            .with_maintenance_margin_ratio(dec!(0.10))
            .with_max_leverage(dec!(11));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LeverageTooHighForMaintenance { .. })
        ));

        let edge = config.with_max_leverage(dec!(10));
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn builders_replace_single_field() {
        let base = VpoolConfig::default();
        let updated = base.clone().with_max_leverage(dec!(12));
        assert_eq!(updated.max_leverage, dec!(12));
        assert_eq!(updated.trade_limit_ratio, base.trade_limit_ratio);
    }

    #[test]
    fn initial_margin_ratio_from_leverage() {
        assert_eq!(VpoolConfig::default().initial_margin_ratio(), dec!(0.1));
    }

    #[test]
    fn environment_presets_valid() {
        assert!(Environment::Development.params().validate().is_ok());
        assert!(Environment::Testnet.params().validate().is_ok());
        assert!(Environment::Mainnet.params().validate().is_ok());
    }

    #[test]
    fn params_reject_bad_windows() {
        let params = PerpParams {
            funding_interval_ms: 0,
            ..PerpParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonPositiveWindow { .. })
        ));
    }

    #[test]
    fn config_serialization() {
        let config = valid();
        let json = serde_json::to_string(&config).unwrap();
        let back: VpoolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
