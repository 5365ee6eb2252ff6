//! Factory: converts a `StrategyConfig` into a runtime trait object.

use serde::{Deserialize, Serialize};

use super::{
    GexRecoil, GexRecoilParams, OrderBlock, OrderBlockParams, OvernightDrift,
    OvernightDriftParams, StopHunt, StopHuntParams, Strategy,
};
use crate::engine::config::ConfigError;

/// Closed set of strategy variants, tagged by `type` in config files.
///
/// ```toml
/// [strategy]
/// type = "gex_recoil"
/// stop_buffer = 8.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    GexRecoil(GexRecoilParams),
    StopHunt(StopHuntParams),
    OrderBlock(OrderBlockParams),
    OvernightDrift(OvernightDriftParams),
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::GexRecoil(_) => "gex_recoil",
            StrategyConfig::StopHunt(_) => "stop_hunt",
            StrategyConfig::OrderBlock(_) => "order_block",
            StrategyConfig::OvernightDrift(_) => "overnight_drift",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::GexRecoil(p) => p.validate(),
            StrategyConfig::StopHunt(p) => p.validate(),
            StrategyConfig::OrderBlock(p) => p.validate(),
            StrategyConfig::OvernightDrift(p) => p.validate(),
        }
    }

    /// Validate, then build a fresh strategy instance with no history.
    pub fn build(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        self.validate()?;
        Ok(match self {
            StrategyConfig::GexRecoil(p) => Box::new(GexRecoil::new(p.clone())),
            StrategyConfig::StopHunt(p) => Box::new(StopHunt::new(p.clone())),
            StrategyConfig::OrderBlock(p) => Box::new(OrderBlock::new(p.clone())),
            StrategyConfig::OvernightDrift(p) => Box::new(OvernightDrift::new(p.clone())),
        })
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::GexRecoil(GexRecoilParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_each_variant() {
        let configs = [
            StrategyConfig::GexRecoil(Default::default()),
            StrategyConfig::StopHunt(Default::default()),
            StrategyConfig::OrderBlock(Default::default()),
            StrategyConfig::OvernightDrift(Default::default()),
        ];
        for config in configs {
            let strategy = config.build().unwrap();
            assert_eq!(strategy.name(), config.name());
        }
    }

    #[test]
    fn invalid_params_fail_build() {
        let config = StrategyConfig::StopHunt(StopHuntParams {
            min_penetration: -1.0,
            ..Default::default()
        });
        assert!(config.build().is_err());
    }

    #[test]
    fn oversized_cooldown_fails_every_variant() {
        let huge = 1 << 62;
        let configs = [
            StrategyConfig::GexRecoil(GexRecoilParams {
                cooldown_secs: huge,
                ..Default::default()
            }),
            StrategyConfig::StopHunt(StopHuntParams {
                cooldown_secs: huge,
                ..Default::default()
            }),
            StrategyConfig::OrderBlock(OrderBlockParams {
                cooldown_secs: huge,
                ..Default::default()
            }),
            StrategyConfig::OvernightDrift(OvernightDriftParams {
                cooldown_secs: huge,
                ..Default::default()
            }),
        ];
        for config in configs {
            assert!(
                matches!(config.build(), Err(ConfigError::Invalid { .. })),
                "{} accepted an oversized cooldown",
                config.name()
            );
        }
    }

    #[test]
    fn tagged_json_round_trip() {
        let json = r#"{"type":"order_block","lookback":5}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        match &config {
            StrategyConfig::OrderBlock(p) => {
                assert_eq!(p.lookback, 5);
                assert_eq!(p.expiry_bars, OrderBlockParams::default().expiry_bars);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"type":"llm_oracle"}"#;
        assert!(serde_json::from_str::<StrategyConfig>(json).is_err());
    }
}
