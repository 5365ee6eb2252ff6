//! GEX recoil fade: buy the close after price slips below a put wall or support.
//!
//! Entries rest as a limit at the signal bar's close unless `entry` says
//! otherwise.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Confirmation, Cooldown, EvalOptions, Strategy};
use crate::data::MarketView;
use crate::domain::{Bar, EntryKind, LevelSource, Side, SignalIntent, TrailingSpec};
use crate::engine::config::{ensure_cooldown, ensure_non_negative, ensure_positive, ConfigError};

/// Number of support levels checked after the put wall.
const SUPPORTS_CHECKED: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GexRecoilParams {
    pub entry: EntryKind,
    /// Points below the signal bar's low for the stop.
    pub stop_buffer: f64,
    /// Largest accepted entry-to-stop distance.
    pub max_risk: f64,
    pub target_points: f64,
    pub use_liquidity_filter: bool,
    /// Skip a level with more liquidity levels than this below it.
    pub max_lt_levels_below: usize,
    pub trailing: Option<TrailingSpec>,
    pub cooldown_secs: u64,
    pub confirmation: Confirmation,
}

impl Default for GexRecoilParams {
    fn default() -> Self {
        Self {
            entry: EntryKind::Limit,
            stop_buffer: 10.0,
            max_risk: 30.0,
            target_points: 25.0,
            use_liquidity_filter: true,
            max_lt_levels_below: 3,
            trailing: Some(TrailingSpec::new(15.0, 10.0)),
            cooldown_secs: 900,
            confirmation: Confirmation::default(),
        }
    }
}

impl GexRecoilParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("gex_recoil.stop_buffer", self.stop_buffer)?;
        ensure_positive("gex_recoil.max_risk", self.max_risk)?;
        ensure_positive("gex_recoil.target_points", self.target_points)?;
        ensure_cooldown("gex_recoil.cooldown_secs", self.cooldown_secs)?;
        if let Some(t) = self.trailing {
            if !t.is_valid() {
                return Err(ConfigError::InvalidTrailing {
                    activation: t.activation,
                    offset: t.offset,
                });
            }
        }
        if !self.confirmation.is_valid() {
            return Err(ConfigError::Invalid {
                field: "gex_recoil.confirmation",
                reason: "min_imbalance must lie in [0, 1]".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GexRecoil {
    params: GexRecoilParams,
    cooldown: Cooldown,
}

impl GexRecoil {
    pub fn new(params: GexRecoilParams) -> Self {
        let cooldown = Cooldown::from_secs(params.cooldown_secs);
        Self { params, cooldown }
    }

    pub fn params(&self) -> &GexRecoilParams {
        &self.params
    }
}

impl Strategy for GexRecoil {
    fn name(&self) -> &str {
        "gex_recoil"
    }

    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        previous: Option<&Bar>,
        view: &MarketView<'_>,
        _options: &EvalOptions<'_>,
    ) -> Option<SignalIntent> {
        let prev = previous?;
        if prev.symbol != bar.symbol {
            debug!(current = %bar.symbol, previous = %prev.symbol, "symbol changed between bars");
            return None;
        }
        if !self.cooldown.is_ready(bar.timestamp) {
            return None;
        }
        let gex = view.options?;

        let candidates = std::iter::once((LevelSource::PutWall, gex.put_wall)).chain(
            (0..SUPPORTS_CHECKED)
                .map(|i| (LevelSource::Support(i), gex.support_level(i))),
        );

        for (source, level) in candidates {
            let Some(level) = level else { continue };
            if !(prev.close >= level && bar.close < level) {
                continue;
            }

            let lt_below = match view.liquidity {
                Some(lt) if self.params.use_liquidity_filter => {
                    let below = lt.count_below(level);
                    if below > self.params.max_lt_levels_below {
                        debug!(%source, level, below, "liquidity filter rejected level");
                        continue;
                    }
                    below
                }
                _ => 0,
            };

            let stop = bar.low - self.params.stop_buffer;
            let risk = bar.close - stop;
            if risk <= 0.0 || risk > self.params.max_risk {
                debug!(%source, level, risk, "risk filter rejected level");
                continue;
            }

            if !self.params.confirmation.confirms(Side::Long, view) {
                debug!(%source, level, "order flow did not confirm");
                continue;
            }

            self.cooldown.mark(bar.timestamp);
            let intent = SignalIntent::market(
                self.name(),
                bar.symbol.clone(),
                bar.timestamp,
                Side::Long,
                bar.close,
                stop,
                bar.close + self.params.target_points,
            )
            .with_entry(self.params.entry)
            .with_trailing(self.params.trailing)
            .with_meta("gex_level", level)
            .with_meta("gex_level_type", source.to_string())
            .with_meta("lt_levels_below", lt_below)
            .with_meta("risk_points", risk)
            .with_meta("regime", format!("{:?}", gex.regime).to_lowercase());
            return Some(intent);
        }
        None
    }

    fn reset(&mut self) {
        self.cooldown.reset();
    }
}
