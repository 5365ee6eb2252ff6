//! Replay driver: bars in, trades out.
//!
//! One bar is fully processed before the next is accepted:
//!
//! 1. validate the bar (sane OHLC, non-decreasing timestamp)
//! 2. fuse the auxiliary feeds as of the bar
//! 3. exits for the open position
//! 4. fill or expire a resting limit order
//! 5. strategy evaluation, and submission of any intent
//!
//! Feeding bars one at a time through [`Replay::step`] lets a caller stop
//! whenever it likes; [`Replay::finish`] then reports what is still open.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, info_span, Span};

use super::config::{ConfigError, EngineConfig};
use super::execution::Execution;
use super::result::ReplayResult;
use crate::calendar::SessionCalendar;
use crate::data::{FusionError, MarketFeed};
use crate::domain::Bar;
use crate::strategy::{EvalOptions, Strategy};

/// Fatal replay errors. Any of these means the result would be invalid.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("bar {index} at {current} precedes the previous bar at {previous}")]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp} has malformed prices")]
    MalformedBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Single-strategy, single-symbol replay.
pub struct Replay<'a> {
    feed: &'a MarketFeed,
    strategy: Box<dyn Strategy>,
    calendar: SessionCalendar,
    execution: Execution,
    previous: Option<Bar>,
    index: usize,
    signal_count: usize,
    span: Span,
}

impl<'a> Replay<'a> {
    /// Validate the configuration and reset the strategy.
    pub fn new(
        config: &EngineConfig,
        feed: &'a MarketFeed,
        mut strategy: Box<dyn Strategy>,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        let calendar = config.build_calendar()?;
        strategy.reset();
        let span = info_span!("replay", strategy = strategy.name());
        Ok(Self {
            feed,
            execution: Execution::new(config.clone(), calendar.clone()),
            calendar,
            strategy,
            previous: None,
            index: 0,
            signal_count: 0,
            span,
        })
    }

    /// Number of bars processed so far.
    pub fn bars_processed(&self) -> usize {
        self.index
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Process one bar.
    pub fn step(&mut self, bar: &Bar) -> Result<(), ReplayError> {
        let span = self.span.clone();
        let _guard = span.enter();
        let index = self.index;

        if !bar.is_sane() {
            return Err(ReplayError::MalformedBar {
                index,
                timestamp: bar.timestamp,
            });
        }
        if let Some(prev) = &self.previous {
            if bar.timestamp < prev.timestamp {
                return Err(ReplayError::NonMonotonic {
                    index,
                    previous: prev.timestamp,
                    current: bar.timestamp,
                });
            }
        }

        let previous = self.previous.as_ref();
        let view = self.feed.view_at(bar, previous)?;

        self.execution.process_exits(bar, index);
        self.execution.process_pending(bar, index);

        let options = EvalOptions {
            bar_index: index,
            session: self.calendar.classify(bar.timestamp),
            trading_day: self.calendar.is_trading_day(bar.timestamp),
            calendar: &self.calendar,
        };
        if let Some(intent) = self.strategy.evaluate_signal(bar, previous, &view, &options) {
            self.signal_count += 1;
            debug!(index, side = %intent.side, price = intent.price, "signal emitted");
            // Rejections are recorded by the state machine.
            let _ = self.execution.submit(intent, bar, index, options.session);
        }

        self.previous = Some(bar.clone());
        self.index += 1;
        Ok(())
    }

    /// Stop replaying and collect the result.
    pub fn finish(self) -> ReplayResult {
        let strategy = self.strategy.name().to_string();
        let outcome = self.execution.into_parts();
        let _guard = self.span.enter();
        info!(
            bars = self.index,
            signals = self.signal_count,
            trades = outcome.trades.len(),
            rejected = outcome.rejected.len(),
            "replay finished"
        );
        ReplayResult {
            strategy,
            bar_count: self.index,
            signal_count: self.signal_count,
            trades: outcome.trades,
            open_position: outcome.open_position,
            pending_order: outcome.pending_order,
            rejected: outcome.rejected,
            expired_orders: outcome.expired_orders,
        }
    }

    /// Replay every bar, then finish.
    pub fn run(mut self, bars: &[Bar]) -> Result<ReplayResult, ReplayError> {
        for bar in bars {
            self.step(bar)?;
        }
        Ok(self.finish())
    }
}

/// One-call replay over a full bar sequence.
pub fn replay(
    config: &EngineConfig,
    feed: &MarketFeed,
    strategy: Box<dyn Strategy>,
    bars: &[Bar],
) -> Result<ReplayResult, ReplayError> {
    Replay::new(config, feed, strategy)?.run(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketView;
    use crate::domain::{Side, SignalIntent, Timeframe};
    use chrono::{Duration, TimeZone};

    /// Goes long on every bar at its close with fixed stop/target distances.
    struct EveryBar;

    impl Strategy for EveryBar {
        fn name(&self) -> &str {
            "every_bar"
        }

        fn evaluate_signal(
            &mut self,
            bar: &Bar,
            _previous: Option<&Bar>,
            _view: &MarketView<'_>,
            _options: &EvalOptions<'_>,
        ) -> Option<SignalIntent> {
            Some(SignalIntent::market(
                "every_bar",
                bar.symbol.clone(),
                bar.timestamp,
                Side::Long,
                bar.close,
                bar.close - 5.0,
                bar.close + 5.0,
            ))
        }

        fn reset(&mut self) {}
    }

    fn bar(i: i64, close: f64) -> Bar {
        Bar {
            symbol: "NQ".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap() + Duration::minutes(15 * i),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            timeframe: Timeframe::M15,
        }
    }

    #[test]
    fn out_of_order_bars_are_fatal() {
        let feed = MarketFeed::new();
        let mut replay = Replay::new(&EngineConfig::default(), &feed, Box::new(EveryBar)).unwrap();
        replay.step(&bar(1, 100.0)).unwrap();
        let err = replay.step(&bar(0, 100.0)).unwrap_err();
        assert!(matches!(err, ReplayError::NonMonotonic { index: 1, .. }));
    }

    #[test]
    fn malformed_bar_is_fatal() {
        let feed = MarketFeed::new();
        let mut replay = Replay::new(&EngineConfig::default(), &feed, Box::new(EveryBar)).unwrap();
        let mut b = bar(0, 100.0);
        b.high = 90.0;
        assert!(matches!(
            replay.step(&b),
            Err(ReplayError::MalformedBar { index: 0, .. })
        ));
    }

    #[test]
    fn invalid_config_fails_before_first_bar() {
        let feed = MarketFeed::new();
        let config = EngineConfig {
            cooldown_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            Replay::new(&config, &feed, Box::new(EveryBar)),
            Err(ReplayError::Config(_))
        ));
    }

    #[test]
    fn oversized_cooldown_fails_before_first_bar() {
        let feed = MarketFeed::new();
        let config = EngineConfig {
            cooldown_secs: 1 << 62,
            ..Default::default()
        };
        assert!(matches!(
            Replay::new(&config, &feed, Box::new(EveryBar)),
            Err(ReplayError::Config(ConfigError::Invalid { field: "cooldown_secs", .. }))
        ));
    }

    #[test]
    fn signals_during_open_position_are_rejected() {
        let feed = MarketFeed::new();
        let config = EngineConfig {
            cooldown_secs: 1,
            ..Default::default()
        };
        let bars: Vec<Bar> = (0..4).map(|i| bar(i, 100.0)).collect();
        let result = replay(&config, &feed, Box::new(EveryBar), &bars).unwrap();
        assert_eq!(result.bar_count, 4);
        assert_eq!(result.signal_count, 4);
        assert!(result.trades.is_empty());
        assert_eq!(result.rejected.len(), 3);
        assert!(result.open_position.is_some());
    }

    #[test]
    fn stepping_can_stop_early() {
        let feed = MarketFeed::new();
        let mut replay = Replay::new(&EngineConfig::default(), &feed, Box::new(EveryBar)).unwrap();
        replay.step(&bar(0, 100.0)).unwrap();
        assert_eq!(replay.bars_processed(), 1);
        let result = replay.finish();
        assert_eq!(result.bar_count, 1);
        assert!(!result.is_flat());
    }
}
