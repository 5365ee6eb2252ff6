//! Look-ahead contamination tests.
//!
//! Invariant: no decision at bar t may depend on a bar or snapshot stamped
//! after bar t.
//!
//! Method: replay a truncated series (bars 0..n) and the full series, with
//! and without extra snapshots published after bar n. Everything the
//! truncated run decided must reappear unchanged in the longer runs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use slingshot_core::data::{MarketFeed, MarketView, SnapshotSeries};
use slingshot_core::domain::{
    Bar, ImbalanceSnapshot, LiquidityLevelSnapshot, OptionsLevelSnapshot, Regime, Sentiment,
    SignalIntent, Timeframe,
};
use slingshot_core::engine::{replay, EngineConfig, ReplayResult};
use slingshot_core::strategy::{
    EvalOptions, GexRecoilParams, OrderBlockParams, OvernightDriftParams, StopHuntParams,
    Strategy, StrategyConfig,
};

/// Sunday 2025-03-02 23:00 UTC, inside the overnight session.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 2, 23, 0, 0).unwrap()
}

/// Generate N 15-minute bars of synthetic data with realistic variation.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(n);
    let mut price = 21_000.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64)
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let change = ((seed >> 33) % 200) as f64 / 10.0 - 10.0; // -10.0 to +10.0
        let open = price;
        price += change;
        let close = price;
        let wick = ((seed >> 20) % 80) as f64 / 10.0;
        bars.push(Bar {
            symbol: "NQ".into(),
            timestamp: start() + Duration::minutes(15 * i as i64),
            open,
            high: open.max(close) + wick,
            low: open.min(close) - (8.0 - wick),
            close,
            volume: 500.0 + ((seed >> 40) % 1500) as f64,
            timeframe: Timeframe::M15,
        });
    }
    bars
}

/// Options levels every 4 bars, placed around the prevailing price.
fn options_for(bars: &[Bar]) -> Vec<OptionsLevelSnapshot> {
    bars.iter()
        .step_by(4)
        .map(|b| {
            let anchor = (b.close / 25.0).round() * 25.0;
            OptionsLevelSnapshot {
                timestamp: b.timestamp,
                gamma_flip: Some(anchor - 50.0),
                call_wall: Some(anchor + 50.0),
                put_wall: Some(anchor - 25.0),
                support: vec![anchor - 10.0, anchor - 40.0, anchor - 60.0],
                resistance: vec![anchor + 10.0, anchor + 40.0],
                regime: Regime::Positive,
                total_exposure: 1.0e9,
            }
        })
        .collect()
}

fn liquidity_for(bars: &[Bar]) -> Vec<LiquidityLevelSnapshot> {
    bars.iter()
        .step_by(6)
        .map(|b| LiquidityLevelSnapshot {
            timestamp: b.timestamp + Duration::minutes(1),
            sentiment: Sentiment::Neutral,
            levels: vec![b.low - 30.0, b.low - 15.0, b.high + 15.0],
        })
        .collect()
}

fn feed(options: Vec<OptionsLevelSnapshot>, liquidity: Vec<LiquidityLevelSnapshot>) -> MarketFeed {
    MarketFeed::new()
        .with_options(SnapshotSeries::new(options).unwrap())
        .with_liquidity(SnapshotSeries::new(liquidity).unwrap())
}

fn all_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::GexRecoil(GexRecoilParams::default()),
        StrategyConfig::StopHunt(StopHuntParams {
            swing_strength: Some(2),
            ..Default::default()
        }),
        StrategyConfig::OrderBlock(OrderBlockParams::default()),
        StrategyConfig::OvernightDrift(OvernightDriftParams {
            require_above_flip: false,
            ..Default::default()
        }),
    ]
}

fn run(config: &StrategyConfig, feed: &MarketFeed, bars: &[Bar]) -> ReplayResult {
    replay(&EngineConfig::default(), feed, config.build().unwrap(), bars).unwrap()
}

/// Every trade the truncated run closed must be a trade of the full run.
fn assert_prefix(truncated: &ReplayResult, full: &ReplayResult) {
    assert!(
        truncated.trades.len() <= full.trades.len(),
        "{}: truncated run closed more trades than the full run",
        truncated.strategy
    );
    assert_eq!(
        truncated.trades,
        full.trades[..truncated.trades.len()],
        "{}: future bars changed past trades",
        truncated.strategy
    );
    assert_eq!(
        truncated.rejected,
        full.rejected[..truncated.rejected.len()],
        "{}: future bars changed past rejections",
        truncated.strategy
    );
}

#[test]
fn future_bars_do_not_change_past_trades() {
    let bars = make_test_bars(600);
    let feed = feed(options_for(&bars), liquidity_for(&bars));

    for config in all_strategies() {
        let full = run(&config, &feed, &bars);
        for cut in [100, 250, 417] {
            let truncated = run(&config, &feed, &bars[..cut]);
            assert_eq!(truncated.bar_count, cut);
            assert_prefix(&truncated, &full);
        }
    }
}

#[test]
fn future_snapshots_are_invisible() {
    let bars = make_test_bars(300);
    let cut = 180;
    let last_visible = bars[cut - 1].timestamp;

    let options = options_for(&bars);
    let liquidity = liquidity_for(&bars);
    let past_options: Vec<_> = options.iter().filter(|s| s.timestamp <= last_visible).cloned().collect();
    let past_liquidity: Vec<_> = liquidity.iter().filter(|s| s.timestamp <= last_visible).cloned().collect();

    // Same past, but the future is wildly different.
    let mut poisoned_options = past_options.clone();
    poisoned_options.extend(options.iter().filter(|s| s.timestamp > last_visible).map(|s| {
        let mut s = s.clone();
        s.put_wall = Some(0.0);
        s.support = vec![1.0e6];
        s.regime = Regime::Negative;
        s
    }));
    let clean = feed(past_options, past_liquidity.clone());
    let poisoned = feed(poisoned_options, past_liquidity);

    for config in all_strategies() {
        let a = run(&config, &clean, &bars[..cut]);
        let b = run(&config, &poisoned, &bars[..cut]);
        assert_eq!(a, b, "{}: snapshot after the last bar leaked", config.name());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

#[test]
fn fused_view_only_holds_past_snapshots() {
    let bars = make_test_bars(200);
    let imbalance: Vec<ImbalanceSnapshot> = bars
        .iter()
        .step_by(3)
        .map(|b| ImbalanceSnapshot {
            timestamp: b.timestamp + Duration::seconds(30),
            bid_size: 10.0,
            ask_size: 5.0,
            imbalance: 1.0 / 3.0,
            updates: 1,
        })
        .collect();
    let feed = feed(options_for(&bars), liquidity_for(&bars))
        .with_imbalance(SnapshotSeries::new(imbalance).unwrap());

    for (i, bar) in bars.iter().enumerate() {
        let previous = i.checked_sub(1).map(|p| &bars[p]);
        let view = feed.view_at(bar, previous).unwrap();
        if let Some(o) = view.options {
            assert!(o.timestamp <= bar.timestamp);
        }
        if let Some(l) = view.liquidity {
            assert!(l.timestamp <= bar.timestamp);
        }
        if let Some(m) = view.imbalance {
            assert!(m.timestamp <= bar.timestamp);
        }
        // Options are stamped at every 4th bar's own time and must be visible there.
        if i % 4 == 0 {
            assert_eq!(view.options.map(|o| o.timestamp), Some(bar.timestamp));
        }
    }

    // The first bar precedes every imbalance and liquidity stamp.
    let first = feed.view_at(&bars[0], None).unwrap();
    assert!(first.imbalance.is_none());
    assert!(first.liquidity.is_none());
}

/// Records what it was shown and never trades.
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

/// Bar time, previous bar time, options snapshot time.
type Seen = (DateTime<Utc>, Option<DateTime<Utc>>, Option<DateTime<Utc>>);

impl Strategy for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        previous: Option<&Bar>,
        view: &MarketView<'_>,
        _options: &EvalOptions<'_>,
    ) -> Option<SignalIntent> {
        self.seen.lock().unwrap().push((
            bar.timestamp,
            previous.map(|p| p.timestamp),
            view.options.map(|o| o.timestamp),
        ));
        None
    }

    fn reset(&mut self) {
        self.seen.lock().unwrap().clear();
    }
}

#[test]
fn strategy_sees_only_the_previous_bar() {
    let bars = make_test_bars(50);
    let feed = feed(options_for(&bars), vec![]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder { seen: Arc::clone(&seen) };

    let result = replay(&EngineConfig::default(), &feed, Box::new(recorder), &bars).unwrap();
    assert_eq!(result.signal_count, 0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), bars.len());
    assert_eq!(seen[0].1, None);
    for (i, (now, previous, snapshot)) in seen.iter().enumerate().skip(1) {
        assert_eq!(*now, bars[i].timestamp);
        assert_eq!(*previous, Some(bars[i - 1].timestamp));
        assert!(snapshot.is_some_and(|s| s <= *now));
    }
}
