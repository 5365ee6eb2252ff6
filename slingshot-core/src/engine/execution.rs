//! Order and position execution state machine.
//!
//! ```text
//! Flat ──submit(market)──────────────────────────► Open ──exit──► Flat (+ Trade)
//!   │                                              ▲
//!   └──submit(limit)──► PendingFill ──touched──────┘
//!                            │
//!                            └──timeout──► Flat (order discarded)
//! ```
//!
//! Per bar the driver calls [`Execution::process_exits`], then
//! [`Execution::process_pending`], then (if the strategy emitted something)
//! [`Execution::submit`]. The bar that fills an entry is never checked for
//! exits; the position is managed from the following bar on.
//!
//! # Exit priority
//! When several exit conditions hold on one bar the first match wins:
//! 1. forced exit (intent deadline or session close) at the bar open
//! 2. initial stop touched, at the stop or the open if the bar gapped through
//! 3. target touched, at the target
//! 4. trailed stop touched, at the stop or the open if the bar gapped through
//! 5. max-hold timeout, at the bar close

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use super::config::{cooldown_duration, EngineConfig};
use super::ratchet::advance_trailing;
use crate::calendar::{Session, SessionCalendar};
use crate::domain::{
    Bar, EntryKind, ExitReason, Position, Side, SignalIntent, Trade, TrailingState,
};

/// Why a signal was refused. Rejections are recorded, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Price, stop or target is not finite.
    InvalidPrice,
    StopWrongSide,
    TargetWrongSide,
    NonPositiveQuantity,
    InvalidTrailing,
    /// Forced-exit deadline is not after the signal time.
    ForcedExitInPast,
    PositionOpen,
    OrderPending,
    Cooldown,
    SessionFiltered,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::InvalidPrice => "invalid_price",
            RejectionReason::StopWrongSide => "stop_wrong_side",
            RejectionReason::TargetWrongSide => "target_wrong_side",
            RejectionReason::NonPositiveQuantity => "non_positive_quantity",
            RejectionReason::InvalidTrailing => "invalid_trailing",
            RejectionReason::ForcedExitInPast => "forced_exit_in_past",
            RejectionReason::PositionOpen => "position_open",
            RejectionReason::OrderPending => "order_pending",
            RejectionReason::Cooldown => "cooldown",
            RejectionReason::SessionFiltered => "session_filtered",
        };
        f.write_str(s)
    }
}

/// Audit record for a refused signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSignal {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub side: Side,
    pub reason: RejectionReason,
}

/// A limit intent waiting for the market to touch its price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub intent: SignalIntent,
    pub quantity: f64,
    pub created_bar: usize,
    /// Number of bars after creation the order may fill on.
    pub timeout_bars: usize,
}

impl PendingOrder {
    /// Long limits fill when the low reaches the price, short limits when the high does.
    pub fn is_touched(&self, bar: &Bar) -> bool {
        match self.intent.side {
            Side::Long => bar.low <= self.intent.price,
            Side::Short => bar.high >= self.intent.price,
        }
    }

    /// True once `bar` is at or after the intent's forced-exit time.
    pub fn is_past_deadline(&self, bar: &Bar) -> bool {
        self.intent.forced_exit_at.is_some_and(|t| bar.timestamp >= t)
    }

    /// True once `bar_index` is the last bar the order may fill on.
    pub fn is_last_chance(&self, bar_index: usize) -> bool {
        bar_index >= self.created_bar + self.timeout_bars
    }
}

/// A limit order discarded after its timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredOrder {
    pub order: PendingOrder,
    pub expired_bar: usize,
    pub expired_at: DateTime<Utc>,
}

/// Current state of the machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionState {
    #[default]
    Flat,
    PendingFill(PendingOrder),
    Open(Position),
}

impl ExecutionState {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Flat => "flat",
            ExecutionState::PendingFill(_) => "pending_fill",
            ExecutionState::Open(_) => "open",
        }
    }
}

/// Single-symbol execution state machine.
#[derive(Debug, Clone)]
pub struct Execution {
    config: EngineConfig,
    calendar: SessionCalendar,
    cooldown: Duration,
    state: ExecutionState,
    last_accepted: Option<DateTime<Utc>>,
    trades: Vec<Trade>,
    rejected: Vec<RejectedSignal>,
    expired: Vec<ExpiredOrder>,
}

impl Execution {
    /// Build from a config that has already passed `validate()`.
    pub fn new(config: EngineConfig, calendar: SessionCalendar) -> Self {
        let cooldown = cooldown_duration(config.cooldown_secs);
        Self {
            config,
            calendar,
            cooldown,
            state: ExecutionState::Flat,
            last_accepted: None,
            trades: Vec::new(),
            rejected: Vec::new(),
            expired: Vec::new(),
        }
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            ExecutionState::Open(p) => Some(p),
            _ => None,
        }
    }

    pub fn pending_order(&self) -> Option<&PendingOrder> {
        match &self.state {
            ExecutionState::PendingFill(o) => Some(o),
            _ => None,
        }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn rejected(&self) -> &[RejectedSignal] {
        &self.rejected
    }

    pub fn expired_orders(&self) -> &[ExpiredOrder] {
        &self.expired
    }

    // ─── Entry ───────────────────────────────────────────────────────

    /// Offer a strategy intent emitted on `bar`. Market intents fill at their
    /// price immediately; limit intents start resting.
    pub fn submit(
        &mut self,
        intent: SignalIntent,
        bar: &Bar,
        bar_index: usize,
        session: Session,
    ) -> Result<(), RejectionReason> {
        if let Err(reason) = self.check(&intent, session) {
            debug!(
                bar_index,
                strategy = %intent.strategy,
                side = %intent.side,
                %reason,
                "signal rejected"
            );
            self.rejected.push(RejectedSignal {
                bar_index,
                timestamp: intent.timestamp,
                strategy: intent.strategy.clone(),
                side: intent.side,
                reason,
            });
            return Err(reason);
        }

        self.last_accepted = Some(intent.timestamp);
        let quantity = intent.quantity.unwrap_or(self.config.default_quantity);
        match intent.entry {
            EntryKind::Market => {
                let price = intent.price;
                self.open(intent, quantity, price, bar, bar_index);
            }
            EntryKind::Limit => {
                debug!(bar_index, price = intent.price, side = %intent.side, "limit order resting");
                self.state = ExecutionState::PendingFill(PendingOrder {
                    intent,
                    quantity,
                    created_bar: bar_index,
                    timeout_bars: self.config.limit_fill_timeout_bars,
                });
            }
        }
        Ok(())
    }

    fn check(&self, intent: &SignalIntent, session: Session) -> Result<(), RejectionReason> {
        validate_intent(intent, self.config.default_quantity)?;
        match self.state {
            ExecutionState::Open(_) => return Err(RejectionReason::PositionOpen),
            ExecutionState::PendingFill(_) => return Err(RejectionReason::OrderPending),
            ExecutionState::Flat => {}
        }
        if !self.config.allowed_sessions.contains(&session) {
            return Err(RejectionReason::SessionFiltered);
        }
        if let Some(last) = self.last_accepted {
            if intent.timestamp - last < self.cooldown {
                return Err(RejectionReason::Cooldown);
            }
        }
        Ok(())
    }

    fn open(&mut self, intent: SignalIntent, quantity: f64, price: f64, bar: &Bar, bar_index: usize) {
        let trailing = intent
            .trailing
            .or(self.config.trailing)
            .map(|spec| TrailingState::new(spec, price));
        let max_hold_until = intent
            .max_hold_bars
            .or(self.config.max_hold_bars)
            .map(|n| bar_index + n);
        let session_close_at = if self.config.force_close_at_session_end {
            match self.calendar.session_end_after(bar.timestamp) {
                Ok(t) => Some(t),
                Err(err) => {
                    warn!(%err, "no session-end deadline for position");
                    None
                }
            }
        } else {
            None
        };

        info!(
            bar_index,
            strategy = %intent.strategy,
            side = %intent.side,
            price,
            stop = intent.stop,
            target = intent.target,
            "position opened"
        );
        self.state = ExecutionState::Open(Position {
            strategy: intent.strategy,
            symbol: intent.symbol,
            side: intent.side,
            quantity,
            entry_price: price,
            entry_time: bar.timestamp,
            entry_bar: bar_index,
            initial_stop: intent.stop,
            stop: intent.stop,
            target: intent.target,
            trailing,
            forced_exit_at: intent.forced_exit_at,
            session_close_at,
            max_hold_until,
            best_price: price,
            worst_price: price,
            metadata: intent.metadata,
        });
    }

    // ─── Pending limit orders ────────────────────────────────────────

    /// Fill or expire a resting limit order. Never acts on the bar that created it.
    ///
    /// An order whose intent deadline has been reached expires without
    /// checking for a touch.
    pub fn process_pending(&mut self, bar: &Bar, bar_index: usize) {
        let order = match &self.state {
            ExecutionState::PendingFill(o) if bar_index > o.created_bar => o.clone(),
            _ => return,
        };
        if order.is_past_deadline(bar) {
            warn!(
                bar_index,
                created_bar = order.created_bar,
                price = order.intent.price,
                "limit order reached its forced-exit time unfilled"
            );
            self.expire(order, bar, bar_index);
        } else if order.is_touched(bar) {
            let price = order.intent.price;
            self.state = ExecutionState::Flat;
            self.open(order.intent, order.quantity, price, bar, bar_index);
        } else if order.is_last_chance(bar_index) {
            warn!(
                bar_index,
                created_bar = order.created_bar,
                price = order.intent.price,
                "limit order expired unfilled"
            );
            self.expire(order, bar, bar_index);
        }
    }

    fn expire(&mut self, order: PendingOrder, bar: &Bar, bar_index: usize) {
        self.state = ExecutionState::Flat;
        self.expired.push(ExpiredOrder {
            order,
            expired_bar: bar_index,
            expired_at: bar.timestamp,
        });
    }

    // ─── Exits ───────────────────────────────────────────────────────

    /// Check the open position against `bar`. Returns the trade if it closed.
    pub fn process_exits(&mut self, bar: &Bar, bar_index: usize) -> Option<&Trade> {
        let (reason, price) = match &mut self.state {
            ExecutionState::Open(p) if bar_index > p.entry_bar => match exit_for(p, bar, bar_index) {
                Some(exit) => exit,
                None => {
                    p.track_excursion(bar);
                    if advance_trailing(p, bar) {
                        debug!(bar_index, stop = p.stop, "trailing stop ratcheted");
                    }
                    return None;
                }
            },
            _ => return None,
        };
        let ExecutionState::Open(mut position) = std::mem::take(&mut self.state) else {
            return None;
        };
        fold_exit_price(&mut position, price);
        let trade = self.close(position, bar, bar_index, reason, price);
        self.trades.push(trade);
        self.trades.last()
    }

    fn close(
        &self,
        position: Position,
        bar: &Bar,
        bar_index: usize,
        reason: ExitReason,
        price: f64,
    ) -> Trade {
        let gross_pnl = position.points_at(price) * position.quantity * self.config.point_value;
        let cost = self
            .config
            .costs
            .round_trip(position.quantity, self.config.point_value);
        let net_pnl = gross_pnl - cost.total();
        info!(
            bar_index,
            strategy = %position.strategy,
            side = %position.side,
            %reason,
            entry = position.entry_price,
            exit = price,
            net_pnl,
            "position closed"
        );
        Trade {
            mae: position.mae(),
            mfe: position.mfe(),
            strategy: position.strategy,
            symbol: position.symbol,
            side: position.side,
            quantity: position.quantity,
            entry_bar: position.entry_bar,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_bar: bar_index,
            exit_time: bar.timestamp,
            exit_price: price,
            exit_reason: reason,
            gross_pnl,
            commission: cost.commission,
            slippage: cost.slippage,
            net_pnl,
            bars_held: bar_index - position.entry_bar,
            metadata: position.metadata,
        }
    }

    /// Hand back whatever is still unresolved at end of data.
    pub fn into_parts(self) -> ExecutionOutcome {
        let (open_position, pending_order) = match self.state {
            ExecutionState::Flat => (None, None),
            ExecutionState::PendingFill(o) => (None, Some(o)),
            ExecutionState::Open(p) => (Some(p), None),
        };
        ExecutionOutcome {
            trades: self.trades,
            open_position,
            pending_order,
            rejected: self.rejected,
            expired_orders: self.expired,
        }
    }
}

/// Everything the state machine produced over a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub trades: Vec<Trade>,
    pub open_position: Option<Position>,
    pub pending_order: Option<PendingOrder>,
    pub rejected: Vec<RejectedSignal>,
    pub expired_orders: Vec<ExpiredOrder>,
}

/// Structural checks on an intent, independent of engine state.
pub fn validate_intent(intent: &SignalIntent, default_quantity: f64) -> Result<(), RejectionReason> {
    if !(intent.price.is_finite() && intent.stop.is_finite() && intent.target.is_finite()) {
        return Err(RejectionReason::InvalidPrice);
    }
    if intent.risk() <= 0.0 {
        return Err(RejectionReason::StopWrongSide);
    }
    if intent.reward() <= 0.0 {
        return Err(RejectionReason::TargetWrongSide);
    }
    let quantity = intent.quantity.unwrap_or(default_quantity);
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(RejectionReason::NonPositiveQuantity);
    }
    if intent.trailing.is_some_and(|t| !t.is_valid()) {
        return Err(RejectionReason::InvalidTrailing);
    }
    if intent.forced_exit_at.is_some_and(|t| t <= intent.timestamp) {
        return Err(RejectionReason::ForcedExitInPast);
    }
    Ok(())
}

/// First exit condition satisfied by `bar`, with its fill price.
fn exit_for(position: &Position, bar: &Bar, bar_index: usize) -> Option<(ExitReason, f64)> {
    if position.forced_exit_at.is_some_and(|t| bar.timestamp >= t) {
        return Some((ExitReason::ForcedExit, bar.open));
    }
    if position.session_close_at.is_some_and(|t| bar.timestamp >= t) {
        return Some((ExitReason::SessionClose, bar.open));
    }

    let trailed = position.stop_has_trailed();
    let stop_hit = stop_touched(position, bar);
    if stop_hit && !trailed {
        return Some((ExitReason::StopLoss, stop_fill(position, bar)));
    }
    if target_touched(position, bar) {
        return Some((ExitReason::TakeProfit, position.target));
    }
    if stop_hit && trailed {
        return Some((ExitReason::TrailingStop, stop_fill(position, bar)));
    }
    if position.max_hold_until.is_some_and(|until| bar_index >= until) {
        return Some((ExitReason::MaxHold, bar.close));
    }
    None
}

fn stop_touched(position: &Position, bar: &Bar) -> bool {
    match position.side {
        Side::Long => bar.low <= position.stop,
        Side::Short => bar.high >= position.stop,
    }
}

fn target_touched(position: &Position, bar: &Bar) -> bool {
    match position.side {
        Side::Long => bar.high >= position.target,
        Side::Short => bar.low <= position.target,
    }
}

/// Stop fill, or the open when the bar gapped through the stop.
fn stop_fill(position: &Position, bar: &Bar) -> f64 {
    match position.side {
        Side::Long if bar.open < position.stop => bar.open,
        Side::Short if bar.open > position.stop => bar.open,
        _ => position.stop,
    }
}

/// On the exit bar only the exit price itself counts toward excursion.
fn fold_exit_price(position: &mut Position, price: f64) {
    match position.side {
        Side::Long => {
            position.best_price = position.best_price.max(price);
            position.worst_price = position.worst_price.min(price);
        }
        Side::Short => {
            position.best_price = position.best_price.min(price);
            position.worst_price = position.worst_price.max(price);
        }
    }
}
