// Simulation orchestrator: the only stateful, mutable component.
//
// Feed events and parameter changes are applied to completion, one at a
// time, so every published result reflects exactly one snapshot+parameter
// pair. Collaborators read an atomically replaced view.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::core::cost_model::CostModelEngine;
use crate::core::metrics::{self, MarketMetrics};
use crate::error::SimResult;
use crate::feed::{ConnectionState, FeedEvent};
use crate::types::{OrderBookSnapshot, SimulationParameters, SimulationResult, TimeSeriesPoint};

/// Fixed capacity of the result history ring
pub const HISTORY_CAPACITY: usize = 100;

/// Read-only state published after every applied event. Readers always see
/// a fully-old or fully-new view, never a partial update.
#[derive(Debug, Clone)]
pub struct SimulationView {
    pub result: Option<SimulationResult>,
    pub metrics: Option<MarketMetrics>,
    pub history: Vec<TimeSeriesPoint>,
    pub connected: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SimulationView {
    fn empty() -> Self {
        Self {
            result: None,
            metrics: None,
            history: Vec::new(),
            connected: false,
            last_updated: None,
            last_error: None,
        }
    }

    /// Human-readable last-updated timestamp for display
    pub fn last_updated_display(&self) -> String {
        match self.last_updated {
            Some(t) => t.format("%H:%M:%S%.3f UTC").to_string(),
            None => "never".to_string(),
        }
    }
}

pub struct SimulationOrchestrator {
    engine: CostModelEngine,
    params: SimulationParameters,
    snapshot: Option<OrderBookSnapshot>,
    current_result: Option<SimulationResult>,
    current_metrics: Option<MarketMetrics>,
    history: VecDeque<TimeSeriesPoint>,
    last_updated: Option<DateTime<Utc>>,
    connected: bool,
    last_error: Option<String>,
    view_tx: watch::Sender<SimulationView>,
}

impl SimulationOrchestrator {
    pub fn new(
        engine: CostModelEngine,
        params: SimulationParameters,
    ) -> (Self, watch::Receiver<SimulationView>) {
        let (view_tx, view_rx) = watch::channel(SimulationView::empty());

        let orchestrator = Self {
            engine,
            params,
            snapshot: None,
            current_result: None,
            current_metrics: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_updated: None,
            connected: false,
            last_error: None,
            view_tx,
        };

        (orchestrator, view_rx)
    }

    /// Apply one feed event to completion
    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => {
                self.connected = true;
                self.last_error = None;
            }
            FeedEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            FeedEvent::Error(reason) => {
                // Parse errors land here too; connection status is driven
                // by the state channel, not guessed from the error text
                self.last_error = Some(reason);
            }
            FeedEvent::Closed { code, reason } => {
                self.connected = false;
                self.last_error = Some(match code {
                    Some(code) => format!("connection closed ({}): {}", code, reason),
                    None => format!("connection closed: {}", reason),
                });
            }
        }
        self.publish();
    }

    /// Track the feed's connection state machine. Status flips to
    /// disconnected immediately on any transport error or close; the last
    /// good result stays on display.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connected = state.is_connected();
        self.publish();
    }

    /// Replace the user parameters and recompute against the stored
    /// snapshot. Parameter-only recomputes never append to the history:
    /// the time series stays snapshot-driven.
    pub fn update_parameters(&mut self, params: SimulationParameters) -> SimResult<()> {
        params.validate()?;
        self.params = params;

        if let Some(snapshot) = self.snapshot.as_ref() {
            let market = metrics::compute(snapshot);
            let result = self.engine.estimate(snapshot, &market, &self.params);
            self.current_metrics = Some(market);
            self.current_result = Some(result);
            self.last_updated = Some(Utc::now());
        }

        self.publish();
        Ok(())
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn current_result(&self) -> Option<&SimulationResult> {
        self.current_result.as_ref()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Dispatch loop: consumes feed events, connection-state changes and
    /// parameter updates until the feed's event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FeedEvent>,
        mut states: watch::Receiver<ConnectionState>,
        mut param_rx: mpsc::Receiver<SimulationParameters>,
    ) {
        let mut states_open = true;
        let mut params_open = true;

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = states.changed(), if states_open => match changed {
                    Ok(()) => {
                        let state = *states.borrow_and_update();
                        self.set_connection_state(state);
                    }
                    Err(_) => states_open = false,
                },
                maybe_params = param_rx.recv(), if params_open => match maybe_params {
                    Some(params) => {
                        if let Err(e) = self.update_parameters(params) {
                            warn!("Rejected parameter update: {}", e);
                        }
                    }
                    None => params_open = false,
                },
            }
        }

        debug!("Orchestrator dispatch loop ended");
    }

    fn apply_snapshot(&mut self, snapshot: OrderBookSnapshot) {
        let (best_ask, best_bid) = match (snapshot.best_ask(), snapshot.best_bid()) {
            (Some(ask), Some(bid)) => (ask.price, bid.price),
            _ => {
                // Degenerate book: keep the last good snapshot, result and
                // metrics rather than publishing a hollow estimate
                debug!("Skipping recomputation: snapshot is missing a best level");
                return;
            }
        };

        let market = metrics::compute(&snapshot);
        let result = self.engine.estimate(&snapshot, &market, &self.params);

        self.history.push_back(TimeSeriesPoint::new(
            snapshot.timestamp,
            best_ask,
            best_bid,
            &result,
        ));
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }

        self.snapshot = Some(snapshot);
        self.current_metrics = Some(market);
        self.current_result = Some(result);
        self.last_updated = Some(Utc::now());
    }

    fn publish(&self) {
        let view = SimulationView {
            result: self.current_result.clone(),
            metrics: self.current_metrics.clone(),
            history: self.history.iter().cloned().collect(),
            connected: self.connected,
            last_updated: self.last_updated,
            last_error: self.last_error.clone(),
        };
        let _ = self.view_tx.send(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookLevel, FeeTier, OrderType};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn params() -> SimulationParameters {
        SimulationParameters {
            exchange: "OKX".to_string(),
            asset: "BTC-USDT-SWAP".to_string(),
            order_type: OrderType::Market,
            quantity: dec!(100),
            volatility_pct: dec!(2.5),
            fee_tier: FeeTier::Tier1,
        }
    }

    fn snapshot_at(ask: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: Utc.with_ymd_and_hms(2025, 5, 4, 10, 39, 13).unwrap(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            asks: vec![BookLevel::new(ask, dec!(5))],
            bids: vec![BookLevel::new(ask - dec!(1), dec!(5))],
        }
    }

    fn orchestrator() -> (SimulationOrchestrator, watch::Receiver<SimulationView>) {
        SimulationOrchestrator::new(CostModelEngine::default(), params())
    }

    #[test]
    fn test_snapshot_produces_result_and_history() {
        let (mut orch, view) = orchestrator();
        assert!(orch.current_result().is_none());

        orch.handle_event(FeedEvent::Snapshot(snapshot_at(dec!(100))));

        assert!(orch.current_result().is_some());
        assert_eq!(orch.history_len(), 1);

        let v = view.borrow();
        assert!(v.result.is_some());
        assert_eq!(v.history.len(), 1);
        assert_eq!(v.history[0].best_ask, dec!(100));
        assert!(v.last_updated.is_some());
    }

    #[test]
    fn test_degenerate_snapshot_retains_last_good_result() {
        let (mut orch, view) = orchestrator();
        orch.handle_event(FeedEvent::Snapshot(snapshot_at(dec!(100))));
        let first_net = orch.current_result().unwrap().net_cost;

        let mut hollow = snapshot_at(dec!(200));
        hollow.bids.clear();
        orch.handle_event(FeedEvent::Snapshot(hollow));

        // Result and history are untouched
        assert_eq!(orch.current_result().unwrap().net_cost, first_net);
        assert_eq!(orch.history_len(), 1);
        assert_eq!(view.borrow().history.len(), 1);
    }

    #[test]
    fn test_parameter_change_recomputes_without_history_append() {
        let (mut orch, _view) = orchestrator();
        orch.handle_event(FeedEvent::Snapshot(snapshot_at(dec!(100))));
        let before = orch.current_result().unwrap().expected_fees;

        let mut p = params();
        p.quantity = dec!(500);
        orch.update_parameters(p).unwrap();

        let after = orch.current_result().unwrap().expected_fees;
        assert!(after > before);
        assert_eq!(orch.history_len(), 1);
    }

    #[test]
    fn test_parameter_change_before_any_snapshot() {
        let (mut orch, _view) = orchestrator();
        let mut p = params();
        p.quantity = dec!(500);
        orch.update_parameters(p).unwrap();
        assert!(orch.current_result().is_none());
        assert_eq!(orch.params().quantity, dec!(500));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let (mut orch, _view) = orchestrator();
        let mut p = params();
        p.quantity = Decimal::ZERO;
        assert!(orch.update_parameters(p).is_err());
        // Old parameters stay active
        assert_eq!(orch.params().quantity, dec!(100));
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let (mut orch, view) = orchestrator();
        for i in 0..(HISTORY_CAPACITY + 5) {
            let price = dec!(100) + Decimal::from(i as u32);
            orch.handle_event(FeedEvent::Snapshot(snapshot_at(price)));
        }

        assert_eq!(orch.history_len(), HISTORY_CAPACITY);
        // The first five points were evicted
        assert_eq!(view.borrow().history[0].best_ask, dec!(105));
    }

    #[test]
    fn test_connection_status_tracks_state_machine() {
        let (mut orch, view) = orchestrator();
        orch.set_connection_state(ConnectionState::Connected);
        assert!(view.borrow().connected);

        orch.set_connection_state(ConnectionState::Reconnecting);
        assert!(!view.borrow().connected);
    }

    #[test]
    fn test_close_event_keeps_last_result_visible() {
        let (mut orch, view) = orchestrator();
        orch.handle_event(FeedEvent::Connected);
        orch.handle_event(FeedEvent::Snapshot(snapshot_at(dec!(100))));
        orch.handle_event(FeedEvent::Closed {
            code: Some(1006),
            reason: "abnormal".to_string(),
        });

        let v = view.borrow();
        assert!(!v.connected);
        // Stale-but-valid beats blank output during disconnection
        assert!(v.result.is_some());
        assert!(v.last_error.as_ref().unwrap().contains("1006"));
    }

    #[test]
    fn test_parse_error_event_does_not_clear_result() {
        let (mut orch, view) = orchestrator();
        orch.handle_event(FeedEvent::Snapshot(snapshot_at(dec!(100))));
        orch.handle_event(FeedEvent::Error("Parse error: bad frame".to_string()));

        let v = view.borrow();
        assert!(v.result.is_some());
        assert!(v.last_error.is_some());
    }
}
