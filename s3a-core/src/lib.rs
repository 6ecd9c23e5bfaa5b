//! S3A Core: intraday signal state machine and trade lifecycle simulation.
//!
//! This crate contains the computational heart of the backtester:
//! - Domain types (bars with attached features, sessions, trades)
//! - Feature provider (opening range, VWAP bands, ATR, swings, trend, patterns)
//! - Per-session signal state machine (unlock, zone, trigger, disqualification)
//! - Session filters (tiny opening range, low ATR, news blackout)
//! - Trade lifecycle (admission under gap risk, stop/target/time-stop race)
//! - Trade simulation tying the above together
//!
//! Everything here is pure computation over an in-memory bar sequence; file
//! I/O, metrics and reporting live in `s3a-runner`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod features;
pub mod filters;
pub mod lifecycle;
pub mod signals;

pub use config::{ConfigError, StrategyConfig};
pub use engine::{simulate_trades, EngineError};
pub use features::attach_features;
pub use signals::generate_signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across session worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Session>();
        require_sync::<domain::Session>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::ConfigHash>();
        require_sync::<domain::ConfigHash>();

        // Config
        require_send::<StrategyConfig>();
        require_sync::<StrategyConfig>();

        // Signals
        require_send::<signals::SignalRow>();
        require_sync::<signals::SignalRow>();
        require_send::<signals::SignalRules>();
        require_sync::<signals::SignalRules>();

        // Lifecycle
        require_send::<lifecycle::TradeCandidate>();
        require_sync::<lifecycle::TradeCandidate>();
        require_send::<lifecycle::LifecycleOutcome>();
        require_sync::<lifecycle::LifecycleOutcome>();
        require_send::<lifecycle::TickSlippage>();
        require_sync::<lifecycle::TickSlippage>();
        require_send::<Box<dyn lifecycle::SlippageModel>>();
        require_sync::<Box<dyn lifecycle::SlippageModel>>();
    }

    /// Architecture contract: the state machine steps one bar at a time and
    /// never receives the rest of the session.
    #[test]
    fn signal_step_sees_only_the_current_bar() {
        fn _check(
            state: &mut signals::SessionState,
            bar: &domain::Bar,
            rules: &signals::SignalRules,
        ) -> signals::SignalRow {
            state.step(0, bar, rules)
        }
    }
}
