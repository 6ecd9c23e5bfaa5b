//! Domain types for the S3A backtester

pub mod bar;
pub mod ids;
pub mod session;
pub mod trade;

pub use bar::{ensure_monotonic, Bar, BarError, BarFeatures};
pub use ids::{ConfigHash, DataHash};
pub use session::{session_index, sessions, Session, RTH_CLOSE, RTH_MINUTES, RTH_OPEN};
pub use trade::{ExitReason, Location, Side, SideError, TimeStopTag, Tp2Label, Trade, TriggerType};
