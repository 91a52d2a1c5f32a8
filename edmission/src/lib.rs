//! Elite Dangerous mission board automation.
//!
//! [`runner::Runner`] sweeps the board categories, [`scan::run_category`]
//! reads one category and accepts what [`matcher::evaluate`] allows. The game
//! itself sits behind the [`ports`] traits; [`game::EliteDangerous`] is the
//! live implementation.

pub mod cancel;
pub mod capture;
pub mod config;
pub mod error;
pub mod game;
pub mod input;
pub mod matcher;
pub mod notify;
pub mod ports;
pub mod runner;
pub mod scan;
pub mod watch;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{ActionFailure, FatalBackendError, PerceptionFailure, PortError};
pub use ports::{AcceptOutcome, ActionPort, MissionRead, PerceptionPort, RecognizedMission, ScreenAnchor};
pub use runner::{Outcome, RunSummary, Runner, RunnerSettings};
