//! Failure taxonomy for the scan loop.
//!
//! Only [`FatalBackendError`] stops a run. Perception and action failures are
//! counted and the run moves on.

use thiserror::Error;

/// Screen capture or OCR did not produce a usable reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerceptionFailure {
	#[error("screen capture failed: {0}")]
	Capture(String),
	#[error("mission card unreadable: {0}")]
	Unreadable(String),
}

/// Simulated input did not have the expected effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
	#[error("could not open category {0}")]
	Navigation(String),
	#[error("accept was not registered: {0}")]
	Accept(String),
	#[error("input failed: {0}")]
	Input(String),
}

/// A backend is unusable; no further work is possible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalBackendError {
	#[error("OCR backend unavailable: {0}")]
	Ocr(String),
	#[error("game window not found: {0}")]
	WindowMissing(String),
	#[error("input backend unavailable: {0}")]
	Input(String),
}

/// Anything a port call can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
	#[error(transparent)]
	Perception(#[from] PerceptionFailure),
	#[error(transparent)]
	Action(#[from] ActionFailure),
	#[error(transparent)]
	Fatal(#[from] FatalBackendError),
}

impl PortError {
	pub fn is_fatal(&self) -> bool {
		matches!(self, PortError::Fatal(_))
	}
}
