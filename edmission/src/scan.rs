//! One pass over one category of the mission board.

use std::time::Duration;

use data::{Category, Rule};

use crate::{
	cancel::CancelToken,
	error::{FatalBackendError, PortError},
	matcher,
	notify::{Notifier, RunEvent},
	ports::{ActionPort, MissionRead, PerceptionPort, RecognizedMission},
};

/// Tally of a single cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
	pub accepted: u32,
	pub seen: u32,
	pub errors: u32,
	/// Cancellation was observed and the cycle stopped early.
	pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
	/// Match and report, but never press accept.
	pub dry_run: bool,
	/// Re-read the board after an accept that moved the cards.
	pub rescan_after_accept: bool,
	/// Wait before the single retry of a failed capture.
	pub retry_backoff: Duration,
	/// Stop after this many accepts. `None` is unlimited.
	pub budget: Option<u32>,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			dry_run: false,
			rescan_after_accept: true,
			retry_backoff: Duration::from_secs(2),
			budget: None,
		}
	}
}

/// What a cycle shares with the runner around it.
pub struct ScanEnv<'a> {
	pub cancel: &'a CancelToken,
	pub notifier: &'a dyn Notifier,
	pub options: ScanOptions,
}

/// Open `category`, read it, and accept every card the first matching rule
/// allows, in screen order.
///
/// Only a [`FatalBackendError`] is returned as an error. Every other failure
/// is counted in the report and the cycle carries on where it can.
pub fn run_category(
	category: Category,
	rules: &[Rule],
	action: &dyn ActionPort,
	perception: &dyn PerceptionPort,
	env: &ScanEnv<'_>,
) -> Result<CycleReport, FatalBackendError> {
	let mut report = CycleReport::default();
	if env.cancel.is_cancelled() {
		report.cancelled = true;
		return Ok(report);
	}

	match action.navigate_to_category(category) {
		Ok(()) => {}
		Err(PortError::Fatal(err)) => return Err(err),
		Err(err) => {
			tracing::warn!(%category, error = %err, "navigation failed; skipping category");
			report.errors += 1;
			return Ok(report);
		}
	}

	let Some(mut reads) = capture_with_retry(category, perception, env, &mut report)? else {
		return Ok(report);
	};

	let mut index = 0;
	while index < reads.len() {
		if env.cancel.is_cancelled() {
			report.cancelled = true;
			break;
		}
		if env.options.budget.is_some_and(|budget| report.accepted >= budget) {
			tracing::debug!(%category, accepted = report.accepted, "cycle budget spent");
			break;
		}

		let position = index;
		index += 1;
		report.seen += 1;

		let mission = match &reads[position] {
			Ok(mission) => mission,
			Err(failure) => {
				tracing::warn!(%category, position, error = %failure, "skipping unreadable mission");
				report.errors += 1;
				continue;
			}
		};

		let Some(rule) = matcher::evaluate(mission, rules) else {
			tracing::debug!(%category, text = %mission.raw_text, value = ?mission.parsed_value, wing = mission.is_wing, "no rule matched");
			continue;
		};

		let event = RunEvent::MissionAccepted {
			label: rule.label().to_string(),
			category,
			value: mission.parsed_value,
			dry_run: env.options.dry_run,
		};

		if env.options.dry_run {
			tracing::info!(%category, rule = rule.label(), value = ?mission.parsed_value, dry_run = true, "mission matched");
			report.accepted += 1;
			env.notifier.notify(&event);
			continue;
		}

		match action.accept(mission.screen_anchor) {
			Ok(outcome) if outcome.layout_shifted && env.options.rescan_after_accept => {
				let Some(fresh) = rescan(category, perception)? else {
					// The accept went through but the board can no longer be followed.
					report.accepted += 1;
					env.notifier.notify(&event);
					report.errors += 1;
					break;
				};

				if still_listed(&reads, &fresh, position, mission) {
					tracing::warn!(%category, rule = rule.label(), text = %mission.raw_text, "accepted mission is still on the board; accept not registered");
					report.errors += 1;
					index = position + 1;
				} else {
					tracing::info!(%category, rule = rule.label(), value = ?mission.parsed_value, text = %mission.raw_text, "mission accepted");
					report.accepted += 1;
					env.notifier.notify(&event);
					// The accepted card is gone, so the next unseen card now sits at `position`.
					index = position;
				}
				reads = fresh;
			}
			Ok(_) => {
				tracing::info!(%category, rule = rule.label(), value = ?mission.parsed_value, text = %mission.raw_text, "mission accepted");
				report.accepted += 1;
				env.notifier.notify(&event);
			}
			Err(PortError::Fatal(err)) => return Err(err),
			Err(err) => {
				tracing::warn!(%category, rule = rule.label(), error = %err, "accept failed");
				report.errors += 1;
			}
		}
	}

	tracing::debug!(%category, ?report, "cycle finished");
	Ok(report)
}

/// `Ok(None)` means the category is skipped. The report already says why.
fn capture_with_retry(
	category: Category,
	perception: &dyn PerceptionPort,
	env: &ScanEnv<'_>,
	report: &mut CycleReport,
) -> Result<Option<Vec<MissionRead>>, FatalBackendError> {
	match perception.capture(category) {
		Ok(reads) => return Ok(Some(reads)),
		Err(PortError::Fatal(err)) => return Err(err),
		Err(err) => {
			tracing::warn!(%category, error = %err, backoff = ?env.options.retry_backoff, "capture failed; retrying");
		}
	}

	if env.cancel.wait(env.options.retry_backoff) {
		report.cancelled = true;
		return Ok(None);
	}

	match perception.capture(category) {
		Ok(reads) => Ok(Some(reads)),
		Err(PortError::Fatal(err)) => Err(err),
		Err(err) => {
			tracing::warn!(%category, error = %err, "capture failed again; skipping category");
			report.errors += 1;
			Ok(None)
		}
	}
}

/// An accepted card leaves the list, so the same card at the same position
/// with nothing removed means the accept did not take.
fn still_listed(before: &[MissionRead], after: &[MissionRead], position: usize, accepted: &RecognizedMission) -> bool {
	if after.len() < before.len() {
		return false;
	}
	matches!(
		after.get(position),
		Some(Ok(card)) if card.raw_text == accepted.raw_text && card.parsed_value == accepted.parsed_value
	)
}

fn rescan(category: Category, perception: &dyn PerceptionPort) -> Result<Option<Vec<MissionRead>>, FatalBackendError> {
	match perception.capture(category) {
		Ok(reads) => Ok(Some(reads)),
		Err(PortError::Fatal(err)) => Err(err),
		Err(err) => {
			tracing::warn!(%category, error = %err, "rescan after accept failed; leaving category");
			Ok(None)
		}
	}
}
