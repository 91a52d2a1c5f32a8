//! The run loop: sweeps the configured categories, waits out the poll
//! interval and repeats until the cap is reached, the operator cancels or a
//! backend dies.
//!
//! All bookkeeping lives in [`RunnerState`] and only changes through
//! [`transition`], so the loop itself is just "perform the phase, feed the
//! result back in".

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use data::{Category, RuleRegistry};

use crate::{
	cancel::CancelToken,
	error::{FatalBackendError, PortError},
	notify::{Notifier, RunEvent},
	ports::{ActionPort, PerceptionPort},
	scan::{self, CycleReport, ScanEnv, ScanOptions},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
	CapReached,
	Fatal(FatalBackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Scanning { category: Category },
	WaitingInterval,
	Stopped(StopReason),
	Cancelled,
}

impl Phase {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Phase::Stopped(_) | Phase::Cancelled)
	}

	fn name(&self) -> &'static str {
		match self {
			Phase::Idle => "idle",
			Phase::Scanning { .. } => "scanning",
			Phase::WaitingInterval => "waiting",
			Phase::Stopped(StopReason::CapReached) => "cap_reached",
			Phase::Stopped(StopReason::Fatal(_)) => "fatal",
			Phase::Cancelled => "cancelled",
		}
	}
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	Start,
	CycleFinished(CycleReport),
	IntervalElapsed,
	CancelObserved,
	/// A board housekeeping action failed without being fatal.
	HousekeepingFailed,
	Fatal(FatalBackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerState {
	pub phase: Phase,
	pub accepted_count: u32,
	pub cap: u32,
	pub cancel_requested: bool,
	pub current_category_index: usize,
	pub errors: u32,
	/// Sweeps started so far.
	pub polls: u32,
}

impl RunnerState {
	pub fn new(cap: u32, accepted_count: u32) -> Self {
		Self {
			phase: Phase::Idle,
			accepted_count,
			cap,
			cancel_requested: false,
			current_category_index: 0,
			errors: 0,
			polls: 0,
		}
	}

	/// Accepts left before the cap.
	pub fn remaining(&self) -> u32 {
		self.cap.saturating_sub(self.accepted_count)
	}

	fn cap_reached(&self) -> bool {
		self.accepted_count >= self.cap
	}
}

/// Apply one event. Terminal phases absorb everything except error counts.
pub fn transition(mut state: RunnerState, event: Event, categories: &[Category]) -> RunnerState {
	if let Event::HousekeepingFailed = event {
		state.errors += 1;
		return state;
	}
	if state.phase.is_terminal() {
		return state;
	}

	match event {
		Event::Fatal(err) => state.phase = Phase::Stopped(StopReason::Fatal(err)),
		Event::CancelObserved => {
			state.cancel_requested = true;
			state.phase = Phase::Cancelled;
		}
		Event::Start if state.phase == Phase::Idle => state = begin_sweep(state, categories),
		Event::IntervalElapsed if state.phase == Phase::WaitingInterval => state = begin_sweep(state, categories),
		Event::CycleFinished(report) if matches!(state.phase, Phase::Scanning { .. }) => {
			state.accepted_count = state.accepted_count.saturating_add(report.accepted);
			state.errors += report.errors;

			if state.cap_reached() {
				state.phase = Phase::Stopped(StopReason::CapReached);
			} else if report.cancelled {
				state.cancel_requested = true;
				state.phase = Phase::Cancelled;
			} else if let Some(&category) = categories.get(state.current_category_index + 1) {
				state.current_category_index += 1;
				state.phase = Phase::Scanning { category };
			} else {
				state.current_category_index = 0;
				state.phase = Phase::WaitingInterval;
			}
		}
		// Out of order events are ignored.
		Event::Start | Event::IntervalElapsed | Event::CycleFinished(_) | Event::HousekeepingFailed => {}
	}
	state
}

fn begin_sweep(mut state: RunnerState, categories: &[Category]) -> RunnerState {
	if state.cap_reached() {
		state.phase = Phase::Stopped(StopReason::CapReached);
		return state;
	}
	state.current_category_index = 0;
	state.polls += 1;
	state.phase = Phase::Scanning {
		category: categories.first().copied().unwrap_or(Category::All),
	};
	state
}

/// Configured categories, else the ones the rules name, else everything.
pub fn resolve_categories(configured: &[Category], rules: &RuleRegistry) -> Vec<Category> {
	if !configured.is_empty() {
		let mut out: Vec<Category> = Vec::with_capacity(configured.len());
		for category in configured {
			if !out.contains(category) {
				out.push(*category);
			}
		}
		return out;
	}
	let derived = rules.unique_categories();
	if derived.is_empty() { vec![Category::All] } else { derived }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	CapReached,
	Cancelled,
	Fatal(FatalBackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
	pub outcome: Outcome,
	pub accepted_count: u32,
	pub errors: u32,
	pub polls: u32,
}

impl RunSummary {
	fn from_state(state: &RunnerState) -> Self {
		let outcome = match &state.phase {
			Phase::Stopped(StopReason::CapReached) => Outcome::CapReached,
			Phase::Stopped(StopReason::Fatal(err)) => Outcome::Fatal(err.clone()),
			_ => Outcome::Cancelled,
		};
		Self {
			outcome,
			accepted_count: state.accepted_count,
			errors: state.errors,
			polls: state.polls,
		}
	}

	/// Process exit code: only a fatal stop is a failure.
	pub fn exit_code(&self) -> u8 {
		match self.outcome {
			Outcome::Fatal(_) => 1,
			Outcome::CapReached | Outcome::Cancelled => 0,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
	pub cap: u32,
	pub poll_interval: Duration,
	/// Align later sweeps to clock marks: a sweep is due whenever the UTC
	/// time plus this offset is a whole multiple of `poll_interval`. `None`
	/// polls `poll_interval` after the previous sweep started.
	pub poll_offset: Option<Duration>,
	/// Empty means derive from the rules.
	pub categories: Vec<Category>,
	pub dry_run: bool,
	pub rescan_after_accept: bool,
	pub retry_backoff: Duration,
}

impl Default for RunnerSettings {
	fn default() -> Self {
		Self {
			cap: 20,
			poll_interval: Duration::from_secs(10 * 60),
			poll_offset: Some(Duration::from_secs(5 * 60)),
			categories: Vec::new(),
			dry_run: false,
			rescan_after_accept: true,
			retry_backoff: Duration::from_secs(2),
		}
	}
}

pub struct Runner<'a> {
	perception: &'a dyn PerceptionPort,
	action: &'a dyn ActionPort,
	rules: &'a RuleRegistry,
	notifier: &'a dyn Notifier,
	cancel: CancelToken,
	settings: RunnerSettings,
}

impl<'a> Runner<'a> {
	pub fn new(
		perception: &'a dyn PerceptionPort,
		action: &'a dyn ActionPort,
		rules: &'a RuleRegistry,
		notifier: &'a dyn Notifier,
		cancel: CancelToken,
		settings: RunnerSettings,
	) -> Self {
		Self {
			perception,
			action,
			rules,
			notifier,
			cancel,
			settings,
		}
	}

	/// Drive the state machine to a terminal phase.
	pub fn run(&self, initial_accepted: u32) -> RunSummary {
		let categories = resolve_categories(&self.settings.categories, self.rules);
		let started = Instant::now();
		let mut sweep_started = started;

		tracing::info!(
			cap = self.settings.cap,
			accepted = initial_accepted,
			?categories,
			dry_run = self.settings.dry_run,
			poll_interval_s = self.settings.poll_interval.as_secs(),
			"run starting"
		);

		let mut state = self.step(RunnerState::new(self.settings.cap, initial_accepted), Event::Start, &categories, started);

		while !state.phase.is_terminal() {
			let was_scanning = matches!(state.phase, Phase::Scanning { .. });
			let event = match state.phase.clone() {
				Phase::Scanning { category } => {
					if state.current_category_index == 0 {
						sweep_started = Instant::now();
					}
					self.scan(&mut state, category, &categories, started)
				}
				Phase::WaitingInterval => {
					let wait = self.until_next_poll(sweep_started);
					tracing::info!(wait_s = wait.as_secs(), "waiting for next poll");
					if self.cancel.wait(wait) { Event::CancelObserved } else { Event::IntervalElapsed }
				}
				// `Start` always leaves Idle.
				Phase::Idle => Event::Start,
				Phase::Stopped(_) | Phase::Cancelled => break,
			};
			state = self.step(state, event, &categories, started);

			let sweep_over = matches!(state.phase, Phase::WaitingInterval | Phase::Stopped(StopReason::CapReached));
			if was_scanning && sweep_over {
				if let Some(event) = self.housekeeping("leave board", self.action.leave_board()) {
					state = self.step(state, event, &categories, started);
				}
			}
		}

		let summary = RunSummary::from_state(&state);
		if let Outcome::Fatal(err) = &summary.outcome {
			tracing::error!(error = %err, "run stopped by fatal error");
			self.notifier.notify(&RunEvent::Fatal { cause: err.to_string() });
		}
		tracing::info!(
			outcome = state.phase.name(),
			accepted = summary.accepted_count,
			errors = summary.errors,
			polls = summary.polls,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"run finished"
		);
		summary
	}

	fn until_next_poll(&self, sweep_started: Instant) -> Duration {
		let interval = self.settings.poll_interval;
		match self.settings.poll_offset {
			Some(offset) => {
				let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
				until_next_mark(now, interval, offset)
			}
			None => match sweep_started.checked_add(interval) {
				Some(due) => due.saturating_duration_since(Instant::now()),
				None => Duration::MAX,
			},
		}
	}

	/// Board preparation followed by one Scan Cycle.
	fn scan(&self, state: &mut RunnerState, category: Category, categories: &[Category], started: Instant) -> Event {
		if self.cancel.is_cancelled() {
			return Event::CancelObserved;
		}

		let prepare = if state.current_category_index == 0 {
			("open board", self.action.open_board())
		} else {
			("return to categories", self.action.return_to_categories())
		};
		match self.housekeeping(prepare.0, prepare.1) {
			Some(Event::HousekeepingFailed) => {
				*state = self.step(state.clone(), Event::HousekeepingFailed, categories, started);
			}
			Some(event) => return event,
			None => {}
		}

		// One snapshot per cycle; edits made meanwhile apply from the next category.
		let rules = self.rules.snapshot();
		let env = ScanEnv {
			cancel: &self.cancel,
			notifier: self.notifier,
			options: ScanOptions {
				dry_run: self.settings.dry_run,
				rescan_after_accept: self.settings.rescan_after_accept,
				retry_backoff: self.settings.retry_backoff,
				budget: Some(state.remaining()),
			},
		};
		match scan::run_category(category, &rules, self.action, self.perception, &env) {
			Ok(report) => Event::CycleFinished(report),
			Err(err) => Event::Fatal(err),
		}
	}

	fn housekeeping(&self, what: &'static str, result: Result<(), PortError>) -> Option<Event> {
		match result {
			Ok(()) => None,
			Err(PortError::Fatal(err)) => Some(Event::Fatal(err)),
			Err(err) => {
				tracing::warn!(action = what, error = %err, "board action failed");
				Some(Event::HousekeepingFailed)
			}
		}
	}

	fn step(&self, state: RunnerState, event: Event, categories: &[Category], started: Instant) -> RunnerState {
		let from = state.phase.clone();
		let next = transition(state, event, categories);
		if next.phase != from {
			let category = match &next.phase {
				Phase::Scanning { category } => Some(*category),
				_ => None,
			};
			tracing::info!(
				from = from.name(),
				to = next.phase.name(),
				category = category.map(|c| c.as_str()),
				accepted = next.accepted_count,
				errors = next.errors,
				elapsed_ms = started.elapsed().as_millis() as u64,
				"runner transition"
			);
		}
		next
	}
}

/// Missions already accepted when the run starts: `explicit` if given,
/// otherwise whatever the counter on screen says, otherwise zero.
pub fn initial_accepted(explicit: Option<u32>, perception: &dyn PerceptionPort) -> Result<u32, FatalBackendError> {
	if let Some(count) = explicit {
		return Ok(count);
	}
	match perception.accepted_missions() {
		Ok(Some(count)) => {
			tracing::info!(accepted = count, "read accepted missions from screen");
			Ok(count)
		}
		Ok(None) => {
			tracing::warn!("accepted mission counter unreadable; assuming 0");
			Ok(0)
		}
		Err(PortError::Fatal(err)) => Err(err),
		Err(err) => {
			tracing::warn!(error = %err, "could not read accepted missions; assuming 0");
			Ok(0)
		}
	}
}

/// Summary for a run that died before it could start, e.g. when the OCR
/// models failed to load.
pub fn abort(cap: u32, accepted: u32, err: FatalBackendError, notifier: &dyn Notifier) -> RunSummary {
	let state = transition(RunnerState::new(cap, accepted), Event::Fatal(err.clone()), &[]);
	tracing::error!(error = %err, "backend unavailable; run not started");
	notifier.notify(&RunEvent::Fatal { cause: err.to_string() });
	RunSummary::from_state(&state)
}

/// Time from `now` (since the epoch) to the next mark strictly after it,
/// where marks fall on every `now + offset` that is a whole multiple of
/// `interval`.
pub fn until_next_mark(now: Duration, interval: Duration, offset: Duration) -> Duration {
	let period = interval.as_millis();
	if period == 0 {
		return Duration::ZERO;
	}
	let phase = (now.as_millis() + offset.as_millis()) % period;
	u64::try_from(period - phase).map_or(interval, Duration::from_millis)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CATS: [Category; 2] = [Category::Transport, Category::Combat];

	fn report(accepted: u32, errors: u32) -> CycleReport {
		CycleReport {
			accepted,
			seen: accepted,
			errors,
			cancelled: false,
		}
	}

	#[test]
	fn sweep_walks_categories_then_waits() {
		let s = transition(RunnerState::new(5, 0), Event::Start, &CATS);
		assert_eq!(s.phase, Phase::Scanning { category: Category::Transport });
		assert_eq!(s.polls, 1);

		let s = transition(s, Event::CycleFinished(report(1, 0)), &CATS);
		assert_eq!(s.phase, Phase::Scanning { category: Category::Combat });
		assert_eq!(s.current_category_index, 1);

		let s = transition(s, Event::CycleFinished(report(0, 2)), &CATS);
		assert_eq!(s.phase, Phase::WaitingInterval);
		assert_eq!((s.accepted_count, s.errors, s.current_category_index), (1, 2, 0));

		let s = transition(s, Event::IntervalElapsed, &CATS);
		assert_eq!(s.phase, Phase::Scanning { category: Category::Transport });
		assert_eq!(s.polls, 2);
	}

	#[test]
	fn cap_stops_mid_sweep() {
		let s = transition(RunnerState::new(1, 0), Event::Start, &CATS);
		let s = transition(s, Event::CycleFinished(report(1, 0)), &CATS);
		assert_eq!(s.phase, Phase::Stopped(StopReason::CapReached));
	}

	#[test]
	fn already_at_cap_never_scans() {
		let s = transition(RunnerState::new(3, 3), Event::Start, &CATS);
		assert_eq!(s.phase, Phase::Stopped(StopReason::CapReached));
		assert_eq!(s.polls, 0);
	}

	#[test]
	fn cap_wins_over_cancel_in_same_cycle() {
		let s = transition(RunnerState::new(1, 0), Event::Start, &CATS);
		let finished = CycleReport { cancelled: true, ..report(1, 0) };
		let s = transition(s, Event::CycleFinished(finished), &CATS);
		assert_eq!(s.phase, Phase::Stopped(StopReason::CapReached));
	}

	#[test]
	fn cancel_from_any_live_phase() {
		let scanning = transition(RunnerState::new(5, 0), Event::Start, &CATS);
		let s = transition(scanning.clone(), Event::CancelObserved, &CATS);
		assert_eq!(s.phase, Phase::Cancelled);
		assert!(s.cancel_requested);

		let waiting = transition(transition(scanning, Event::CycleFinished(report(0, 0)), &CATS), Event::CycleFinished(report(0, 0)), &CATS);
		assert_eq!(waiting.phase, Phase::WaitingInterval);
		assert_eq!(transition(waiting, Event::CancelObserved, &CATS).phase, Phase::Cancelled);

		let idle = transition(RunnerState::new(5, 0), Event::CancelObserved, &CATS);
		assert_eq!(idle.phase, Phase::Cancelled);
	}

	#[test]
	fn terminal_phases_absorb_events() {
		let s = transition(RunnerState::new(5, 0), Event::Fatal(FatalBackendError::Ocr("x".into())), &CATS);
		let stopped = s.phase.clone();
		let s = transition(s, Event::Start, &CATS);
		let s = transition(s, Event::CycleFinished(report(3, 0)), &CATS);
		let s = transition(s, Event::HousekeepingFailed, &CATS);
		assert_eq!(s.phase, stopped);
		assert_eq!(s.accepted_count, 0);
		assert_eq!(s.errors, 1);
	}

	#[test]
	fn out_of_order_events_are_ignored() {
		let s = RunnerState::new(5, 0);
		assert_eq!(transition(s.clone(), Event::IntervalElapsed, &CATS), s);
		assert_eq!(transition(s.clone(), Event::CycleFinished(report(2, 0)), &CATS), s);
	}

	#[test]
	fn categories_fall_back_to_rules_then_all() {
		let empty = RuleRegistry::default();
		assert_eq!(resolve_categories(&[], &empty), [Category::All]);
		assert_eq!(
			resolve_categories(&[Category::Combat, Category::Combat, Category::All], &empty),
			[Category::Combat, Category::All]
		);
		let defaults = RuleRegistry::with_defaults();
		assert_eq!(resolve_categories(&[], &defaults), [Category::Transport]);
	}

	#[test]
	fn summary_exit_codes() {
		let fatal = RunSummary {
			outcome: Outcome::Fatal(FatalBackendError::WindowMissing("Elite".into())),
			accepted_count: 0,
			errors: 0,
			polls: 0,
		};
		assert_eq!(fatal.exit_code(), 1);
		assert_eq!(RunSummary { outcome: Outcome::Cancelled, ..fatal.clone() }.exit_code(), 0);
		assert_eq!(RunSummary { outcome: Outcome::CapReached, ..fatal }.exit_code(), 0);
	}

	#[test]
	fn abort_reports_fatal() {
		let summary = abort(20, 4, FatalBackendError::Ocr("models".into()), &crate::notify::Silent);
		assert_eq!(summary.outcome, Outcome::Fatal(FatalBackendError::Ocr("models".into())));
		assert_eq!(summary.accepted_count, 4);
	}

	const MINUTE: Duration = Duration::from_secs(60);

	#[test]
	fn next_mark_honours_offset() {
		// 12:03 UTC with marks at :05, :15, :25 ...
		let now = MINUTE * (12 * 60 + 3);
		assert_eq!(until_next_mark(now, MINUTE * 10, MINUTE * 5), MINUTE * 2);
		assert_eq!(until_next_mark(now + Duration::from_secs(30), MINUTE * 10, MINUTE * 5), Duration::from_secs(90));
		assert_eq!(until_next_mark(now, MINUTE * 10, Duration::ZERO), MINUTE * 7);
	}

	#[test]
	fn on_a_mark_waits_for_the_next_one() {
		let now = MINUTE * (12 * 60 + 5);
		assert_eq!(until_next_mark(now, MINUTE * 10, MINUTE * 5), MINUTE * 10);
	}

	#[test]
	fn next_mark_edges() {
		assert_eq!(until_next_mark(MINUTE, Duration::ZERO, MINUTE * 5), Duration::ZERO);
		assert_eq!(until_next_mark(MINUTE, Duration::MAX, MINUTE * 5), Duration::MAX);
	}
}
