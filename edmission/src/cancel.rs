use std::{
	sync::{Arc, Condvar, Mutex},
	time::{Duration, Instant},
};

/// Cooperative stop signal shared between the runner and whatever asks it to
/// stop (Ctrl-C handler, a front-end button).
///
/// Waiting goes through [`CancelToken::wait`], which wakes as soon as
/// cancellation is requested instead of sleeping out the full duration.
#[derive(Clone, Default)]
pub struct CancelToken {
	inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		let (lock, cv) = &*self.inner;
		let mut cancelled = match lock.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		*cancelled = true;
		cv.notify_all();
	}

	pub fn is_cancelled(&self) -> bool {
		let (lock, _) = &*self.inner;
		match lock.lock() {
			Ok(guard) => *guard,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}

	/// Sleep for `duration` or until cancelled. Returns `true` if cancelled.
	pub fn wait(&self, duration: Duration) -> bool {
		// A duration too large for an `Instant` waits for cancellation alone.
		let deadline = Instant::now().checked_add(duration);
		let (lock, cv) = &*self.inner;
		let mut cancelled = match lock.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		loop {
			if *cancelled {
				return true;
			}
			let Some(deadline) = deadline else {
				cancelled = match cv.wait(cancelled) {
					Ok(guard) => guard,
					Err(poisoned) => poisoned.into_inner(),
				};
				continue;
			};
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			cancelled = match cv.wait_timeout(cancelled, deadline - now) {
				Ok((guard, _timeout)) => guard,
				Err(poisoned) => poisoned.into_inner().0,
			};
		}
	}
}

impl std::fmt::Debug for CancelToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wait_runs_out_when_not_cancelled() {
		let token = CancelToken::new();
		assert!(!token.wait(Duration::from_millis(5)));
		assert!(!token.is_cancelled());
	}

	#[test]
	fn cancel_wakes_a_long_wait() {
		let token = CancelToken::new();
		let remote = token.clone();
		let handle = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(20));
			remote.cancel();
		});
		let started = Instant::now();
		assert!(token.wait(Duration::from_secs(60)));
		assert!(started.elapsed() < Duration::from_secs(10));
		handle.join().unwrap();
	}

	#[test]
	fn unbounded_wait_ends_on_cancel() {
		let token = CancelToken::new();
		let remote = token.clone();
		let handle = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(20));
			remote.cancel();
		});
		assert!(token.wait(Duration::MAX));
		handle.join().unwrap();
	}
}
