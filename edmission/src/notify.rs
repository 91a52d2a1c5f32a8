//! Outbound notifications about run progress.
//!
//! Delivery is best effort: a failed notification is logged and never
//! affects the run.

use std::time::Duration;

use data::Category;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
	MissionAccepted {
		label: String,
		category: Category,
		value: Option<u64>,
		dry_run: bool,
	},
	Fatal {
		cause: String,
	},
}

impl RunEvent {
	pub fn message(&self) -> String {
		match self {
			RunEvent::MissionAccepted { label, category, value, dry_run } => {
				let prefix = if *dry_run { "[dry run] Would accept" } else { "Accepted" };
				match value {
					Some(value) => format!("{prefix} mission: {label} worth {} CR ({category})", group_thousands(*value)),
					None => format!("{prefix} mission: {label} ({category})"),
				}
			}
			RunEvent::Fatal { cause } => format!("Mission scan stopped: {cause}"),
		}
	}
}

/// `45000000` -> `45,000,000`
pub fn group_thousands(value: u64) -> String {
	let digits = value.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			out.push(',');
		}
		out.push(c);
	}
	out
}

pub trait Notifier {
	fn notify(&self, event: &RunEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Notifier for Silent {
	fn notify(&self, _event: &RunEvent) {}
}

/// Posts `{"content": message}` to a Discord webhook.
pub struct DiscordWebhook {
	url: String,
	agent: ureq::Agent,
}

impl DiscordWebhook {
	const TIMEOUT: Duration = Duration::from_secs(5);

	pub fn new(url: impl Into<String>) -> Self {
		let config = ureq::Agent::config_builder()
			.timeout_global(Some(Self::TIMEOUT))
			.build();
		Self {
			url: url.into(),
			agent: config.into(),
		}
	}

	pub fn send(&self, content: &str) -> Result<(), ureq::Error> {
		self.agent
			.post(&self.url)
			.send_json(serde_json::json!({ "content": content }))?;
		Ok(())
	}
}

impl Notifier for DiscordWebhook {
	fn notify(&self, event: &RunEvent) {
		let message = event.message();
		match self.send(&message) {
			Ok(()) => tracing::debug!(%message, "webhook delivered"),
			Err(err) => tracing::warn!(error = %err, "webhook delivery failed"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn thousands() {
		assert_eq!(group_thousands(0), "0");
		assert_eq!(group_thousands(999), "999");
		assert_eq!(group_thousands(1_000), "1,000");
		assert_eq!(group_thousands(45_000_000), "45,000,000");
		assert_eq!(group_thousands(123_456_789_012), "123,456,789,012");
	}

	#[test]
	fn messages() {
		let accepted = RunEvent::MissionAccepted {
			label: "Gold".into(),
			category: Category::Transport,
			value: Some(45_000_000),
			dry_run: false,
		};
		assert_eq!(accepted.message(), "Accepted mission: Gold worth 45,000,000 CR (transport)");

		let dry = RunEvent::MissionAccepted {
			label: "Gold".into(),
			category: Category::Transport,
			value: None,
			dry_run: true,
		};
		assert_eq!(dry.message(), "[dry run] Would accept mission: Gold (transport)");

		let fatal = RunEvent::Fatal { cause: "window gone".into() };
		assert!(fatal.message().contains("window gone"));
	}

	#[test]
	fn unreachable_webhook_only_logs() {
		let hook = DiscordWebhook::new("http://127.0.0.1:9/webhook");
		hook.notify(&RunEvent::Fatal { cause: "test".into() });
		assert!(hook.send("test").is_err());
	}
}
