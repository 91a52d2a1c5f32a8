use std::sync::LazyLock;

use regex::Regex;

/// A credit amount directly followed by a standalone `CR`, e.g. `45,000,000 CR`.
static CREDITS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)(?<amount>\d{1,3}(?:[,.]\d{3})+|\d+)\s*CR\b").expect("regex")
});

/// Parse the reward of a mission card from OCR text.
///
/// Returns `None` when no amount precedes a `CR` marker. Callers must treat
/// that as "unknown", never as a real zero reward.
pub fn parse_credits(text: &str) -> Option<u64> {
	let amount = CREDITS_REGEX.captures(text)?.name("amount")?.as_str();
	let digits = amount.chars().filter(char::is_ascii_digit).collect::<String>();
	digits.parse::<u64>().ok()
}

/// Collapse OCR line breaks and repeated whitespace.
pub fn normalize_text(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credits_with_separators() {
		assert_eq!(parse_credits("WING MINING MISSION: GOLD 45,000,000 CR"), Some(45_000_000));
		assert_eq!(parse_credits("reward 1.250.000cr"), Some(1_250_000));
		assert_eq!(parse_credits("12345 CR"), Some(12_345));
	}

	#[test]
	fn other_numbers_are_ignored() {
		assert_eq!(parse_credits("DELIVER 120 UNITS OF GOLD 2,500,000 CR"), Some(2_500_000));
	}

	#[test]
	fn words_starting_with_cr_are_not_the_marker() {
		assert_eq!(parse_credits("TRANSPORT 20 CREW MEMBERS 5,000,000 CR"), Some(5_000_000));
		assert_eq!(parse_credits("MOVE 3 CRATES"), None);
	}

	#[test]
	fn missing_amount_is_none() {
		assert_eq!(parse_credits("WING MINING MISSION: GOLD"), None);
		assert_eq!(parse_credits("CR"), None);
		assert_eq!(parse_credits(""), None);
	}

	#[test]
	fn normalize_collapses_whitespace() {
		assert_eq!(normalize_text(" MINE\nGOLD   NOW \n"), "MINE GOLD NOW");
	}
}
