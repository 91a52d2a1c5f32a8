//! Rule evaluation.
//!
//! A mission is checked against each rule with a fixed pipeline of
//! predicates. Rules are tried in configured order and the first rule that
//! passes every stage wins, so rule order is the tie-break between
//! overlapping rules.

use data::Rule;

use crate::ports::RecognizedMission;

type Stage = fn(&Rule, &RecognizedMission) -> bool;

const STAGES: [Stage; 4] = [category_allowed, wing_satisfied, text_matches, value_sufficient];

fn category_allowed(rule: &Rule, mission: &RecognizedMission) -> bool {
	rule.applies_to(mission.category)
}

fn wing_satisfied(rule: &Rule, mission: &RecognizedMission) -> bool {
	!rule.wing() || mission.is_wing
}

fn text_matches(rule: &Rule, mission: &RecognizedMission) -> bool {
	rule.text_matches(&mission.raw_text)
}

/// An unreadable value never satisfies a value gate.
fn value_sufficient(rule: &Rule, mission: &RecognizedMission) -> bool {
	match (rule.min_value(), mission.parsed_value) {
		(None, _) => true,
		(Some(min), Some(value)) => value >= min,
		(Some(_), None) => false,
	}
}

pub fn evaluate<'r>(mission: &RecognizedMission, rules: &'r [Rule]) -> Option<&'r Rule> {
	rules
		.iter()
		.find(|rule| STAGES.iter().all(|stage| stage(rule, mission)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ports::ScreenAnchor;
	use data::Category;

	fn gold_rule() -> Rule {
		Rule::new(
			"Gold Mining",
			[vec!["MINE", "MINING", "BLAST"], vec!["GOLD"]],
			true,
			[],
			Some(40_000_000),
		)
		.unwrap()
	}

	fn mission(text: &str, is_wing: bool, value: Option<u64>, category: Category) -> RecognizedMission {
		RecognizedMission {
			raw_text: text.to_string(),
			parsed_value: value,
			is_wing,
			category,
			screen_anchor: ScreenAnchor::row(0),
		}
	}

	#[test]
	fn gold_mining_scenario() {
		let rules = [gold_rule()];
		let text = "WING MINING MISSION: GOLD";

		let hit = mission(text, true, Some(45_000_000), Category::Transport);
		assert_eq!(evaluate(&hit, &rules).map(Rule::label), Some("Gold Mining"));

		let cheap = mission(text, true, Some(30_000_000), Category::Transport);
		assert!(evaluate(&cheap, &rules).is_none());

		let solo = mission(text, false, Some(45_000_000), Category::Transport);
		assert!(evaluate(&solo, &rules).is_none());
	}

	#[test]
	fn minimum_value_is_inclusive() {
		let rules = [gold_rule()];
		let text = "WING MINING MISSION: GOLD";
		assert!(evaluate(&mission(text, true, Some(40_000_000), Category::Transport), &rules).is_some());
		assert!(evaluate(&mission(text, true, Some(39_999_999), Category::Transport), &rules).is_none());
	}

	#[test]
	fn empty_categories_match_every_category() {
		let rules = [gold_rule()];
		for category in Category::ALL {
			let m = mission("MINING GOLD", true, Some(50_000_000), category);
			assert!(evaluate(&m, &rules).is_some(), "{category}");
		}
	}

	#[test]
	fn category_gate() {
		let rule = Rule::new("Transport only", [vec!["CARGO"]], false, [Category::Transport], None).unwrap();
		let rules = [rule];
		assert!(evaluate(&mission("CARGO RUN", false, None, Category::Transport), &rules).is_some());
		assert!(evaluate(&mission("CARGO RUN", false, None, Category::Combat), &rules).is_none());
	}

	#[test]
	fn every_group_must_hit() {
		let rules = [gold_rule()];
		for text in ["MINING SILVER", "GOLD DELIVERY", "", "BLAST"] {
			let m = mission(text, true, Some(90_000_000), Category::Transport);
			assert!(evaluate(&m, &rules).is_none(), "{text:?}");
		}
	}

	#[test]
	fn unparsed_value_fails_only_value_gated_rules() {
		let ungated = Rule::new("Any gold", [vec!["GOLD"]], false, [], None).unwrap();
		let zero_gate = Rule::new("Gold zero", [vec!["GOLD"]], false, [], Some(0)).unwrap();
		let m = mission("GOLD", false, None, Category::All);
		assert!(evaluate(&m, &[zero_gate.clone()]).is_none());
		assert_eq!(evaluate(&m, &[zero_gate, ungated]).map(Rule::label), Some("Any gold"));
	}

	#[test]
	fn first_matching_rule_wins() {
		let broad = Rule::new("Broad", [vec!["GOLD"]], false, [], None).unwrap();
		let narrow = gold_rule();
		let m = mission("WING MINING MISSION: GOLD", true, Some(45_000_000), Category::Transport);

		let rules = [broad.clone(), narrow.clone()];
		assert_eq!(evaluate(&m, &rules).map(Rule::label), Some("Broad"));
		let rules = [narrow, broad];
		assert_eq!(evaluate(&m, &rules).map(Rule::label), Some("Gold Mining"));
	}

	#[test]
	fn value_is_parsed_from_text() {
		let m = RecognizedMission::from_text(
			"WING MINING MISSION: GOLD 45,000,000 CR",
			true,
			Category::Transport,
			ScreenAnchor::row(3),
		);
		assert_eq!(m.parsed_value, Some(45_000_000));
		assert!(evaluate(&m, &[gold_rule()]).is_some());
	}
}
