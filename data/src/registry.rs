use std::sync::{Arc, LazyLock, RwLock};

use crate::{Category, Rule};

/// Wing mining missions for the common high value commodities.
pub static DEFAULT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
	[
		("Bertrandite", "BERT", 49_000_000),
		("Gold", "GOLD", 40_000_000),
		("Silver", "SILVER", 49_000_000),
		("Indite", "INDITE", 39_000_000),
	]
	.into_iter()
	.filter_map(|(label, commodity, value)| {
		Rule::new(
			label,
			[vec!["MINE", "MINING", "BLAST"], vec![commodity]],
			true,
			[Category::Transport],
			Some(value),
		)
		.ok()
	})
	.collect()
});

/// Ordered, shareable rule set.
///
/// Edits replace the whole list, so a [`RuleRegistry::snapshot`] taken before
/// an edit keeps seeing the old rules.
#[derive(Debug)]
pub struct RuleRegistry {
	rules: RwLock<Arc<[Rule]>>,
}

impl Default for RuleRegistry {
	fn default() -> Self {
		Self::new(Vec::new())
	}
}

impl RuleRegistry {
	pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
		Self {
			rules: RwLock::new(rules.into_iter().collect()),
		}
	}

	pub fn with_defaults() -> Self {
		Self::new(DEFAULT_RULES.iter().cloned())
	}

	pub fn snapshot(&self) -> Arc<[Rule]> {
		match self.rules.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	fn edit<R>(&self, f: impl FnOnce(&mut Vec<Rule>) -> R) -> R {
		let mut guard = match self.rules.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let mut rules = guard.to_vec();
		let out = f(&mut rules);
		*guard = rules.into();
		out
	}

	pub fn add(&self, rule: Rule) {
		self.edit(|rules| rules.push(rule));
	}

	/// Remove the first rule with this label.
	pub fn remove(&self, label: &str) -> bool {
		self.edit(|rules| match rules.iter().position(|r| r.label() == label) {
			Some(index) => {
				rules.remove(index);
				true
			}
			None => false,
		})
	}

	/// Earlier rules win ties, so moving a rule up raises its priority.
	pub fn move_up(&self, index: usize) -> bool {
		self.edit(|rules| {
			if index == 0 || index >= rules.len() {
				return false;
			}
			rules.swap(index - 1, index);
			true
		})
	}

	pub fn move_down(&self, index: usize) -> bool {
		self.edit(|rules| {
			if index + 1 >= rules.len() {
				return false;
			}
			rules.swap(index, index + 1);
			true
		})
	}

	pub fn replace_all(&self, new_rules: Vec<Rule>) {
		self.edit(|rules| *rules = new_rules);
	}

	pub fn clear(&self) {
		self.edit(Vec::clear);
	}

	pub fn len(&self) -> usize {
		self.snapshot().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Categories named by any rule, in first-appearance order.
	pub fn unique_categories(&self) -> Vec<Category> {
		let mut out = Vec::new();
		for rule in self.snapshot().iter() {
			for category in rule.categories() {
				if !out.contains(category) {
					out.push(*category);
				}
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rule(label: &str, categories: &[Category]) -> Rule {
		Rule::new(label, [vec!["X"]], false, categories.iter().copied(), None).unwrap()
	}

	#[test]
	fn defaults_are_transport_wing_rules() {
		assert_eq!(DEFAULT_RULES.len(), 4);
		assert!(DEFAULT_RULES.iter().all(|r| r.wing() && r.categories() == [Category::Transport]));
		assert_eq!(DEFAULT_RULES[1].label(), "Gold");
		assert_eq!(DEFAULT_RULES[1].min_value(), Some(40_000_000));
	}

	#[test]
	fn snapshot_is_unaffected_by_later_edits() {
		let registry = RuleRegistry::new([rule("a", &[]), rule("b", &[])]);
		let before = registry.snapshot();
		registry.remove("a");
		registry.add(rule("c", &[]));
		assert_eq!(before.len(), 2);
		assert_eq!(before[0].label(), "a");
		let after = registry.snapshot();
		assert_eq!(after.iter().map(Rule::label).collect::<Vec<_>>(), ["b", "c"]);
	}

	#[test]
	fn reorder_and_remove() {
		let registry = RuleRegistry::new([rule("a", &[]), rule("b", &[]), rule("c", &[])]);
		assert!(registry.move_up(2));
		assert!(!registry.move_up(0));
		assert!(registry.move_down(0));
		assert!(!registry.move_down(2));
		let labels = registry.snapshot().iter().map(|r| r.label().to_string()).collect::<Vec<_>>();
		assert_eq!(labels, ["c", "a", "b"]);
		assert!(registry.remove("a"));
		assert!(!registry.remove("a"));
		assert_eq!(registry.len(), 2);
		registry.clear();
		assert!(registry.is_empty());
	}

	#[test]
	fn unique_categories_keep_first_appearance() {
		let registry = RuleRegistry::new([
			rule("a", &[Category::Transport]),
			rule("b", &[]),
			rule("c", &[Category::Combat, Category::Transport]),
		]);
		assert_eq!(registry.unique_categories(), [Category::Transport, Category::Combat]);
	}
}
