use std::{fmt, str::FromStr};

/// Mission board tabs, in the order they appear on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	All,
	Combat,
	Transport,
	Freelance,
	Operations,
	Support,
	Thargoid,
}

impl Category {
	pub const ALL: [Category; 7] = [
		Category::All,
		Category::Combat,
		Category::Transport,
		Category::Freelance,
		Category::Operations,
		Category::Support,
		Category::Thargoid,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Category::All => "all",
			Category::Combat => "combat",
			Category::Transport => "transport",
			Category::Freelance => "freelance",
			Category::Operations => "operations",
			Category::Support => "support",
			Category::Thargoid => "thargoid",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Category {
	type Err = RuleDefinitionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		Category::ALL
			.into_iter()
			.find(|c| c.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| RuleDefinitionError::UnknownCategory(s.to_string()))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleDefinitionError {
	#[error("rule label is empty")]
	EmptyLabel,
	#[error("rule {0:?} has no needle groups")]
	NoNeedles(String),
	#[error("rule {label:?}: needle group {group} is empty")]
	EmptyGroup { label: String, group: usize },
	#[error("rule {label:?}: needle group {group} contains an empty pattern")]
	EmptyPattern { label: String, group: usize },
	#[error("rule {label:?}: value {value} is negative")]
	NegativeValue { label: String, value: i64 },
	#[error("rule {label:?}: value {value} is too large")]
	ValueTooLarge { label: String, value: u64 },
	#[error("unknown category {0:?}")]
	UnknownCategory(String),
}

/// One text alternative inside a needle group.
///
/// Written as `GOLD` it matches anywhere in the text; written as `"GOLD"` it
/// only matches a whole alphanumeric token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
	source: String,
	needle: String,
	exact: bool,
}

impl Pattern {
	pub fn parse(source: &str) -> Option<Self> {
		let trimmed = source.trim();
		let (body, exact) = match trimmed.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
			Some(inner) => (inner.trim(), true),
			None => (trimmed, false),
		};
		if body.is_empty() {
			return None;
		}

		Some(Self {
			source: trimmed.to_string(),
			needle: body.to_ascii_uppercase(),
			exact,
		})
	}

	/// The pattern as the user wrote it (trimmed).
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn is_exact(&self) -> bool {
		self.exact
	}

	/// `upper_text` must already be ASCII-uppercased.
	pub fn is_found_in(&self, upper_text: &str) -> bool {
		if self.exact {
			upper_text
				.split(|c: char| !c.is_ascii_alphanumeric())
				.any(|token| token == self.needle)
		} else {
			upper_text.contains(&self.needle)
		}
	}
}

/// A single acceptance criterion.
///
/// Constructed only through [`Rule::new`] (or the interchange conversion), so
/// every `Rule` in the program is well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
	label: String,
	needles: Vec<Vec<Pattern>>,
	wing: bool,
	categories: Vec<Category>,
	min_value: Option<u64>,
}

impl Rule {
	pub fn new<G, P>(
		label: &str,
		needles: impl IntoIterator<Item = G>,
		wing: bool,
		categories: impl IntoIterator<Item = Category>,
		min_value: Option<u64>,
	) -> Result<Self, RuleDefinitionError>
	where
		G: IntoIterator<Item = P>,
		P: AsRef<str>,
	{
		let label = label.trim();
		if label.is_empty() {
			return Err(RuleDefinitionError::EmptyLabel);
		}

		let mut groups = Vec::new();
		for (group, alternatives) in needles.into_iter().enumerate() {
			let mut patterns = Vec::new();
			for alternative in alternatives {
				let pattern = Pattern::parse(alternative.as_ref()).ok_or_else(|| RuleDefinitionError::EmptyPattern {
					label: label.to_string(),
					group,
				})?;
				patterns.push(pattern);
			}
			if patterns.is_empty() {
				return Err(RuleDefinitionError::EmptyGroup {
					label: label.to_string(),
					group,
				});
			}
			groups.push(patterns);
		}
		if groups.is_empty() {
			return Err(RuleDefinitionError::NoNeedles(label.to_string()));
		}

		// Rule files store the value as a signed integer.
		if let Some(value) = min_value.filter(|v| i64::try_from(*v).is_err()) {
			return Err(RuleDefinitionError::ValueTooLarge {
				label: label.to_string(),
				value,
			});
		}

		// A set, but the written order is kept so exports are stable.
		let mut unique = Vec::new();
		for category in categories {
			if !unique.contains(&category) {
				unique.push(category);
			}
		}

		Ok(Self {
			label: label.to_string(),
			needles: groups,
			wing,
			categories: unique,
			min_value,
		})
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn needles(&self) -> &[Vec<Pattern>] {
		&self.needles
	}

	pub fn wing(&self) -> bool {
		self.wing
	}

	/// Empty means the rule applies to every category.
	pub fn categories(&self) -> &[Category] {
		&self.categories
	}

	pub fn min_value(&self) -> Option<u64> {
		self.min_value
	}

	pub fn applies_to(&self, category: Category) -> bool {
		self.categories.is_empty() || self.categories.contains(&category)
	}

	/// AND across groups, OR within a group, case-insensitive.
	pub fn text_matches(&self, text: &str) -> bool {
		let upper = text.to_ascii_uppercase();
		self.needles
			.iter()
			.all(|group| group.iter().any(|pattern| pattern.is_found_in(&upper)))
	}
}

impl fmt::Display for Rule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let groups = self
			.needles
			.iter()
			.map(|g| g.iter().map(Pattern::source).collect::<Vec<_>>().join("|"))
			.collect::<Vec<_>>()
			.join(" & ");
		write!(f, "{}: [{groups}]", self.label)?;
		if self.wing {
			f.write_str(" wing")?;
		}
		if let Some(value) = self.min_value {
			write!(f, " >= {value} CR")?;
		}
		if !self.categories.is_empty() {
			let cats = self.categories.iter().map(Category::as_str).collect::<Vec<_>>().join(",");
			write!(f, " in {cats}")?;
		}
		Ok(())
	}
}
