//! JSON import/export of rule sets.
//!
//! The file is a JSON array of records:
//!
//! ```json
//! [{"label": "Gold", "needles": [["MINE", "MINING"], ["GOLD"]],
//!   "categories": ["transport"], "wing": true, "value": 40000000}]
//! ```

use std::{
	fs::File,
	io::{BufReader, BufWriter, Read, Write},
	path::Path,
};

use anyhow::{Context, Result};

use crate::{Category, Rule, RuleDefinitionError};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuleRecord {
	pub label: String,
	pub needles: Vec<Vec<String>>,
	#[serde(default)]
	pub categories: Vec<String>,
	#[serde(default)]
	pub wing: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<i64>,
}

impl From<&Rule> for RuleRecord {
	fn from(rule: &Rule) -> Self {
		Self {
			label: rule.label().to_string(),
			needles: rule
				.needles()
				.iter()
				.map(|group| group.iter().map(|p| p.source().to_string()).collect())
				.collect(),
			categories: rule.categories().iter().map(|c| c.as_str().to_string()).collect(),
			wing: rule.wing(),
			// `Rule::new` rejects values above `i64::MAX`.
			value: rule.min_value().map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
		}
	}
}

impl TryFrom<RuleRecord> for Rule {
	type Error = RuleDefinitionError;

	fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
		let min_value = match record.value {
			Some(value) if value < 0 => {
				return Err(RuleDefinitionError::NegativeValue {
					label: record.label,
					value,
				});
			}
			Some(value) => Some(value as u64),
			None => None,
		};
		let categories = record
			.categories
			.iter()
			.map(|c| c.parse::<Category>())
			.collect::<Result<Vec<_>, _>>()?;

		Rule::new(&record.label, record.needles, record.wing, categories, min_value)
	}
}

/// Parse and validate a rule set. Any invalid rule rejects the whole set.
pub fn import_json(reader: impl Read) -> Result<Vec<Rule>> {
	let records: Vec<RuleRecord> = serde_json::from_reader(reader).context("Decode rules JSON")?;
	let rules = records
		.into_iter()
		.map(Rule::try_from)
		.collect::<Result<Vec<_>, _>>()
		.context("Invalid rule")?;
	Ok(rules)
}

pub fn export_json(writer: impl Write, rules: &[Rule]) -> Result<()> {
	let records = rules.iter().map(RuleRecord::from).collect::<Vec<_>>();
	serde_json::to_writer_pretty(writer, &records).context("Serialize rules")?;
	Ok(())
}

pub fn import_file(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
	let path = path.as_ref();
	let file = File::open(path).with_context(|| format!("Open rules {}", path.display()))?;
	import_json(BufReader::new(file)).with_context(|| format!("Parse rules {}", path.display()))
}

/// Write through a temp file so a crash never leaves a half-written rule file.
pub fn export_file(path: impl AsRef<Path>, rules: &[Rule]) -> Result<()> {
	let path = path.as_ref();
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).with_context(|| format!("Create dir {}", parent.display()))?;
	}

	let tmp = path.with_extension("json.tmp");
	let file = File::create(&tmp).with_context(|| format!("Write rules temp {}", tmp.display()))?;
	let mut writer = BufWriter::new(file);
	export_json(&mut writer, rules)?;
	writer.flush().context("Flush rules")?;
	drop(writer);

	// Replace existing file (Windows-friendly).
	if std::fs::rename(&tmp, path).is_err() {
		let _ = std::fs::remove_file(path);
		std::fs::rename(&tmp, path).with_context(|| format!("Persist rules {}", path.display()))?;
	}
	tracing::debug!(path = %path.display(), count = rules.len(), "exported rules");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::DEFAULT_RULES;

	#[test]
	fn export_then_import_is_identical() {
		let mut rules = DEFAULT_RULES.clone();
		rules.push(
			Rule::new(
				"Anything exact",
				[vec!["\"ARX\"", "donation"]],
				false,
				[Category::Support, Category::All],
				None,
			)
			.unwrap(),
		);
		rules.push(Rule::new("Zero", [vec!["x"]], false, [], Some(0)).unwrap());
		rules.push(Rule::new("Largest", [vec!["x"]], false, [], Some(i64::MAX as u64)).unwrap());

		let mut buf = Vec::new();
		export_json(&mut buf, &rules).unwrap();
		let back = import_json(buf.as_slice()).unwrap();
		assert_eq!(back, rules);
	}

	#[test]
	fn file_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("rules.json");
		export_file(&path, &DEFAULT_RULES).unwrap();
		assert_eq!(import_file(&path).unwrap(), *DEFAULT_RULES);
		assert!(!path.with_extension("json.tmp").exists());
	}

	#[test]
	fn missing_optional_fields_use_defaults() {
		let json = r#"[{"label": "Plain", "needles": [["DATA"]]}]"#;
		let rules = import_json(json.as_bytes()).unwrap();
		assert_eq!(rules.len(), 1);
		assert!(!rules[0].wing());
		assert!(rules[0].categories().is_empty());
		assert_eq!(rules[0].min_value(), None);
	}

	#[test]
	fn negative_value_is_a_definition_error() {
		let json = r#"[{"label": "Bad", "needles": [["A"]], "value": -5}]"#;
		let err = import_json(json.as_bytes()).unwrap_err();
		let def = err.downcast_ref::<RuleDefinitionError>().unwrap();
		assert_eq!(
			def,
			&RuleDefinitionError::NegativeValue { label: "Bad".into(), value: -5 }
		);
	}

	#[test]
	fn unknown_category_is_rejected() {
		let json = r#"[{"label": "Bad", "needles": [["A"]], "categories": ["mining"]}]"#;
		assert!(import_json(json.as_bytes()).is_err());
	}
}
