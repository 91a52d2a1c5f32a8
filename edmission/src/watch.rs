//! Live reload of the rule file.

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use anyhow::{Context, Result};
use data::RuleRegistry;
use notify::{EventKind, RecursiveMode, Watcher};

/// Reload `path` into `registry` whenever it changes. Keep the returned
/// watcher alive for as long as reloads are wanted.
///
/// The parent directory is watched, not the file, since editors often save
/// by replacing the file.
pub fn watch_rules(path: &Path, registry: Arc<RuleRegistry>) -> Result<notify::RecommendedWatcher> {
	let file: PathBuf = path.to_path_buf();
	let dir = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
		_ => PathBuf::from("."),
	};
	let file_name = path.file_name().map(|n| n.to_os_string());

	let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
		let event = match res {
			Ok(event) => event,
			Err(err) => {
				tracing::warn!(error = %err, "rule watcher error");
				return;
			}
		};
		if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
			return;
		}
		if !event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
			return;
		}
		reload(&file, &registry);
	})
	.context("Create rule watcher")?;

	watcher
		.watch(&dir, RecursiveMode::NonRecursive)
		.with_context(|| format!("Watch {}", dir.display()))?;
	tracing::info!(path = %path.display(), "watching rules for changes");
	Ok(watcher)
}

/// A bad edit keeps the previous rules.
pub fn reload(path: &Path, registry: &RuleRegistry) -> bool {
	match data::interchange::import_file(path) {
		Ok(rules) => {
			tracing::info!(path = %path.display(), count = rules.len(), "rules reloaded");
			registry.replace_all(rules);
			true
		}
		Err(err) => {
			tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "rule reload failed; keeping previous rules");
			false
		}
	}
}
