//! Elite Dangerous mission board, driven through window capture and
//! simulated key presses.
//!
//! The board only shows a handful of cards at once, so a capture walks the
//! list one row at a time with the keyboard and reads the selected card each
//! step. A card is identified by its row index; `accept` walks back to it.

use std::{
	sync::{Mutex, MutexGuard},
	time::Duration,
};

use data::Category;

use crate::{
	capture,
	config::Config,
	error::{ActionFailure, FatalBackendError, PerceptionFailure, PortError},
	input::{self, Key, Keyboard},
	ports::{AcceptOutcome, ActionPort, MissionRead, PerceptionPort, RecognizedMission, ScreenAnchor},
};

/// Key presses that select `category` starting from the "all" tab, followed
/// by a single `Space` to open it.
pub fn category_keys(category: Category) -> &'static [(Key, usize)] {
	match category {
		Category::All => &[],
		Category::Combat => &[(Key::Right, 1)],
		Category::Transport => &[(Key::Right, 2)],
		Category::Freelance => &[(Key::Right, 3)],
		Category::Operations => &[(Key::Down, 1)],
		Category::Support => &[(Key::Down, 1), (Key::Right, 1)],
		Category::Thargoid => &[(Key::Down, 1), (Key::Right, 2)],
	}
}

/// Keys that move the list selection from row `from` to row `to`.
pub fn row_moves(from: usize, to: usize) -> Option<(Key, usize)> {
	match to.cmp(&from) {
		std::cmp::Ordering::Less => Some((Key::Up, from - to)),
		std::cmp::Ordering::Greater => Some((Key::Down, to - from)),
		std::cmp::Ordering::Equal => None,
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Timing {
	/// After opening the board or a category.
	pub settle: Duration,
	/// Between key presses.
	pub input_interval: Duration,
}

pub struct EliteDangerous {
	ie: ie::Ie,
	window: String,
	keys: Box<dyn Keyboard>,
	timing: Timing,
	max_rows: usize,
	debug_ocr: bool,
	/// Selected row of the open category, counted from the top.
	cursor: Mutex<usize>,
}

impl EliteDangerous {
	pub fn new(ie: ie::Ie, window: impl Into<String>, keys: Box<dyn Keyboard>, timing: Timing, max_rows: usize) -> Self {
		Self {
			ie,
			window: window.into(),
			keys,
			timing,
			max_rows: max_rows.max(1),
			debug_ocr: false,
			cursor: Mutex::new(0),
		}
	}

	/// Load the OCR models and wing icon named by `config`.
	pub fn from_config(config: &Config, keys: Box<dyn Keyboard>) -> Result<Self, FatalBackendError> {
		let ie = ie::Ie::try_new(
			config.theme,
			config.thresholds,
			&ie::OcrModels::in_dir(&config.ocr_models),
			config.wing_icon.as_deref(),
		)
		.map_err(|err| FatalBackendError::Ocr(format!("{err:#}")))?;

		let timing = Timing {
			settle: config.settle_delay(),
			input_interval: config.input_interval(),
		};
		let mut game = Self::new(ie, config.window_title.clone(), keys, timing, config.max_rows);
		game.debug_ocr = config.debug_ocr;
		Ok(game)
	}

	fn cursor(&self) -> MutexGuard<'_, usize> {
		match self.cursor.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	fn press(&self, key: Key, times: usize) -> Result<(), ActionFailure> {
		input::press(&*self.keys, key, times, self.timing.input_interval)
	}

	fn move_to(&self, cursor: &mut usize, row: usize) -> Result<(), ActionFailure> {
		if let Some((key, times)) = row_moves(*cursor, row) {
			self.press(key, times)?;
			*cursor = row;
		}
		Ok(())
	}

	fn settle(&self) {
		std::thread::sleep(self.timing.settle);
	}

	fn grab(&self) -> Result<ie::OwnedImage, PortError> {
		let image = capture::capture(&self.window)?;
		if self.debug_ocr {
			if let Err(err) = image.as_image().save_png("edmission_debug.png") {
				tracing::debug!(error = %err, "debug capture not saved");
			}
		}
		Ok(image)
	}

	fn read_row(&self, image: &ie::OwnedImage, row: usize, category: Category) -> MissionRead {
		let text = self.ie.mission_text(image.as_image(), row);
		if text.is_empty() {
			return Err(PerceptionFailure::Unreadable(format!("row {row} has no text")));
		}
		let is_wing = self.ie.mission_is_wing(image.as_image(), row);
		let mission = RecognizedMission::from_text(text, is_wing, category, ScreenAnchor::row(row));
		tracing::debug!(row, text = %mission.raw_text, value = ?mission.parsed_value, wing = is_wing, "read mission");
		Ok(mission)
	}
}

impl PerceptionPort for EliteDangerous {
	fn capture(&self, category: Category) -> Result<Vec<MissionRead>, PortError> {
		let mut cursor = self.cursor();
		self.move_to(&mut cursor, 0)?;

		let mut reads = Vec::new();
		let mut reference = None;
		for row in 0..self.max_rows {
			let image = match self.grab() {
				Ok(image) => image,
				// Nothing read yet, so the whole category failed.
				Err(err) if row == 0 || err.is_fatal() => return Err(err),
				Err(err) => {
					reads.push(Err(PerceptionFailure::Capture(err.to_string())));
					self.press(Key::Down, 1)?;
					*cursor += 1;
					continue;
				}
			};

			let back = self.ie.back_button(image.as_image());
			if reference.as_ref().is_some_and(|r| self.ie.list_ended(r, &back)) {
				break;
			}
			if reference.is_none() {
				reference = Some(back);
			}

			match self.read_row(&image, row, category) {
				// A blank first card is an empty board.
				Err(_) if row == 0 => break,
				read => reads.push(read),
			}

			self.press(Key::Down, 1)?;
			*cursor += 1;
		}

		tracing::debug!(%category, cards = reads.len(), "board read");
		Ok(reads)
	}

	/// Opens the left panel to read the counter, then closes it again.
	fn accepted_missions(&self) -> Result<Option<u32>, PortError> {
		self.press(Key::LeftPanel, 1)?;
		self.settle();
		let image = self.grab();
		self.press(Key::LeftPanel, 1)?;

		let count = self.ie.accepted_count(image?.as_image());
		Ok(count.and_then(|c| u32::try_from(c).ok()))
	}
}

impl ActionPort for EliteDangerous {
	fn navigate_to_category(&self, category: Category) -> Result<(), PortError> {
		let nav = |err: ActionFailure| ActionFailure::Navigation(format!("{category}: {err}"));
		for &(key, times) in category_keys(category) {
			self.press(key, times).map_err(nav)?;
		}
		self.press(Key::Space, 1).map_err(nav)?;
		*self.cursor() = 0;
		self.settle();
		Ok(())
	}

	fn accept(&self, anchor: ScreenAnchor) -> Result<AcceptOutcome, PortError> {
		let mut cursor = self.cursor();
		let failed = |err: ActionFailure| ActionFailure::Accept(format!("row {}: {err}", anchor.index()));
		self.move_to(&mut cursor, anchor.index()).map_err(failed)?;

		// Open the mission, then confirm.
		self.press(Key::Space, 1).map_err(failed)?;
		std::thread::sleep(input::jittered(self.timing.settle / 2));
		self.press(Key::Space, 1).map_err(failed)?;
		self.settle();

		// The card is gone and the selection now sits on the next one.
		Ok(AcceptOutcome { layout_shifted: true })
	}

	fn open_board(&self) -> Result<(), PortError> {
		self.press(Key::Space, 2)?;
		self.settle();
		Ok(())
	}

	fn return_to_categories(&self) -> Result<(), PortError> {
		self.press(Key::Backspace, 1)?;
		*self.cursor() = 0;
		Ok(())
	}

	fn leave_board(&self) -> Result<(), PortError> {
		self.press(Key::Backspace, 2)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_category_has_a_key_path() {
		assert!(category_keys(Category::All).is_empty());
		assert_eq!(category_keys(Category::Transport), [(Key::Right, 2)]);
		assert_eq!(category_keys(Category::Thargoid), [(Key::Down, 1), (Key::Right, 2)]);
		for category in Category::ALL {
			let right = category_keys(category)
				.iter()
				.filter(|(k, _)| *k == Key::Right)
				.map(|(_, n)| n)
				.sum::<usize>();
			assert!(right <= 3, "{category}");
		}
	}

	#[test]
	fn row_moves_go_both_ways() {
		assert_eq!(row_moves(5, 2), Some((Key::Up, 3)));
		assert_eq!(row_moves(0, 4), Some((Key::Down, 4)));
		assert_eq!(row_moves(3, 3), None);
	}
}
