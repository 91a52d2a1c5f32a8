//! Collaborator interfaces the scan loop drives.
//!
//! Both ports take `&self`: the live game is one shared screen, so a single
//! adapter usually implements both and keeps its own state behind a lock.

use data::Category;

use crate::error::{PerceptionFailure, PortError};

/// Opaque handle an [`ActionPort`] uses to target a mission card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenAnchor(usize);

impl ScreenAnchor {
	pub const fn row(row: usize) -> Self {
		Self(row)
	}

	pub const fn index(&self) -> usize {
		self.0
	}
}

/// One mission card as read from the screen. OCR output is untrusted: the
/// value may be missing and the wing flag may be wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedMission {
	pub raw_text: String,
	/// `None` when no credit amount could be parsed.
	pub parsed_value: Option<u64>,
	pub is_wing: bool,
	/// The category being scanned, not something read from the card.
	pub category: Category,
	pub screen_anchor: ScreenAnchor,
}

impl RecognizedMission {
	/// Build from OCR text, parsing the reward from the text itself.
	pub fn from_text(raw_text: impl Into<String>, is_wing: bool, category: Category, screen_anchor: ScreenAnchor) -> Self {
		let raw_text = raw_text.into();
		Self {
			parsed_value: ie::parse_credits(&raw_text),
			raw_text,
			is_wing,
			category,
			screen_anchor,
		}
	}
}

/// A single card read; a failed read only affects that card.
pub type MissionRead = Result<RecognizedMission, PerceptionFailure>;

pub trait PerceptionPort {
	/// Read every mission card of the currently open category, top to bottom.
	fn capture(&self, category: Category) -> Result<Vec<MissionRead>, PortError>;

	/// Missions already accepted, if the backend can read the counter.
	fn accepted_missions(&self) -> Result<Option<u32>, PortError> {
		Ok(None)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptOutcome {
	/// Cards moved on the board, so anchors from the last capture are stale.
	pub layout_shifted: bool,
}

pub trait ActionPort {
	fn navigate_to_category(&self, category: Category) -> Result<(), PortError>;

	fn accept(&self, anchor: ScreenAnchor) -> Result<AcceptOutcome, PortError>;

	/// Bring up the mission board category list.
	fn open_board(&self) -> Result<(), PortError> {
		Ok(())
	}

	/// From inside a category back to the category list.
	fn return_to_categories(&self) -> Result<(), PortError> {
		Ok(())
	}

	/// Close the board entirely.
	fn leave_board(&self) -> Result<(), PortError> {
		Ok(())
	}
}
