//! Mission board geometry.
//!
//! All regions are measured on a 3840×2160 capture and scaled to the actual
//! capture size, so any 16:9 resolution works.

pub const REF_WIDTH: u32 = 3840;
pub const REF_HEIGHT: u32 = 2160;

/// Rows visible on the board before the list starts scrolling.
pub const VISIBLE_ROWS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRegion {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl ScreenRegion {
	pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}

	/// `(x, y, width, height)` at the given capture size.
	pub fn scaled(&self, screen_width: u32, screen_height: u32) -> (u32, u32, u32, u32) {
		let sx = |v: u32| (v as u64 * screen_width as u64 / REF_WIDTH as u64) as u32;
		let sy = |v: u32| (v as u64 * screen_height as u64 / REF_HEIGHT as u64) as u32;
		(sx(self.x), sy(self.y), sx(self.width).max(1), sy(self.height).max(1))
	}
}

const fn card(y: u32) -> ScreenRegion {
	ScreenRegion::new(235, y, 1563, 127)
}

const fn wing(y: u32) -> ScreenRegion {
	ScreenRegion::new(235, y, 45, 40)
}

#[derive(Debug, Clone)]
pub struct BoardLayout {
	/// Six visible rows, then the row the selection sits on once the list scrolls.
	pub mission_rows: [ScreenRegion; VISIBLE_ROWS + 1],
	pub wing_icons: [ScreenRegion; VISIBLE_ROWS + 1],
	/// Changes appearance once the selection moves past the last mission.
	pub back_button: ScreenRegion,
	/// Accepted-mission counter on the transactions panel.
	pub mission_count: ScreenRegion,
}

impl BoardLayout {
	pub const ELITE: Self = Self {
		mission_rows: [card(888), card(1040), card(1184), card(1336), card(1481), card(1627), card(1683)],
		wing_icons: [wing(980), wing(1132), wing(1276), wing(1428), wing(1573), wing(1719), wing(1775)],
		back_button: ScreenRegion::new(235, 1868, 666, 90),
		mission_count: ScreenRegion::new(499, 630, 140, 80),
	};

	pub fn mission_row(&self, index: usize) -> &ScreenRegion {
		&self.mission_rows[index.min(VISIBLE_ROWS)]
	}

	pub fn wing_icon(&self, index: usize) -> &ScreenRegion {
		&self.wing_icons[index.min(VISIBLE_ROWS)]
	}
}

impl Default for BoardLayout {
	fn default() -> Self {
		Self::ELITE
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scales_to_1080p() {
		let r = ScreenRegion::new(235, 888, 1563, 127);
		assert_eq!(r.scaled(1920, 1080), (117, 444, 781, 63));
		assert_eq!(r.scaled(REF_WIDTH, REF_HEIGHT), (235, 888, 1563, 127));
	}

	#[test]
	fn rows_past_the_fold_use_the_scrolled_row() {
		let layout = BoardLayout::ELITE;
		assert_eq!(layout.mission_row(0).y, 888);
		assert_eq!(layout.mission_row(6).y, 1683);
		assert_eq!(layout.mission_row(25).y, 1683);
		assert_eq!(layout.wing_icon(30).y, 1775);
	}
}
