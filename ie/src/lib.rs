//! Image engine: captures, OCR and the Elite Dangerous mission board readers.

mod image;
pub use self::image::*;
mod layout;
pub use layout::*;
mod ocr;
pub use ocr::OcrModels;
mod theme;
pub use theme::*;
mod util;
pub use util::{normalize_text, parse_credits};

pub mod screen;

/// Tuning for the image comparisons.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Thresholds {
	/// Back button MSE above this means the list has ended.
	pub back_button_mse: f32,
	/// Wing slot MSE below this means the wing icon is present.
	pub wing_icon_mse: f32,
}

impl Default for Thresholds {
	fn default() -> Self {
		Self {
			back_button_mse: 1.0,
			wing_icon_mse: 5000.0,
		}
	}
}

pub struct Ie {
	theme: Theme,
	layout: BoardLayout,
	thresholds: Thresholds,
	wing_icon: Option<OwnedImage>,
	ocr: ocr::Ocr,
}

impl Ie {
	/// Fails when the OCR models cannot be loaded.
	///
	/// A missing wing icon is not fatal; wing detection then reports `false`
	/// for every card.
	pub fn try_new(
		theme: Theme,
		thresholds: Thresholds,
		models: &OcrModels,
		wing_icon: Option<&std::path::Path>,
	) -> anyhow::Result<Self> {
		let wing_icon = match wing_icon {
			Some(path) => match OwnedImage::load(path) {
				Ok(icon) => Some(icon),
				Err(err) => {
					tracing::warn!(error = %err, "wing icon unavailable; wing rules will never match");
					None
				}
			},
			None => None,
		};

		Ok(Self {
			theme,
			layout: BoardLayout::default(),
			thresholds,
			wing_icon,
			ocr: ocr::Ocr::try_new(models)?,
		})
	}

	pub fn mission_text(&self, image: Image, row: usize) -> String {
		screen::missionboard::mission_text(image, &self.layout, row, self.theme, &self.ocr)
	}

	pub fn mission_is_wing(&self, image: Image, row: usize) -> bool {
		match &self.wing_icon {
			Some(icon) => screen::missionboard::is_wing(image, &self.layout, row, icon, self.thresholds.wing_icon_mse),
			None => false,
		}
	}

	pub fn back_button(&self, image: Image) -> OwnedImage {
		screen::missionboard::back_button(image, &self.layout)
	}

	pub fn list_ended(&self, reference: &OwnedImage, current: &OwnedImage) -> bool {
		screen::missionboard::list_ended(reference, current, self.thresholds.back_button_mse)
	}

	pub fn accepted_count(&self, image: Image) -> Option<u64> {
		screen::missionboard::accepted_count(image, &self.layout, self.theme, &self.ocr)
	}
}
