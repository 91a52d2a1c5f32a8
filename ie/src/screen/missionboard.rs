//! Mission board readers.
//!
//! Everything here works on a single capture and never panics on odd sizes:
//! a crop that falls outside the capture is clamped and reads as empty text
//! or "no match".

use crate::{BoardLayout, Image, OwnedImage, Theme, util};

/// OCR text of the mission card on `row`, whitespace-normalized.
pub fn mission_text(image: Image, layout: &BoardLayout, row: usize, theme: Theme, ocr: &crate::ocr::Ocr) -> String {
    let card = image.region(layout.mission_row(row));
    util::normalize_text(&card.get_text(theme, ocr))
}

/// Compare the wing-icon slot of `row` with the reference icon.
///
/// The icon is resampled to the crop size first, so one reference works at
/// every resolution.
pub fn is_wing(image: Image, layout: &BoardLayout, row: usize, icon: &OwnedImage, max_mse: f32) -> bool {
    let slot = image.region(layout.wing_icon(row));
    let mut reference = icon.clone();
    if let Err(err) = reference.resize(slot.width(), slot.height()) {
        tracing::debug!(error = %err, "wing icon resize failed");
        return false;
    }

    let mse = slot.mse(reference.as_image());
    tracing::trace!(row, mse, "wing icon mse");
    mse < max_mse
}

/// Snapshot of the back button, used as the end-of-list reference.
pub fn back_button(image: Image, layout: &BoardLayout) -> OwnedImage {
    image.region(&layout.back_button).to_owned_image()
}

/// The back button highlights once the selection runs off the end of the list.
pub fn list_ended(reference: &OwnedImage, current: &OwnedImage, min_mse: f32) -> bool {
    let mse = reference.as_image().mse(current.as_image());
    tracing::trace!(mse, "back button mse");
    mse > min_mse
}

/// Number shown on the accepted-missions counter, if readable.
pub fn accepted_count(image: Image, layout: &BoardLayout, theme: Theme, ocr: &crate::ocr::Ocr) -> Option<u64> {
    image.region(&layout.mission_count).get_digits(theme, ocr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn screen(color: Color) -> OwnedImage {
        OwnedImage::filled(1920, 1080, color)
    }

    #[test]
    fn back_button_change_ends_the_list() {
        let layout = BoardLayout::ELITE;
        let idle = back_button(screen(Color::BLACK).as_image(), &layout);
        let same = back_button(screen(Color::BLACK).as_image(), &layout);
        let lit = back_button(screen(Color::new(255, 128, 0)).as_image(), &layout);
        assert!(!list_ended(&idle, &same, 1.0));
        assert!(list_ended(&idle, &lit, 1.0));
    }

    #[test]
    fn wing_icon_matches_same_pixels() {
        let layout = BoardLayout::ELITE;
        let icon = OwnedImage::filled(45, 40, Color::new(255, 128, 0));
        assert!(is_wing(screen(Color::new(255, 128, 0)).as_image(), &layout, 0, &icon, 5000.0));
        assert!(!is_wing(screen(Color::BLACK).as_image(), &layout, 0, &icon, 5000.0));
    }
}
