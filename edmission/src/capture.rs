use crate::error::{FatalBackendError, PerceptionFailure, PortError};

/// Find the first window whose title or app name contains `needle`
/// (case-insensitive).
pub fn find_window(needle: &str) -> Option<xcap::Window> {
	let needle = needle.to_lowercase();
	let windows = xcap::Window::all().ok()?;
	windows.into_iter().find(|window| {
		[window.title().ok(), window.app_name().ok()]
			.into_iter()
			.flatten()
			.any(|name| name.to_lowercase().contains(&needle))
	})
}

/// Capture the game window.
///
/// A missing window is fatal: nothing on the board can be read or pressed
/// without it.
pub fn capture(needle: &str) -> Result<ie::OwnedImage, PortError> {
	let window = find_window(needle).ok_or_else(|| FatalBackendError::WindowMissing(needle.to_string()))?;
	if window.is_minimized().unwrap_or(false) {
		return Err(PerceptionFailure::Capture(format!("{needle} is minimized")).into());
	}
	let img = window
		.capture_image()
		.map_err(|err| PerceptionFailure::Capture(err.to_string()))?;
	if img.width() == 0 || img.height() == 0 {
		return Err(PerceptionFailure::Capture("empty capture".to_string()).into());
	}
	Ok(ie::OwnedImage::from_rgba(img.width() as usize, img.as_raw()))
}
