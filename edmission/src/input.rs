//! Simulated keyboard input for the game window.
//!
//! The game reads DirectInput scancodes, so keys are sent as scancodes rather
//! than virtual key codes.

use std::time::Duration;

use rand::Rng;

use crate::error::{ActionFailure, FatalBackendError};

/// Keys the mission board is driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	/// Select.
	Space,
	/// Back out one level.
	Backspace,
	Up,
	Down,
	Right,
	/// Left panel, where the accepted-mission counter lives.
	LeftPanel,
}

impl Key {
	/// Windows virtual key code of the default binding.
	pub const fn virtual_key(self) -> u16 {
		match self {
			Key::Space => 0x20,
			Key::Backspace => 0x08,
			Key::Up => 0x57,
			Key::Down => 0x53,
			Key::Right => 0x44,
			Key::LeftPanel => 0x31,
		}
	}
}

pub trait Keyboard: Send + Sync {
	/// Press and release `key` once.
	fn tap(&self, key: Key) -> Result<(), ActionFailure>;
}

/// Tap `key` `times` times, pausing `interval` plus jitter after each tap.
pub fn press(keyboard: &dyn Keyboard, key: Key, times: usize, interval: Duration) -> Result<(), ActionFailure> {
	for _ in 0..times {
		keyboard.tap(key)?;
		std::thread::sleep(jittered(interval));
	}
	Ok(())
}

/// Up to a quarter of `base` extra, so presses do not land on a fixed beat.
pub fn jittered(base: Duration) -> Duration {
	let extra = rand::thread_rng().gen_range(0.0..=0.25);
	base + base.mul_f64(extra)
}

/// The platform keyboard, or a fatal error where there is none.
pub fn system_keyboard() -> Result<Box<dyn Keyboard>, FatalBackendError> {
	#[cfg(windows)]
	{
		Ok(Box::new(win::SendInputKeyboard))
	}
	#[cfg(not(windows))]
	{
		Err(FatalBackendError::Input(
			"simulated input is only supported on Windows".to_string(),
		))
	}
}

#[cfg(windows)]
mod win {
	use std::time::Duration;

	use windows::Win32::UI::Input::KeyboardAndMouse::{
		INPUT, INPUT_0, INPUT_KEYBOARD, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
		MAPVK_VK_TO_VSC, MapVirtualKeyW, SendInput, VIRTUAL_KEY,
	};

	use super::{Key, Keyboard};
	use crate::error::ActionFailure;

	/// How long a key is held; the game polls input once per frame.
	const HOLD: Duration = Duration::from_millis(50);

	pub struct SendInputKeyboard;

	fn send(scan: u16, flags: KEYBD_EVENT_FLAGS) -> Result<(), ActionFailure> {
		let input = INPUT {
			r#type: INPUT_KEYBOARD,
			Anonymous: INPUT_0 {
				ki: KEYBDINPUT {
					wVk: VIRTUAL_KEY(0),
					wScan: scan,
					dwFlags: KEYEVENTF_SCANCODE | flags,
					time: 0,
					dwExtraInfo: 0,
				},
			},
		};
		let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
		if sent == 1 {
			Ok(())
		} else {
			Err(ActionFailure::Input(format!("SendInput rejected scancode {scan:#04x}")))
		}
	}

	impl Keyboard for SendInputKeyboard {
		fn tap(&self, key: Key) -> Result<(), ActionFailure> {
			let scan = unsafe { MapVirtualKeyW(u32::from(key.virtual_key()), MAPVK_VK_TO_VSC) } as u16;
			if scan == 0 {
				return Err(ActionFailure::Input(format!("no scancode for {key:?}")));
			}
			send(scan, KEYBD_EVENT_FLAGS(0))?;
			std::thread::sleep(HOLD);
			send(scan, KEYEVENTF_KEYUP)
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;

	#[derive(Default)]
	struct Recorder(Mutex<Vec<Key>>);

	impl Keyboard for Recorder {
		fn tap(&self, key: Key) -> Result<(), ActionFailure> {
			self.0.lock().unwrap().push(key);
			Ok(())
		}
	}

	#[test]
	fn jitter_stays_in_range() {
		let base = Duration::from_millis(200);
		for _ in 0..100 {
			let d = jittered(base);
			assert!(d >= base && d <= Duration::from_millis(250), "{d:?}");
		}
		assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
	}

	#[test]
	fn press_repeats() {
		let keys = Recorder::default();
		press(&keys, Key::Right, 3, Duration::ZERO).unwrap();
		assert_eq!(*keys.0.lock().unwrap(), [Key::Right; 3]);
	}

	#[test]
	fn bindings_are_distinct() {
		let keys = [Key::Space, Key::Backspace, Key::Up, Key::Down, Key::Right, Key::LeftPanel];
		for (i, a) in keys.iter().enumerate() {
			for b in &keys[i + 1..] {
				assert_ne!(a.virtual_key(), b.virtual_key(), "{a:?} and {b:?}");
			}
		}
	}

	#[cfg(not(windows))]
	#[test]
	fn no_keyboard_off_windows() {
		assert!(matches!(system_keyboard(), Err(FatalBackendError::Input(_))));
	}
}
