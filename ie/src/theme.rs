use crate::Color;

/// HUD colors used to isolate mission board text before OCR.
///
/// Elite Dangerous lets players recolor the HUD, so both colors are part of
/// the user configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Theme {
    pub text: Color,
    pub background: Color,
}

impl Theme {
    /// Stock orange HUD on the dark station menu background.
    pub const ELITE: Self = Self {
        text: Color::new(255, 128, 0),
        background: Color::new(8, 6, 4),
    };
}

impl Default for Theme {
    fn default() -> Self {
        Self::ELITE
    }
}
