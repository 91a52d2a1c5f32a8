//! Image primitives and utilities.
//!
//! Screen captures are held as an owned RGB image (`OwnedImage`); mission board
//! readers borrow cropped views (`Image<'a>`) instead of copying pixels, and
//! only copy when a crop has to be preprocessed for OCR or compared against a
//! reference icon.

use anyhow::{Context, Result};

use crate::ScreenRegion;

/// Owned RGB image (no alpha).
#[derive(Clone, Debug)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl OwnedImage {
    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        let height = bytes.len() / width.max(1) / 4;
        let data = bytes
            .chunks_exact(4)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    /// Uniform image, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            data: vec![color; (width * height) as usize],
        }
    }

    /// Decode a PNG/JPEG reference image (e.g. the wing icon).
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let data = img.pixels().map(|p| Color::new(p.0[0], p.0[1], p.0[2])).collect();
        Ok(Self { width, height, data })
    }

    /// Resample to an exact size.
    ///
    /// Uses `fast_image_resize` (SIMD-optimized) and keeps output in `Vec<Color>`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);
        if self.width == width && self.height == height {
            return Ok(());
        }

        // SAFETY: `Color` is `#[repr(C)]` with 3 x `u8`, so it is layout-compatible
        // with `fast_image_resize::pixels::U8x3` (alignment 1).
        let src_pixels = unsafe {
            std::slice::from_raw_parts(
                self.data.as_ptr() as *const fast_image_resize::pixels::U8x3,
                self.data.len(),
            )
        };

        let src = fast_image_resize::images::ImageRef::from_pixels(self.width, self.height, src_pixels)
            .context("fast_image_resize: ImageRef::from_pixels failed")?;

        let mut dst = fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x3);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(
            fast_image_resize::ResizeAlg::Interpolation(fast_image_resize::FilterType::CatmullRom),
        );

        resizer
            .resize(&src, &mut dst, &Some(options))
            .context("fast_image_resize: resize failed")?;

        let bytes: Vec<u8> = dst.into_vec();
        self.data = bytes
            .chunks_exact(3)
            .map(|px| Color::new(px[0], px[1], px[2]))
            .collect();
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Resize to the given height, preserving aspect ratio.
    pub fn resized_h(mut self, height: u32) -> Result<Self> {
        let height = height.max(1);
        let width = (self.width as u64 * height as u64 / self.height.max(1) as u64).max(1) as u32;
        self.resize(width, height)?;
        Ok(self)
    }

    pub fn map_pixels(&mut self, f: impl Fn(&mut Color)) {
        for v in &mut self.data {
            f(v);
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Create a borrowed view of this entire image.
    pub fn as_image(&self) -> Image<'_> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Convert to a grayscale `GrayImage` (luma).
    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.data[(x + y * self.width) as usize].luma()])
        })
    }

    /// Create an RGB `OwnedImage` from a grayscale image (each pixel repeated into RGB).
    pub fn from_gray_as_rgb(gray: &image::GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let data = gray.pixels().map(|p| Color::new(p.0[0], p.0[0], p.0[0])).collect();
        Self { width, height, data }
    }
}

// ----------

/// Borrowed image view into an `OwnedImage`.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[inline(always)]
    fn pixel(&self, x: u32, y: u32) -> &Color {
        &self.data[(x + y * self.true_width) as usize]
    }

    fn pixels(&self) -> impl Iterator<Item = &Color> + '_ {
        (self.y1..self.y2).flat_map(move |y| (self.x1..self.x2).map(move |x| self.pixel(x, y)))
    }

    pub fn to_owned_image(self) -> OwnedImage {
        OwnedImage {
            width: self.width(),
            height: self.height(),
            data: self.pixels().copied().collect(),
        }
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.pixels().flat_map(|c| [c.r, c.g, c.b]).collect()
    }

    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let img = image::RgbImage::from_raw(self.width(), self.height(), self.get_bytes())
            .context("RgbImage::from_raw failed")?;
        img.save_with_format(path, image::ImageFormat::Png)
            .context("save png")?;
        Ok(())
    }

    /// Create an arbitrary subimage (relative coordinates), clamped to the view.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// Crop a reference-resolution region scaled to this view's size.
    pub fn region(&self, region: &ScreenRegion) -> Self {
        let (x, y, w, h) = region.scaled(self.width(), self.height());
        self.sub_image(x, y, w, h)
    }

    pub fn average_color(&self) -> Color {
        let count = (self.width() * self.height()).max(1);
        let (r, g, b) = self.pixels().fold((0u32, 0u32, 0u32), |(r, g, b), c| {
            (r + c.r as u32, g + c.g as u32, b + c.b as u32)
        });

        Color {
            r: (r / count) as u8,
            g: (g / count) as u8,
            b: (b / count) as u8,
        }
    }

    /// Mean squared error summed over the RGB channels, per pixel.
    ///
    /// `0.0` means identical; differently sized views compare as `f32::MAX`.
    pub fn mse(&self, other: Image) -> f32 {
        if self.width() != other.width() || self.height() != other.height() {
            return f32::MAX;
        }
        let count = (self.width() * self.height()) as f64;
        if count == 0.0 {
            return 0.0;
        }

        let sum = self
            .pixels()
            .zip(other.pixels())
            .map(|(a, b)| {
                let dr = a.r as f64 - b.r as f64;
                let dg = a.g as f64 - b.g as f64;
                let db = a.b as f64 - b.b as f64;
                dr * dr + dg * dg + db * db
            })
            .sum::<f64>();
        (sum / count) as f32
    }

    /// Extract text using OCR with preprocessing (grayscale, thresholding, upscale).
    ///
    /// The function tries multiple preprocessing strategies (adaptive threshold,
    /// Otsu threshold, theme-guided) and picks the most plausible result.
    pub fn get_text(&self, theme: crate::Theme, ocr: &crate::ocr::Ocr) -> String {
        self.candidates(theme)
            .into_iter()
            .map(|cand| ocr.get_text(cand.as_image()))
            .max_by_key(|text| score_ocr_text(text))
            .unwrap_or_default()
    }

    /// Read a number, trying each preprocessing variant until one yields digits.
    pub fn get_digits(&self, theme: crate::Theme, ocr: &crate::ocr::Ocr) -> Option<u64> {
        self.candidates(theme).into_iter().find_map(|cand| {
            let text = ocr.get_text(cand.as_image());
            let digits = text.chars().filter(char::is_ascii_digit).collect::<String>();
            digits.parse::<u64>().ok()
        })
    }

    fn candidates(&self, theme: crate::Theme) -> Vec<OwnedImage> {
        use imageproc::contrast::{adaptive_threshold, equalize_histogram, otsu_level, threshold, ThresholdType};

        if self.width() == 0 || self.height() == 0 {
            return Vec::new();
        }

        // Upscale small crops – OCR generally performs better on larger glyphs.
        let mut base = self.to_owned_image();
        const MIN_H: u32 = 80;
        if base.height < MIN_H {
            base = match base.clone().resized_h(MIN_H) {
                Ok(v) => v,
                Err(err) => {
                    tracing::debug!(error = %err, "upscale failed; using original crop");
                    base
                }
            };
        }

        // Candidate 1: theme-guided. HUD text is drawn in the theme color.
        let theme_bin = {
            let mut img = base.clone();
            img.map_pixels(|v| {
                let d1 = v.deviation(theme.text);
                let d2 = v.deviation(theme.background);
                *v = if d1 < d2 { Color::BLACK } else { Color::WHITE };
            });
            img
        };

        // Candidate 2: adaptive threshold (handles gradients/transparency).
        let adaptive = {
            let gray = equalize_histogram(&base.to_gray_image());
            let bin = adaptive_threshold(&gray, 7, 10);
            OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(bin))
        };

        // Candidate 3: global Otsu.
        let otsu = {
            let gray = equalize_histogram(&base.to_gray_image());
            let level = otsu_level(&gray);
            let bin = threshold(&gray, level, ThresholdType::Binary);
            OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(bin))
        };

        vec![theme_bin, adaptive, otsu]
    }
}

fn ensure_dark_text_on_light(mut bin: image::GrayImage) -> image::GrayImage {
    // If the image is mostly black, invert it so background becomes light.
    let white = bin.pixels().filter(|p| p.0[0] > 0).count();
    let black = (bin.width() * bin.height()) as usize - white;
    if black > white {
        for p in bin.pixels_mut() {
            p.0[0] = 255u8.saturating_sub(p.0[0]);
        }
    }
    bin
}

fn score_ocr_text(text: &str) -> i64 {
    // Prefer strings with more alphanumerics (less noise) and slightly longer length.
    let mut score = 0i64;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            score += 3;
        } else if !ch.is_whitespace() {
            score += 1;
        }
    }
    score + text.len() as i64
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Deviation metric used for HUD color checks.
    ///
    /// NOTE: This is intentionally *not* Euclidean distance; it is tuned for
    /// robust thresholding in the presence of compression and post-processing.
    pub fn deviation(&self, other: Color) -> f32 {
        (((self.r as f32 - other.r as f32).abs() / 255.0 / 3.0
            + (self.g as f32 - other.g as f32).abs() / 255.0 / 3.0
            + (self.b as f32 - other.b as f32).abs() / 255.0 / 3.0)
            / 0.05)
            .powi(3)
    }

    /// Compute luma (grayscale intensity).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_is_zero_for_identical_crops() {
        let a = OwnedImage::filled(4, 4, Color::new(10, 20, 30));
        let b = a.clone();
        assert_eq!(a.as_image().mse(b.as_image()), 0.0);
    }

    #[test]
    fn mse_sums_channels_per_pixel() {
        let a = OwnedImage::filled(2, 2, Color::new(0, 0, 0));
        let b = OwnedImage::filled(2, 2, Color::new(1, 2, 3));
        assert_eq!(a.as_image().mse(b.as_image()), 14.0);
    }

    #[test]
    fn mse_of_mismatched_sizes_is_max() {
        let a = OwnedImage::filled(2, 2, Color::BLACK);
        let b = OwnedImage::filled(3, 2, Color::BLACK);
        assert_eq!(a.as_image().mse(b.as_image()), f32::MAX);
    }

    #[test]
    fn sub_image_is_clamped() {
        let img = OwnedImage::filled(10, 10, Color::WHITE);
        let view = img.as_image().sub_image(8, 8, 5, 5);
        assert_eq!((view.width(), view.height()), (2, 2));
        assert_eq!(view.average_color(), Color::WHITE);
    }

    #[test]
    fn from_rgba_drops_alpha() {
        let bytes = [1, 2, 3, 255, 4, 5, 6, 0];
        let img = OwnedImage::from_rgba(2, &bytes);
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.as_image().get_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }
}
