//! OCR wrapper.
//!
//! The project relies on `ocr-rs` (Rust PaddleOCR bindings).
//! OCR engines are sensitive to input quality, so most preprocessing is done
//! in `Image::get_text(...)` before calling into this module.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Locations of the PaddleOCR model files.
#[derive(Debug, Clone)]
pub struct OcrModels {
    pub detection: PathBuf,
    pub recognition: PathBuf,
    pub charset: PathBuf,
}

impl OcrModels {
    /// Standard file names inside a model directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection: dir.join("detection.mnn"),
            recognition: dir.join("latin_recognition.mnn"),
            charset: dir.join("latin_charset.txt"),
        }
    }

    fn check(&self) -> Result<()> {
        for path in [&self.detection, &self.recognition, &self.charset] {
            if !path.is_file() {
                bail!("OCR model file missing: {}", path.display());
            }
        }
        Ok(())
    }
}

pub struct Ocr {
    engine: ocr_rs::OcrEngine,
}

impl Ocr {
    /// Initialize the OCR engine. Missing or invalid models are an error the
    /// caller must treat as fatal: nothing can be read without them.
    pub fn try_new(models: &OcrModels) -> Result<Self> {
        models.check()?;

        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            &models.detection,
            &models.recognition,
            &models.charset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count,
                // Mission cards use a small condensed font; High precision
                // is worth the CPU cost.
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                min_result_confidence: 0.5,
                ..Default::default()
            }),
        )
        .context("failed to initialize OCR engine")?;

        tracing::info!(detection = %models.detection.display(), "OCR engine ready");
        Ok(Self { engine })
    }

    /// Recognize text from an RGB image view. Engine errors read as no text.
    pub fn get_text(&self, image: crate::Image) -> String {
        let image = ocr_rs::preprocess::rgb_to_image(&image.get_bytes(), image.width(), image.height());

        match self.engine.recognize(&image) {
            Ok(results) => results
                .into_iter()
                .map(|v| v.text)
                .collect::<Vec<_>>()
                .join(" "),
            Err(err) => {
                tracing::debug!(error = %err, "OCR recognize failed");
                String::new()
            }
        }
    }
}
