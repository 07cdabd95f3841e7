//! OCR engine interface.
//!
//! OCR is an optional helper for native-text extraction: it never fails, and
//! an unavailable engine simply recognizes nothing.

use std::sync::Arc;

use clap::ValueEnum;
use image::DynamicImage;

use crate::{geometry::Rect, health::ComponentStatus, prelude::*};

pub mod tesseract;

/// Text recognized in an image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OcrText {
    /// Recognized words, joined by single spaces.
    pub text: String,
    /// One pixel-space box per word in `text`, in the same order.
    pub boxes: Vec<Rect>,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// A short name for logs and health reports.
    fn name(&self) -> &'static str;

    /// Recognize text in `image`. Returns empty output on any failure.
    async fn recognize(&self, image: &DynamicImage) -> OcrText;
}

/// An OCR engine that never finds anything.
pub struct NoOcrEngine;

#[async_trait]
impl OcrEngine for NoOcrEngine {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn recognize(&self, _image: &DynamicImage) -> OcrText {
        OcrText::default()
    }
}

/// Which OCR engine to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OcrChoice {
    /// Use tesseract if it is installed.
    #[default]
    Auto,
    /// Require tesseract.
    Tesseract,
    /// Never run OCR.
    #[value(name = "none")]
    Disabled,
}

/// Get the OCR engine for `choice`, along with its health status.
#[instrument(level = "debug")]
pub async fn ocr_engine_for_choice(
    choice: OcrChoice,
) -> Result<(Arc<dyn OcrEngine>, ComponentStatus)> {
    let tesseract = || -> (Arc<dyn OcrEngine>, ComponentStatus) {
        (
            Arc::new(tesseract::TesseractOcrEngine),
            ComponentStatus::active("tesseract"),
        )
    };
    match choice {
        OcrChoice::Disabled => Ok((
            Arc::new(NoOcrEngine),
            ComponentStatus::inactive("OCR disabled by configuration"),
        )),
        OcrChoice::Tesseract => {
            if tesseract::TesseractOcrEngine::is_available().await {
                Ok(tesseract())
            } else {
                Err(anyhow!("--ocr=tesseract requires tesseract on PATH"))
            }
        }
        OcrChoice::Auto => {
            if tesseract::TesseractOcrEngine::is_available().await {
                Ok(tesseract())
            } else {
                warn!("tesseract not found; OCR disabled");
                Ok((
                    Arc::new(NoOcrEngine),
                    ComponentStatus::inactive("tesseract not found on PATH"),
                ))
            }
        }
    }
}
