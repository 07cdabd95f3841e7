//! Rasterizing pages to images.

use std::sync::LazyLock;

use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use super::Document;
use crate::{error::ExtractError, prelude::*};

/// Size of the placeholder image, roughly A4 at 96 DPI.
pub const PLACEHOLDER_SIZE: (u32, u32) = (800, 1131);

const PLACEHOLDER_BACKGROUND: Rgb<u8> = Rgb([245, 245, 245]);
const PLACEHOLDER_INK: Rgb<u8> = Rgb([120, 120, 120]);

/// Caption used when there is no PDF backend at all.
const NO_BACKEND_CAPTION: &str = "No PDF backend available. Using placeholder.";

/// Font for placeholder captions.
static CAPTION_FONT: LazyLock<Option<FontRef<'static>>> = LazyLock::new(|| {
    FontRef::try_from_slice(include_bytes!("../../assets/DejaVuSans.ttf")).ok()
});

/// Render page `page_idx` of `doc` at `dpi` (so one point becomes `dpi / 72`
/// pixels).
///
/// The result is RGB unless the renderer produced an alpha channel. This never
/// fails for a valid page: if there is no backend, or the backend fails, we
/// return a captioned placeholder instead.
#[instrument(level = "debug", skip(doc))]
pub async fn render_page(
    doc: &Document,
    page_idx: usize,
    dpi: u32,
) -> Result<DynamicImage, ExtractError> {
    doc.page(page_idx)?;
    let Some(backend) = doc.backend() else {
        return Ok(placeholder_image(NO_BACKEND_CAPTION));
    };
    match backend.render_page(page_idx, dpi).await {
        Ok(image) => Ok(normalize_mode(image)),
        Err(err) => {
            warn!(page_idx, backend = backend.name(), "Render failed: {:#}", err);
            Ok(placeholder_image(&format!(
                "Could not render page {}. Using placeholder.",
                page_idx + 1
            )))
        }
    }
}

/// A blank page with a visible diagnostic caption.
pub fn placeholder_image(caption: &str) -> DynamicImage {
    let (width, height) = PLACEHOLDER_SIZE;
    let mut image = RgbImage::from_pixel(width, height, PLACEHOLDER_BACKGROUND);
    if let Some(font) = CAPTION_FONT.as_ref() {
        draw_text_mut(
            &mut image,
            PLACEHOLDER_INK,
            20,
            20,
            PxScale::from(18.0),
            font,
            caption,
        );
    }
    DynamicImage::ImageRgb8(image)
}

/// Convert to 8-bit RGB, or 8-bit RGBA if there is an alpha channel.
fn normalize_mode(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.into_rgb8())
    }
}
