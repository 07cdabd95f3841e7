//! Drawing detected blocks onto rendered pages.

use image::{DynamicImage, Rgb, Rgba};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect as PixelRect};

use crate::geometry::{Block, Extent, Rect, reconcile};

/// Outline colour for block rectangles.
pub const OUTLINE_COLOR: [u8; 3] = [220, 38, 38];

/// Outline thickness, in pixels.
pub const STROKE_WIDTH: u32 = 2;

/// Draw `blocks` (in point space, on a page of size `page`) as rectangle
/// outlines over a copy of `image`.
///
/// RGBA images stay RGBA. Everything else comes back as RGB.
pub fn annotate(image: &DynamicImage, blocks: &[Block], page: Extent) -> DynamicImage {
    let target = Extent::of_image(image);
    let rects = blocks.iter().map(|b| reconcile(b.rect, page, target));
    let [r, g, b] = OUTLINE_COLOR;
    if image.color().has_alpha() {
        let mut canvas = image.to_rgba8();
        draw_outlines(&mut canvas, rects, Rgba([r, g, b, 255]));
        DynamicImage::ImageRgba8(canvas)
    } else {
        let mut canvas = image.to_rgb8();
        draw_outlines(&mut canvas, rects, Rgb([r, g, b]));
        DynamicImage::ImageRgb8(canvas)
    }
}

/// Draw each pixel-space rectangle as a [`STROKE_WIDTH`]-thick outline.
fn draw_outlines<C: imageproc::drawing::Canvas>(
    canvas: &mut C,
    rects: impl Iterator<Item = Rect>,
    color: C::Pixel,
) {
    let (width, height) = canvas.dimensions();
    for rect in rects {
        let rect = rect.normalized();
        // Keep wildly out-of-bounds coordinates from turning into very long
        // line segments; everything outside the canvas is clipped anyway.
        let clamp_x = |v: f32| v.clamp(-1.0, width as f32 + 1.0);
        let clamp_y = |v: f32| v.clamp(-1.0, height as f32 + 1.0);
        let x0 = clamp_x(rect.x0).floor() as i64;
        let y0 = clamp_y(rect.y0).floor() as i64;
        let x1 = clamp_x(rect.x1).ceil() as i64;
        let y1 = clamp_y(rect.y1).ceil() as i64;
        for inset in 0..i64::from(STROKE_WIDTH) {
            // Degenerate rectangles still get a 1px outline.
            let w = (x1 - x0 - 2 * inset).max(1) as u32;
            let h = (y1 - y0 - 2 * inset).max(1) as u32;
            let outline = PixelRect::at((x0 + inset) as i32, (y0 + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, outline, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView as _, RgbImage, RgbaImage};

    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb(OUTLINE_COLOR);

    fn white_page(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, WHITE))
    }

    #[test]
    fn annotate_does_not_touch_input() {
        let image = white_page(200, 200);
        let before = image.clone();
        let blocks = [Block::layout(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let out = annotate(&image, &blocks, Extent::new(200.0, 200.0));
        assert_eq!(image, before);
        assert_ne!(out, before);
    }

    #[test]
    fn annotate_scales_points_to_pixels() {
        // 100x100pt page rendered at 2x.
        let image = white_page(200, 200);
        let blocks = [Block::layout(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let out = annotate(&image, &blocks, Extent::new(100.0, 100.0)).to_rgb8();
        assert_eq!(*out.get_pixel(20, 20), RED);
        assert_eq!(*out.get_pixel(21, 60), RED);
        assert_eq!(*out.get_pixel(99, 99), RED);
        // Interior and far outside stay white.
        assert_eq!(*out.get_pixel(60, 60), WHITE);
        assert_eq!(*out.get_pixel(150, 150), WHITE);
        assert_eq!(*out.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn annotate_draws_degenerate_rects() {
        let image = white_page(100, 100);
        let blocks = [
            Block::layout(Rect::new(30.0, 30.0, 30.0, 30.0)),
            Block::ocr(Rect::new(80.0, 70.0, 60.0, 50.0)),
        ];
        let out = annotate(&image, &blocks, Extent::new(100.0, 100.0)).to_rgb8();
        assert_eq!(*out.get_pixel(30, 30), RED);
        assert_eq!(*out.get_pixel(60, 50), RED);
    }

    #[test]
    fn annotate_keeps_alpha_channel() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            40,
            40,
            Rgba([0, 0, 0, 0]),
        ));
        let blocks = [Block::layout(Rect::new(5.0, 5.0, 20.0, 20.0))];
        let out = annotate(&image, &blocks, Extent::new(40.0, 40.0));
        assert!(out.color().has_alpha());
        assert_eq!(out.get_pixel(5, 5), Rgba([220, 38, 38, 255]));
    }

    #[test]
    fn annotate_tolerates_huge_coordinates() {
        let image = white_page(50, 50);
        let blocks = [Block::layout(Rect::new(-1e9, -1e9, 1e9, 1e9))];
        let out = annotate(&image, &blocks, Extent::new(50.0, 50.0));
        assert_eq!(out.dimensions(), (50, 50));
    }
}
