//! OCR engine wrapping the `tesseract` CLI tool.

use csv::{ReaderBuilder, StringRecord};
use image::{DynamicImage, ImageFormat};
use tokio::process::Command;

use super::{OcrEngine, OcrText};
use crate::{
    async_utils::{command_is_available, run_command, spawn_blocking_propagating_panics},
    geometry::Rect,
    prelude::*,
};

/// OCR engine wrapping the `tesseract` CLI tool.
#[non_exhaustive]
pub struct TesseractOcrEngine;

impl TesseractOcrEngine {
    /// Is `tesseract` on our `PATH`?
    pub async fn is_available() -> bool {
        command_is_available("tesseract", "--version").await
    }

    /// Run tesseract and return its raw TSV output.
    async fn run_tsv(&self, image: &DynamicImage) -> Result<String> {
        let image = image.clone();
        let png = spawn_blocking_propagating_panics(move || -> Result<Vec<u8>> {
            let mut png = Vec::new();
            image
                .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
                .context("cannot encode tesseract input")?;
            Ok(png)
        })
        .await?;

        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("input.png");
        tokio::fs::write(&input_path, png)
            .await
            .context("cannot write tesseract input file")?;

        let output = run_command(
            "tesseract",
            Command::new("tesseract")
                .arg(&input_path)
                .arg("stdout")
                .arg("tsv"),
        )
        .await?;
        String::from_utf8(output.stdout).context("tesseract output was not valid UTF-8")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &DynamicImage) -> OcrText {
        let result = async { parse_tsv(&self.run_tsv(image).await?) }.await;
        match result {
            Ok(text) => {
                debug!(words = text.boxes.len(), "Recognized text");
                text
            }
            Err(err) => {
                warn!("tesseract failed: {:#}", err);
                OcrText::default()
            }
        }
    }
}

/// Parse tesseract's TSV output into words and pixel boxes.
///
/// Rows without a usable confidence (structural rows use `-1`) and rows with
/// blank text are dropped.
fn parse_tsv(tsv: &str) -> Result<OcrText> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(tsv.as_bytes());
    let headers = rdr.headers().context("missing tesseract TSV header")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("tesseract TSV has no {:?} column", name))
    };
    let cols = TsvColumns {
        left: column("left")?,
        top: column("top")?,
        width: column("width")?,
        height: column("height")?,
        conf: column("conf")?,
        text: column("text")?,
    };

    let mut words = Vec::new();
    let mut boxes = Vec::new();
    for record in rdr.records() {
        let record = record.context("cannot read tesseract TSV row")?;
        if let Some((word, rect)) = cols.word(&record) {
            words.push(word);
            boxes.push(rect);
        }
    }
    Ok(OcrText {
        text: words.join(" "),
        boxes,
    })
}

/// Column positions in tesseract's TSV.
struct TsvColumns {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    conf: usize,
    text: usize,
}

impl TsvColumns {
    /// Extract a confident, non-blank word from a row.
    fn word(&self, record: &StringRecord) -> Option<(String, Rect)> {
        let conf = record
            .get(self.conf)
            .and_then(|c| c.trim().parse::<f32>().ok())
            .unwrap_or(-1.0);
        if conf < 0.0 {
            return None;
        }
        let text = record.get(self.text)?.trim();
        if text.is_empty() {
            return None;
        }
        let num = |i: usize| record.get(i).and_then(|v| v.trim().parse::<f32>().ok());
        let (x, y) = (num(self.left)?, num(self.top)?);
        let (w, h) = (num(self.width)?, num(self.height)?);
        Some((text.to_owned(), Rect::new(x, y, x + w, y + h)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1224\t1584\t-1\t
2\t1\t1\t0\t0\t0\t100\t80\t400\t40\t-1\t
5\t1\t1\t1\t1\t1\t100\t80\t120\t40\t96.5\tHello
5\t1\t1\t1\t1\t2\t230\t80\t150\t40\t91.0\tworld
5\t1\t1\t1\t1\t3\t390\t80\t20\t40\t95\t 
5\t1\t1\t1\t1\t4\t420\t80\t20\t40\tnan?\tjunk
5\t1\t1\t1\t1\t5\t450\t80\t60\t40\t0\tagain
";

    #[test]
    fn tsv_words_match_boxes() -> Result<()> {
        let out = parse_tsv(TSV)?;
        assert_eq!(out.text, "Hello world again");
        assert_eq!(
            out.boxes,
            vec![
                Rect::new(100.0, 80.0, 220.0, 120.0),
                Rect::new(230.0, 80.0, 380.0, 120.0),
                Rect::new(450.0, 80.0, 510.0, 120.0),
            ]
        );
        assert_eq!(out.text.split_whitespace().count(), out.boxes.len());
        Ok(())
    }

    #[test]
    fn empty_tsv_has_no_words() -> Result<()> {
        let out = parse_tsv("level\tleft\ttop\twidth\theight\tconf\ttext\n")?;
        assert!(out.boxes.is_empty());
        assert_eq!(out.text, "");
        Ok(())
    }

    #[test]
    fn tsv_without_columns_is_an_error() {
        assert!(parse_tsv("foo\tbar\n1\t2\n").is_err());
    }

    #[tokio::test]
    #[ignore = "Requires tesseract to be installed"]
    async fn blank_image_has_no_words() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            200,
            100,
            image::Rgb([255, 255, 255]),
        ));
        assert!(TesseractOcrEngine.recognize(&image).await.boxes.is_empty());
    }
}
