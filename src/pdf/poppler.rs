//! A [`PdfEngine`] built on the command-line tools from `poppler-utils`.
//!
//! We write the upload to a temporary file once, then run `pdfinfo`,
//! `pdftotext` and `pdftocairo` against it as pages are needed.

use std::{collections::BTreeMap, sync::Arc, sync::LazyLock};

use image::{DynamicImage, ImageFormat};
use regex::Regex;
use tempfile::TempDir;
use tokio::process::Command;

use super::{OpenedPdf, PdfBackend, PdfEngine};
use crate::{
    async_utils::{command_is_available, run_command, spawn_blocking_propagating_panics},
    geometry::{Extent, Rect},
    prelude::*,
};

/// `pdfinfo` clamps the last page to the page count, so this asks for every
/// page's size.
const ALL_PAGES: &str = "1000000";

/// Per-page size lines from `pdfinfo -f 1 -l N`.
static PAGE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Page\s+(?:(\d+)\s+)?size:\s+([\d.]+)\s+x\s+([\d.]+)\s+pts")
        .expect("failed to compile regex")
});

/// Per-page rotation lines from `pdfinfo -f 1 -l N`.
static PAGE_ROT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Page\s+(?:(\d+)\s+)?rot:\s+(\d+)").expect("failed to compile regex")
});

/// Block elements in `pdftotext -bbox-layout` output.
static BBOX_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<block\s+xMin="(-?[\d.]+)"\s+yMin="(-?[\d.]+)"\s+xMax="(-?[\d.]+)"\s+yMax="(-?[\d.]+)""#,
    )
    .expect("failed to compile regex")
});

/// Opens PDFs using poppler.
pub struct PopplerEngine;

impl PopplerEngine {
    /// Are the poppler tools on our `PATH`?
    pub async fn is_available() -> bool {
        command_is_available("pdfinfo", "-v").await
            && command_is_available("pdftotext", "-v").await
            && command_is_available("pdftocairo", "-v").await
    }
}

#[async_trait]
impl PdfEngine for PopplerEngine {
    fn name(&self) -> &'static str {
        "poppler"
    }

    #[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    async fn open(&self, bytes: &[u8]) -> Result<OpenedPdf> {
        let tmpdir = TempDir::with_prefix("pdf-playground")?;
        let path = tmpdir.path().join("input.pdf");
        tokio::fs::write(&path, bytes)
            .await
            .context("cannot write PDF to temporary file")?;

        let output = run_command(
            "pdfinfo",
            Command::new("pdfinfo")
                .arg("-f")
                .arg("1")
                .arg("-l")
                .arg(ALL_PAGES)
                .arg(&path),
        )
        .await?;
        let info = String::from_utf8(output.stdout).context("pdfinfo output was not valid UTF-8")?;
        let page_sizes = parse_pdfinfo(&info)?;

        Ok(OpenedPdf {
            page_sizes,
            backend: Arc::new(PopplerDocument { tmpdir, path }),
        })
    }
}

/// A PDF on disk, ready for poppler.
struct PopplerDocument {
    /// Holds our copy of the PDF, and scratch space for renders. Deleted on
    /// drop.
    tmpdir: TempDir,
    path: PathBuf,
}

#[async_trait]
impl PdfBackend for PopplerDocument {
    fn name(&self) -> &'static str {
        "poppler"
    }

    fn source_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    #[instrument(level = "debug", skip(self))]
    async fn page_text(&self, page_idx: usize) -> Result<String> {
        let page = (page_idx + 1).to_string();
        let output = run_command(
            "pdftotext",
            Command::new("pdftotext")
                .args(["-layout", "-enc", "UTF-8", "-f", &page, "-l", &page])
                .arg(&self.path)
                .arg("-"),
        )
        .await?;
        let text = String::from_utf8_lossy(&output.stdout);
        // pdftotext ends every page with a form feed.
        Ok(text.trim_end_matches(['\x0C', '\n']).to_owned())
    }

    #[instrument(level = "debug", skip(self))]
    async fn page_blocks(&self, page_idx: usize) -> Result<Vec<Rect>> {
        let page = (page_idx + 1).to_string();
        let output = run_command(
            "pdftotext",
            Command::new("pdftotext")
                .args(["-bbox-layout", "-enc", "UTF-8", "-f", &page, "-l", &page])
                .arg(&self.path)
                .arg("-"),
        )
        .await?;
        Ok(parse_bbox_blocks(&String::from_utf8_lossy(&output.stdout)))
    }

    #[instrument(level = "debug", skip(self))]
    async fn render_page(&self, page_idx: usize, dpi: u32) -> Result<DynamicImage> {
        // Several engines may render the same page at once, so each render
        // gets its own directory.
        let render_dir = TempDir::with_prefix_in("render", self.tmpdir.path())?;
        let out_base = render_dir.path().join("page");
        let page = (page_idx + 1).to_string();
        run_command(
            "pdftocairo",
            Command::new("pdftocairo")
                .args(["-png", "-singlefile", "-r", &dpi.to_string()])
                .args(["-f", &page, "-l", &page])
                .arg(&self.path)
                .arg(&out_base),
        )
        .await?;

        let png_path = out_base.with_extension("png");
        let png = tokio::fs::read(&png_path)
            .await
            .with_context(|| format!("cannot read {:?}", png_path.display()))?;
        spawn_blocking_propagating_panics(move || {
            image::load_from_memory_with_format(&png, ImageFormat::Png)
                .context("cannot decode pdftocairo output")
        })
        .await
    }
}

/// Parse page sizes out of `pdfinfo -f 1 -l N` output.
///
/// Pages rotated by 90 or 270 degrees have their width and height swapped, to
/// match how `pdftocairo` and `pdftotext` see them.
fn parse_pdfinfo(info: &str) -> Result<Vec<Extent>> {
    let mut properties = BTreeMap::new();
    for line in info.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key.to_string(), value.to_string());
    }
    let page_count = properties
        .get("Pages")
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?
        .parse::<usize>()
        .context("failed to parse page count from pdfinfo output")?;

    let page_number = |m: Option<regex::Match<'_>>| -> usize {
        m.and_then(|m| m.as_str().parse::<usize>().ok()).unwrap_or(1)
    };

    let mut sizes = BTreeMap::new();
    for caps in PAGE_SIZE_RE.captures_iter(info) {
        let width = caps[2].parse::<f32>().context("bad page width")?;
        let height = caps[3].parse::<f32>().context("bad page height")?;
        sizes.insert(page_number(caps.get(1)), Extent::new(width, height));
    }
    let mut rotations = BTreeMap::new();
    for caps in PAGE_ROT_RE.captures_iter(info) {
        let rot = caps[2].parse::<u32>().unwrap_or(0);
        rotations.insert(page_number(caps.get(1)), rot);
    }

    let fallback = sizes.values().next().copied().unwrap_or(Extent::A4);
    Ok((1..=page_count)
        .map(|n| {
            let size = sizes.get(&n).copied().unwrap_or(fallback);
            match rotations.get(&n).map(|r| r % 180) {
                Some(90) => Extent::new(size.height, size.width),
                _ => size,
            }
        })
        .collect())
}

/// Pull block rectangles out of `pdftotext -bbox-layout` XHTML.
fn parse_bbox_blocks(xhtml: &str) -> Vec<Rect> {
    BBOX_BLOCK_RE
        .captures_iter(xhtml)
        .filter_map(|caps| {
            let coord = |i: usize| caps[i].parse::<f32>().ok();
            Some(Rect::new(coord(1)?, coord(2)?, coord(3)?, coord(4)?))
        })
        .collect()
}
