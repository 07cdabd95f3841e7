//! In-process fakes for the external engines, so that every fallback tier can
//! be exercised without poppler, tesseract or a model pipeline installed.

use std::{ops::Range, sync::Arc};

use image::{DynamicImage, Rgb, RgbImage};

use crate::{
    engines::pipeline::{ModelPipeline, PipelineOutput, PipelinePage},
    geometry::{Extent, Rect},
    ocr::{OcrEngine, OcrText},
    pdf::{Document, OpenedPdf, PdfBackend, PdfEngine},
    prelude::*,
};

/// A page served by [`FakePdfEngine`].
#[derive(Clone, Debug)]
pub struct FakePage {
    size: Extent,
    text: String,
    blocks: Vec<Rect>,
    fail_render: bool,
    fail_reads: bool,
}

impl FakePage {
    /// A US Letter page with embedded `text` and native `blocks`.
    pub fn text(text: &str, blocks: Vec<Rect>) -> Self {
        Self {
            size: Extent::new(612.0, 792.0),
            text: text.to_owned(),
            blocks,
            fail_render: false,
            fail_reads: false,
        }
    }

    pub fn with_size(mut self, size: Extent) -> Self {
        self.size = size;
        self
    }

    /// Make rendering this page fail.
    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    /// Make reading this page's text and blocks fail.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }
}

/// A [`PdfEngine`] that accepts any bytes and serves fixed pages.
pub struct FakePdfEngine {
    pages: Option<Vec<FakePage>>,
}

impl FakePdfEngine {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self { pages: Some(pages) }
    }

    /// An engine that rejects every file.
    pub fn rejecting() -> Self {
        Self { pages: None }
    }
}

#[async_trait]
impl PdfEngine for FakePdfEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, _bytes: &[u8]) -> Result<OpenedPdf> {
        let pages = self
            .pages
            .clone()
            .ok_or_else(|| anyhow!("fake engine rejects everything"))?;
        Ok(OpenedPdf {
            page_sizes: pages.iter().map(|p| p.size).collect(),
            backend: Arc::new(FakeBackend { pages }),
        })
    }
}

struct FakeBackend {
    pages: Vec<FakePage>,
}

#[async_trait]
impl PdfBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn source_path(&self) -> Option<&Path> {
        None
    }

    async fn page_text(&self, page_idx: usize) -> Result<String> {
        let page = &self.pages[page_idx];
        if page.fail_reads {
            return Err(anyhow!("fake text failure"));
        }
        Ok(page.text.clone())
    }

    async fn page_blocks(&self, page_idx: usize) -> Result<Vec<Rect>> {
        let page = &self.pages[page_idx];
        if page.fail_reads {
            return Err(anyhow!("fake layout failure"));
        }
        Ok(page.blocks.clone())
    }

    async fn render_page(&self, page_idx: usize, dpi: u32) -> Result<DynamicImage> {
        let page = &self.pages[page_idx];
        if page.fail_render {
            return Err(anyhow!("fake render failure"));
        }
        let scale = dpi as f32 / 72.0;
        let width = (page.size.width * scale).round() as u32;
        let height = (page.size.height * scale).round() as u32;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([255, 255, 255]),
        )))
    }
}

/// Load a native document from fake pages.
pub async fn fake_document(pages: Vec<FakePage>) -> Document {
    let opened = FakePdfEngine::new(pages)
        .open(b"%PDF-1.4")
        .await
        .expect("fake engine accepts everything");
    Document::from_opened(opened)
}

/// A [`ModelPipeline`] that either fails or reports one block per page.
pub struct FakePipeline {
    fail: bool,
}

impl FakePipeline {
    pub fn working() -> Arc<dyn ModelPipeline> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<dyn ModelPipeline> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl ModelPipeline for FakePipeline {
    fn name(&self) -> &str {
        "fake-pipeline"
    }

    async fn run(&self, _doc: &Document, pages: Range<usize>) -> Result<PipelineOutput> {
        if self.fail {
            return Err(anyhow!("fake pipeline failure"));
        }
        Ok(PipelineOutput {
            pages: pages
                .map(|idx| PipelinePage {
                    markdown: format!("model text {}", idx + 1),
                    blocks: vec![Rect::new(10.0, 10.0, 100.0, 50.0)],
                })
                .collect(),
        })
    }
}

/// An [`OcrEngine`] that "recognizes" the same words in every image.
pub struct FakeOcr {
    output: OcrText,
}

impl FakeOcr {
    /// Recognize `words`, each with a 10x10 pixel box in a row along the top.
    pub fn words(words: &[&str]) -> Arc<dyn OcrEngine> {
        let boxes = (0..words.len())
            .map(|i| {
                let x = (i * 20) as f32;
                Rect::new(x, 0.0, x + 10.0, 10.0)
            })
            .collect();
        Arc::new(Self {
            output: OcrText {
                text: words.join(" "),
                boxes,
            },
        })
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn recognize(&self, _image: &DynamicImage) -> OcrText {
        self.output.clone()
    }
}
