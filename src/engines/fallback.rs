//! The tiered fallback chain shared by all engines.
//!
//! Each engine tries its model pipeline first, then the PDF's own text and
//! geometry, then a placeholder. A tier either produces output for every
//! requested page or fails as a whole, so one result never mixes tiers. The
//! native-text tier only fails without a backend; unreadable pages get a
//! diagnostic body instead.

use std::{ops::Range, sync::Arc};

use super::{ExtractionResult, PageRange, Tier, pipeline::ModelPipeline};
use crate::{
    geometry::{Block, BlocksByPage, Extent, reconcile},
    ocr::OcrEngine,
    pdf::Document,
    prelude::*,
};

/// Page body used when nothing could read the PDF.
const PLACEHOLDER_TEXT: &str = "_No PDF backend is available, so no text was extracted._";

/// Page body used when the backend could not read one page's text.
const UNREADABLE_TEXT: &str = "_The PDF backend could not read text from this page._";

/// When should the native-text tier run OCR over a page?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OcrAugment {
    Never,
    /// Only for pages with no embedded text, such as scans.
    WhenTextEmpty,
    Always,
}

/// One engine's fallback chain.
pub struct FallbackChain {
    /// Display name used in page headings, such as `Docling`.
    label: &'static str,
    pipeline: Option<Arc<dyn ModelPipeline>>,
    ocr: Arc<dyn OcrEngine>,
    augment: OcrAugment,
    ocr_dpi: u32,
}

/// Output for one page, before headings are added.
struct PageOutput {
    page_idx: usize,
    body: String,
    blocks: Vec<Block>,
}

impl FallbackChain {
    pub fn new(
        label: &'static str,
        pipeline: Option<Arc<dyn ModelPipeline>>,
        ocr: Arc<dyn OcrEngine>,
        augment: OcrAugment,
        ocr_dpi: u32,
    ) -> Self {
        Self {
            label,
            pipeline,
            ocr,
            augment,
            ocr_dpi,
        }
    }

    /// Run the chain over `range` (1-based, inclusive), or over every page.
    pub async fn extract(&self, doc: &Document, range: Option<PageRange>) -> ExtractionResult {
        let page_count = doc.page_count();
        let pages = range.unwrap_or(PageRange::all(page_count)).indices(page_count);
        self.run(doc, pages).await
    }

    /// Run the chain over the 0-based `pages` of `doc`, stopping at the first
    /// tier that succeeds.
    #[instrument(level = "debug", skip(self, doc), fields(engine = self.label))]
    pub async fn run(&self, doc: &Document, pages: Range<usize>) -> ExtractionResult {
        let mut tier = Tier::Preferred;
        loop {
            let attempt = match tier {
                Tier::Preferred => self.preferred(doc, pages.clone()).await,
                Tier::NativeText => self.native_text(doc, pages.clone()).await,
                Tier::Placeholder => Ok(self.placeholder(pages.clone())),
            };
            match attempt {
                Ok(outputs) => {
                    debug!(engine = self.label, %tier, "Extraction finished");
                    return self.assemble(tier, outputs);
                }
                Err(err) => {
                    warn!(
                        engine = self.label,
                        %tier,
                        "Falling back to {}: {:#}",
                        tier.next(),
                        err
                    );
                    tier = tier.next();
                }
            }
        }
    }

    /// Ask the model pipeline.
    async fn preferred(&self, doc: &Document, pages: Range<usize>) -> Result<Vec<PageOutput>> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| anyhow!("no model pipeline configured"))?;
        let output = pipeline.run(doc, pages.clone()).await?;
        if output.pages.len() != pages.len() {
            return Err(anyhow!(
                "{} returned {} pages, expected {}",
                pipeline.name(),
                output.pages.len(),
                pages.len()
            ));
        }
        Ok(pages
            .zip(output.pages)
            .map(|(page_idx, page)| PageOutput {
                page_idx,
                body: page.markdown,
                blocks: page.blocks.into_iter().map(Block::layout).collect(),
            })
            .collect())
    }

    /// Use the PDF's embedded text and block geometry, plus OCR if wanted.
    async fn native_text(&self, doc: &Document, pages: Range<usize>) -> Result<Vec<PageOutput>> {
        let backend = doc
            .backend()
            .ok_or_else(|| anyhow!("no native PDF backend"))?;
        let mut outputs = Vec::with_capacity(pages.len());
        for page_idx in pages {
            let page = doc.page(page_idx)?;
            let text = match backend.page_text(page_idx).await {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(engine = self.label, page_idx, "Cannot read page text: {:#}", err);
                    None
                }
            };
            let mut blocks = match backend.page_blocks(page_idx).await {
                Ok(rects) => rects.into_iter().map(Block::layout).collect::<Vec<_>>(),
                Err(err) => {
                    warn!(engine = self.label, page_idx, "Cannot read page blocks: {:#}", err);
                    vec![]
                }
            };

            let wants_ocr = match self.augment {
                OcrAugment::Never => false,
                OcrAugment::WhenTextEmpty => {
                    text.as_deref().is_none_or(|text| text.trim().is_empty())
                }
                OcrAugment::Always => true,
            };
            let mut body = text.unwrap_or_else(|| UNREADABLE_TEXT.to_owned());
            if wants_ocr {
                // Render through the backend directly, because OCRing a
                // placeholder image would only find its caption.
                match backend.render_page(page_idx, self.ocr_dpi).await {
                    Ok(image) => {
                        let ocr = self.ocr.recognize(&image).await;
                        if !ocr.text.trim().is_empty() {
                            body.push_str("\n\n[OCR]\n\n");
                            body.push_str(&ocr.text);
                        }
                        let image_extent = Extent::of_image(&image);
                        blocks.extend(
                            ocr.boxes
                                .into_iter()
                                .map(|r| Block::ocr(reconcile(r, image_extent, page.size()))),
                        );
                    }
                    Err(err) => {
                        warn!(engine = self.label, page_idx, "Skipping OCR: {:#}", err);
                    }
                }
            }
            outputs.push(PageOutput {
                page_idx,
                body,
                blocks,
            });
        }
        Ok(outputs)
    }

    /// Diagnostic text and no blocks. Always succeeds.
    fn placeholder(&self, pages: Range<usize>) -> Vec<PageOutput> {
        pages
            .map(|page_idx| PageOutput {
                page_idx,
                body: PLACEHOLDER_TEXT.to_owned(),
                blocks: vec![],
            })
            .collect()
    }

    /// Add a heading to each page and join everything up.
    fn assemble(&self, tier: Tier, outputs: Vec<PageOutput>) -> ExtractionResult {
        let mut parts = Vec::with_capacity(outputs.len());
        let mut blocks = BlocksByPage::new();
        for output in outputs {
            parts.push(format!(
                "# Page {} ({}, {})\n\n{}",
                output.page_idx + 1,
                self.label,
                tier,
                output.body
            ));
            blocks.insert(output.page_idx, output.blocks);
        }
        ExtractionResult {
            markdown: parts.join("\n\n"),
            blocks,
            tier,
        }
    }
}
