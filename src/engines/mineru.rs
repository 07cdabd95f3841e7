//! MinerU: a structured PDF-parsing pipeline.

use std::sync::Arc;

use super::{
    Adapter, ExtractionResult, PageRange,
    fallback::{FallbackChain, OcrAugment},
    pipeline::ModelPipeline,
};
use crate::{ocr::OcrEngine, pdf::Document, prelude::*};

/// The MinerU engine. Without its pipeline, it uses the PDF's own text and
/// blocks as-is.
pub struct MinerUAdapter {
    chain: FallbackChain,
}

impl MinerUAdapter {
    pub const NAME: &'static str = "mineru";

    pub fn new(
        pipeline: Option<Arc<dyn ModelPipeline>>,
        ocr: Arc<dyn OcrEngine>,
        ocr_dpi: u32,
    ) -> Self {
        Self {
            chain: FallbackChain::new("MinerU", pipeline, ocr, OcrAugment::Never, ocr_dpi),
        }
    }
}

#[async_trait]
impl Adapter for MinerUAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn extract(&self, doc: &Document, range: Option<PageRange>) -> ExtractionResult {
        self.chain.extract(doc, range).await
    }
}
