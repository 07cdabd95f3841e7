//! Docling: a document-conversion pipeline.

use std::sync::Arc;

use super::{
    Adapter, ExtractionResult, PageRange,
    fallback::{FallbackChain, OcrAugment},
    pipeline::ModelPipeline,
};
use crate::{ocr::OcrEngine, pdf::Document, prelude::*};

/// The Docling engine. Without its pipeline, it reads the PDF's own text and
/// overlays OCR on every page, so text inside images is picked up too.
pub struct DoclingAdapter {
    chain: FallbackChain,
}

impl DoclingAdapter {
    pub const NAME: &'static str = "docling";

    pub fn new(
        pipeline: Option<Arc<dyn ModelPipeline>>,
        ocr: Arc<dyn OcrEngine>,
        ocr_dpi: u32,
    ) -> Self {
        Self {
            chain: FallbackChain::new("Docling", pipeline, ocr, OcrAugment::Always, ocr_dpi),
        }
    }
}

#[async_trait]
impl Adapter for DoclingAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn extract(&self, doc: &Document, range: Option<PageRange>) -> ExtractionResult {
        self.chain.extract(doc, range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engines::Tier,
        geometry::Rect,
        test_support::{FakeOcr, FakePage, fake_document},
    };

    #[tokio::test]
    async fn every_page_is_ocred() {
        let doc = fake_document(vec![FakePage::text(
            "typed",
            vec![Rect::new(0.0, 0.0, 10.0, 10.0)],
        )])
        .await;
        let adapter = DoclingAdapter::new(None, FakeOcr::words(&["figure", "label"]), 144);
        let result = adapter.extract(&doc, None).await;
        assert_eq!(result.tier, Tier::NativeText);
        assert_eq!(
            result.markdown,
            "# Page 1 (Docling, native text)\n\ntyped\n\n[OCR]\n\nfigure label"
        );
        assert_eq!(result.block_count(), 3);
        assert_eq!(result.ocr_box_count(), 2);
    }
}
