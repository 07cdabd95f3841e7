//! Surya: layout detection plus OCR models.

use std::sync::Arc;

use super::{
    Adapter, ExtractionResult, PageRange,
    fallback::{FallbackChain, OcrAugment},
    pipeline::ModelPipeline,
};
use crate::{ocr::OcrEngine, pdf::Document, prelude::*};

/// The Surya engine. Without its models, it reads the PDF's own text and
/// OCRs pages that have none.
pub struct SuryaAdapter {
    chain: FallbackChain,
}

impl SuryaAdapter {
    pub const NAME: &'static str = "surya";

    pub fn new(
        pipeline: Option<Arc<dyn ModelPipeline>>,
        ocr: Arc<dyn OcrEngine>,
        ocr_dpi: u32,
    ) -> Self {
        Self {
            chain: FallbackChain::new(
                "Surya",
                pipeline,
                ocr,
                OcrAugment::WhenTextEmpty,
                ocr_dpi,
            ),
        }
    }
}

#[async_trait]
impl Adapter for SuryaAdapter {
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
        test_support::{FakeOcr, FakePage, FakePipeline, fake_document},
    };

    #[tokio::test]
    async fn scanned_pages_are_ocred() {
        let doc = fake_document(vec![
            FakePage::text("typed", vec![]),
            FakePage::text("   ", vec![]),
        ])
        .await;
        let adapter = SuryaAdapter::new(None, FakeOcr::words(&["scanned"]), 144);
        let result = adapter.extract(&doc, None).await;
        assert_eq!(result.tier, Tier::NativeText);
        assert_eq!(result.blocks[&0].len(), 0);
        assert_eq!(result.blocks[&1].len(), 1);
        assert!(result.markdown.contains("# Page 2 (Surya, native text)"));
    }

    #[tokio::test]
    async fn ranges_limit_the_pages_processed() {
        let doc = fake_document(vec![
            FakePage::text("1", vec![]),
            FakePage::text("2", vec![]),
            FakePage::text("3", vec![]),
        ])
        .await;
        let adapter = SuryaAdapter::new(Some(FakePipeline::working()), FakeOcr::words(&[]), 144);
        let result = adapter.extract(&doc, Some(PageRange::new(2, 99))).await;
        assert_eq!(result.tier, Tier::Preferred);
        assert_eq!(result.blocks.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(result.markdown.starts_with("# Page 2 (Surya, model)\n\nmodel text 2"));
    }

    #[tokio::test]
    async fn ranges_past_the_end_are_empty() {
        let doc = fake_document(vec![FakePage::text("1", vec![])]).await;
        let adapter = SuryaAdapter::new(None, FakeOcr::words(&[]), 144);
        let result = adapter.extract(&doc, Some(PageRange::new(4, 5))).await;
        assert!(result.blocks.is_empty());
        assert_eq!(result.markdown, "");
    }
}
