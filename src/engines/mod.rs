//! Extraction engines ("adapters").
//!
//! Every engine answers the same [`Adapter`] contract, and every engine falls
//! back through the same tiers when its preferred strategy is unavailable. See
//! [`fallback`] for the shared machinery.

use std::{fmt, ops::Range};

use clap::Args;
use schemars::JsonSchema;

use crate::{
    error::ExtractError,
    geometry::{BlockSource, BlocksByPage},
    ocr::OcrChoice,
    pdf::{BackendChoice, Document},
    prelude::*,
};

pub mod docling;
pub mod fallback;
pub mod mineru;
pub mod pipeline;
pub mod registry;
pub mod surya;

/// Engines a caller may select, in default order.
pub const KNOWN_ENGINES: &[&str] = &["surya", "docling", "mineru"];

/// The engine used for names we don't recognize.
pub const DEFAULT_ENGINE: &str = "surya";

/// Which strategy produced an [`ExtractionResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// The engine's own model pipeline.
    Preferred,
    /// Embedded PDF text and block geometry, optionally with OCR.
    NativeText,
    /// Nothing could read the PDF. Diagnostic text and no blocks.
    Placeholder,
}

impl Tier {
    /// The next weaker tier.
    pub fn next(self) -> Self {
        match self {
            Tier::Preferred => Tier::NativeText,
            Tier::NativeText | Tier::Placeholder => Tier::Placeholder,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Preferred => write!(f, "model"),
            Tier::NativeText => write!(f, "native text"),
            Tier::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// The output of one engine over one document.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    /// Markdown for all processed pages, separated by blank lines.
    pub markdown: String,
    /// Blocks in point space, with an entry (possibly empty) for every
    /// processed page.
    pub blocks: BlocksByPage,
    /// The tier that produced this result.
    pub tier: Tier,
}

impl ExtractionResult {
    /// Total number of blocks across all pages.
    pub fn block_count(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Number of blocks that came from OCR.
    pub fn ocr_box_count(&self) -> usize {
        self.blocks
            .values()
            .flatten()
            .filter(|b| b.source == BlockSource::Ocr)
            .count()
    }
}

/// An inclusive range of 1-based page numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    pub first: usize,
    pub last: usize,
}

impl PageRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// Every page of a document.
    pub fn all(page_count: usize) -> Self {
        Self::new(1, page_count)
    }

    /// Resolve caller-supplied bounds against a document. `start` is clamped
    /// up to 1 and `end` down to `page_count`; anything left empty is an
    /// error.
    pub fn resolve(
        start: Option<usize>,
        end: Option<usize>,
        page_count: usize,
    ) -> Result<Self, ExtractError> {
        let first = start.unwrap_or(1).max(1);
        let last = end.unwrap_or(page_count).min(page_count);
        if first > last {
            return Err(ExtractError::InvalidRange {
                start: first,
                end: last,
                page_count,
            });
        }
        Ok(Self { first, last })
    }

    /// The 0-based page indices covered by this range, clamped to the
    /// document. Empty if nothing is left after clamping.
    pub fn indices(self, page_count: usize) -> Range<usize> {
        let end = self.last.min(page_count);
        let start = (self.first.max(1) - 1).min(end);
        start..end
    }
}

/// An interchangeable extraction strategy.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// The engine name callers use to select this adapter.
    fn name(&self) -> &'static str;

    /// Extract text and layout blocks from `doc`, limited to `range` if
    /// given. This never fails: internal errors degrade to weaker tiers.
    async fn extract(&self, doc: &Document, range: Option<PageRange>) -> ExtractionResult;
}

/// Options controlling the PDF backend, OCR and model pipelines.
#[derive(Args, Clone, Debug)]
pub struct EngineOpts {
    /// Which native PDF backend to use. `none` produces synthetic
    /// placeholder documents.
    #[clap(long, value_enum, default_value_t)]
    pub pdf_backend: BackendChoice,

    /// Which OCR engine to use when augmenting native text.
    #[clap(long, value_enum, default_value_t)]
    pub ocr: OcrChoice,

    /// Resolution for annotated page images.
    #[clap(long, default_value_t = 144)]
    pub dpi: u32,

    /// Resolution for images passed to OCR.
    #[clap(long, default_value_t = 144)]
    pub ocr_dpi: u32,

    /// Model pipeline command for the `surya` engine.
    #[clap(long, env = "SURYA_COMMAND")]
    pub surya_command: Option<String>,

    /// Model pipeline command for the `docling` engine.
    #[clap(long, env = "DOCLING_COMMAND")]
    pub docling_command: Option<String>,

    /// Model pipeline command for the `mineru` engine.
    #[clap(long, env = "MINERU_COMMAND")]
    pub mineru_command: Option<String>,
}

impl Default for EngineOpts {
    /// Automatic backends at 144 DPI, with no model pipelines.
    fn default() -> Self {
        Self {
            pdf_backend: BackendChoice::default(),
            ocr: OcrChoice::default(),
            dpi: 144,
            ocr_dpi: 144,
            surya_command: None,
            docling_command: None,
            mineru_command: None,
        }
    }
}

impl EngineOpts {
    /// The configured pipeline command for `engine`, if any.
    pub fn pipeline_command(&self, engine: &str) -> Option<&str> {
        let command = match engine {
            "surya" => self.surya_command.as_deref(),
            "docling" => self.docling_command.as_deref(),
            "mineru" => self.mineru_command.as_deref(),
            _ => None,
        };
        command.filter(|c| !c.trim().is_empty())
    }
}

/// Parse a comma-separated engine list. Names are trimmed and lower-cased,
/// blanks are skipped, and repeats are dropped. An empty list selects every
/// known engine.
pub fn parse_engine_names(list: &str) -> Vec<String> {
    let mut names: Vec<String> = vec![];
    for name in list.split(',') {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        names = KNOWN_ENGINES.iter().map(|&n| n.to_owned()).collect();
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Block, Rect};

    #[test]
    fn ranges_are_clamped() {
        assert_eq!(PageRange::resolve(None, None, 3).unwrap(), PageRange::new(1, 3));
        assert_eq!(
            PageRange::resolve(Some(0), Some(10), 3).unwrap(),
            PageRange::new(1, 3)
        );
        assert_eq!(
            PageRange::resolve(Some(2), Some(3), 3).unwrap(),
            PageRange::new(2, 3)
        );
    }

    #[test]
    fn inverted_ranges_are_errors() {
        assert_eq!(
            PageRange::resolve(Some(3), Some(2), 5).unwrap_err(),
            ExtractError::InvalidRange {
                start: 3,
                end: 2,
                page_count: 5
            }
        );
        // Start past the end of the document.
        assert!(PageRange::resolve(Some(7), None, 5).is_err());
    }

    #[test]
    fn valid_ranges_cover_the_right_number_of_pages() {
        for page_count in 1..6 {
            for s in 1..=page_count {
                for e in s..=page_count {
                    let range = PageRange::resolve(Some(s), Some(e), page_count).unwrap();
                    assert_eq!(range.indices(page_count).len(), e - s + 1);
                }
            }
        }
    }

    #[test]
    fn adapter_indices_clamp_leniently() {
        assert_eq!(PageRange::new(2, 9).indices(3), 1..3);
        assert_eq!(PageRange::new(0, 1).indices(3), 0..1);
        assert!(PageRange::new(5, 9).indices(3).is_empty());
        assert!(PageRange::new(3, 2).indices(3).is_empty());
    }

    #[test]
    fn engine_names_are_normalized() {
        assert_eq!(parse_engine_names(" Docling, ,SURYA,docling"), vec!["docling", "surya"]);
        assert_eq!(parse_engine_names(""), vec!["surya", "docling", "mineru"]);
        assert_eq!(parse_engine_names(" , "), vec!["surya", "docling", "mineru"]);
    }

    #[test]
    fn tiers_degrade_in_order() {
        assert_eq!(Tier::Preferred.next(), Tier::NativeText);
        assert_eq!(Tier::NativeText.next(), Tier::Placeholder);
        assert_eq!(Tier::Placeholder.next(), Tier::Placeholder);
    }

    #[test]
    fn counts_split_out_ocr_boxes() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        let mut blocks = BlocksByPage::new();
        blocks.insert(0, vec![Block::layout(rect), Block::ocr(rect)]);
        blocks.insert(1, vec![Block::ocr(rect)]);
        let result = ExtractionResult {
            markdown: String::new(),
            blocks,
            tier: Tier::NativeText,
        };
        assert_eq!(result.block_count(), 3);
        assert_eq!(result.ocr_box_count(), 2);
    }

    #[test]
    fn pipeline_commands_are_looked_up_by_engine() {
        let opts = EngineOpts {
            docling_command: Some("docling-bridge".to_owned()),
            mineru_command: Some("  ".to_owned()),
            ..EngineOpts::default()
        };
        assert_eq!(opts.pipeline_command("docling"), Some("docling-bridge"));
        assert_eq!(opts.pipeline_command("mineru"), None);
        assert_eq!(opts.pipeline_command("surya"), None);
    }
}
