//! Loading PDFs into page-addressable documents.
//!
//! The real work is done by a [`PdfEngine`], currently poppler's command-line
//! tools. When no engine is available we still produce a [`Document`], made of
//! synthetic A4 pages, so the rest of the pipeline keeps working (in degraded
//! form) on machines without poppler.

use std::{fmt, sync::Arc};

use clap::ValueEnum;
use image::DynamicImage;

use crate::{
    error::ExtractError,
    geometry::{Extent, Rect},
    health::ComponentStatus,
    prelude::*,
};

pub mod poppler;
pub mod raster;

/// Bytes per page assumed when estimating the page count of a synthetic
/// document.
const SYNTHETIC_BYTES_PER_PAGE: usize = 150_000;

/// Synthetic documents never have more pages than this.
const SYNTHETIC_MAX_PAGES: usize = 5;

/// Opens PDF bytes.
#[async_trait]
pub trait PdfEngine: Send + Sync + 'static {
    /// A short name for health reports.
    fn name(&self) -> &'static str;

    /// Parse `bytes`. Errors mean the engine rejected the file outright.
    async fn open(&self, bytes: &[u8]) -> Result<OpenedPdf>;
}

/// A PDF that a [`PdfEngine`] has accepted.
pub struct OpenedPdf {
    /// The size of each page, in points.
    pub page_sizes: Vec<Extent>,
    /// Page-level access to the parsed document.
    pub backend: Arc<dyn PdfBackend>,
}

/// Page-level operations on an opened PDF. Page indices are 0-based and have
/// already been bounds-checked by [`Document`].
#[async_trait]
pub trait PdfBackend: Send + Sync + 'static {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// A file containing the original PDF, for external tools that want a
    /// path.
    fn source_path(&self) -> Option<&Path>;

    /// The embedded text of a page.
    async fn page_text(&self, page_idx: usize) -> Result<String>;

    /// The native text-block geometry of a page, in points.
    async fn page_blocks(&self, page_idx: usize) -> Result<Vec<Rect>>;

    /// Rasterize a page at `dpi`.
    async fn render_page(&self, page_idx: usize, dpi: u32) -> Result<DynamicImage>;
}

/// A single page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    size: Extent,
}

impl Page {
    /// Page width, in points.
    pub fn width_pt(&self) -> f32 {
        self.size.width
    }

    /// Page height, in points.
    pub fn height_pt(&self) -> f32 {
        self.size.height
    }

    /// Page size, in points.
    pub fn size(&self) -> Extent {
        Extent::new(self.width_pt(), self.height_pt())
    }
}

/// A loaded document. Read-only once constructed, and safe to share between
/// concurrently running engines.
pub struct Document {
    pages: Vec<Page>,
    backend: Option<Arc<dyn PdfBackend>>,
}

impl Document {
    /// Wrap a PDF opened by a real engine.
    pub fn from_opened(opened: OpenedPdf) -> Self {
        Self {
            pages: opened
                .page_sizes
                .into_iter()
                .map(|size| Page { size })
                .collect(),
            backend: Some(opened.backend),
        }
    }

    /// Build a placeholder document for `byte_len` bytes of PDF that we
    /// cannot actually parse.
    pub fn synthetic(byte_len: usize) -> Self {
        let page_count = (byte_len / SYNTHETIC_BYTES_PER_PAGE + 1).min(SYNTHETIC_MAX_PAGES);
        Self {
            pages: vec![Page { size: Extent::A4 }; page_count],
            backend: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a page, checking bounds.
    pub fn page(&self, page_idx: usize) -> Result<&Page, ExtractError> {
        self.pages
            .get(page_idx)
            .ok_or(ExtractError::IndexOutOfRange {
                index: page_idx,
                page_count: self.pages.len(),
            })
    }

    /// The native backend, if this is a real PDF.
    pub fn backend(&self) -> Option<&Arc<dyn PdfBackend>> {
        self.backend.as_ref()
    }

    /// Was this document parsed by a real PDF engine?
    pub fn is_native(&self) -> bool {
        self.backend.is_some()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("pages", &self.pages)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

/// Which PDF backend to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// Use poppler if it is installed.
    #[default]
    Auto,
    /// Require poppler.
    Poppler,
    /// Never parse PDFs; always use synthetic placeholder documents.
    #[value(name = "none")]
    Disabled,
}

/// Turns uploaded bytes into [`Document`]s.
pub struct DocumentLoader {
    engine: Option<Arc<dyn PdfEngine>>,
    status: ComponentStatus,
}

impl DocumentLoader {
    /// Create a loader around an engine.
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        let status = ComponentStatus::active(engine.name());
        Self {
            engine: Some(engine),
            status,
        }
    }

    /// Create a loader that only produces synthetic documents.
    pub fn synthetic(reason: impl Into<String>) -> Self {
        Self {
            engine: None,
            status: ComponentStatus::inactive(reason),
        }
    }

    /// Pick a backend, probing for installed tools if needed.
    #[instrument(level = "debug")]
    pub async fn from_choice(choice: BackendChoice) -> Result<Self> {
        match choice {
            BackendChoice::Disabled => Ok(Self::synthetic("PDF backend disabled by configuration")),
            BackendChoice::Poppler => {
                if poppler::PopplerEngine::is_available().await {
                    Ok(Self::new(Arc::new(poppler::PopplerEngine)))
                } else {
                    Err(anyhow!("--pdf-backend=poppler requires pdfinfo, pdftotext and pdftocairo"))
                }
            }
            BackendChoice::Auto => {
                if poppler::PopplerEngine::is_available().await {
                    Ok(Self::new(Arc::new(poppler::PopplerEngine)))
                } else {
                    warn!("poppler-utils not found; using placeholder documents");
                    Ok(Self::synthetic("poppler-utils (pdfinfo) not found on PATH"))
                }
            }
        }
    }

    /// Is a real PDF engine active, and if not, why not?
    pub fn status(&self) -> &ComponentStatus {
        &self.status
    }

    /// Load a document from `bytes`.
    #[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    pub async fn load(&self, bytes: &[u8]) -> Result<Document, ExtractError> {
        if bytes.is_empty() {
            return Err(ExtractError::EmptyInput);
        }
        let Some(engine) = &self.engine else {
            let doc = Document::synthetic(bytes.len());
            debug!(pages = doc.page_count(), "Built synthetic document");
            return Ok(doc);
        };
        match engine.open(bytes).await {
            Ok(opened) => {
                let doc = Document::from_opened(opened);
                debug!(pages = doc.page_count(), engine = engine.name(), "Opened PDF");
                Ok(doc)
            }
            Err(err) => {
                warn!(engine = engine.name(), "PDF rejected: {:#}", err);
                Err(ExtractError::UnsupportedFormat(format!("{:#}", err)))
            }
        }
    }
}
