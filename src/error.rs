//! Errors we report to callers.
//!
//! Everything else (missing engines, failed external commands, malformed model
//! output) is absorbed by fallback tiers and only shows up as degraded output.

use thiserror::Error;

/// A caller-visible failure of an extraction request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The upload contained no bytes.
    #[error("empty file")]
    EmptyInput,

    /// The upload is not a PDF, or the PDF engine could not parse it.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The upload exceeds the configured size cap.
    #[error("file is {size} bytes, but the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The requested page range is empty after clamping.
    #[error("invalid page range {start}..={end} (document has {page_count} pages)")]
    InvalidRange {
        start: usize,
        end: usize,
        page_count: usize,
    },

    /// The client has used up its request window.
    #[error("rate limit exceeded for client {client:?}")]
    RateLimited { client: String },

    /// A page index was used outside the document. Range resolution should
    /// make this unreachable from the outside.
    #[error("page index {index} out of range (document has {page_count} pages)")]
    IndexOutOfRange { index: usize, page_count: usize },
}
