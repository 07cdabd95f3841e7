//! Running several engines over one document and assembling the response.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use futures::{StreamExt as _, TryStreamExt as _, stream};
use schemars::JsonSchema;
use serde::Serializer;

use crate::{
    annotate::annotate,
    async_utils::spawn_blocking_propagating_panics,
    data_url::{data_url, png_data_url},
    engines::{ExtractionResult, PageRange, Tier, registry::AdapterRegistry},
    error::ExtractError,
    pdf::{Document, raster},
    prelude::*,
};

/// Confidence reported for every engine when no native PDF backend is
/// active.
pub const DEGRADED_CONFIDENCE: f32 = 0.25;

/// Summary statistics for one engine's output.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct ModelMeta {
    /// Wall-clock time spent in the engine, in milliseconds.
    pub time_ms: u64,
    /// Blocks across all processed pages, OCR boxes included.
    pub block_count: usize,
    /// Blocks that came from OCR.
    pub ocr_box_count: usize,
    /// Characters in `text_markdown`.
    pub char_count: usize,
    /// Whitespace-separated words in `text_markdown`.
    pub word_count: usize,
    /// How far to trust this output, from 0 to 1, when we have reason to
    /// doubt it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Which fallback tier produced the output.
    pub tier: Tier,
}

impl ModelMeta {
    pub fn new(result: &ExtractionResult, elapsed: Duration, confidence: Option<f32>) -> Self {
        Self {
            time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            block_count: result.block_count(),
            ocr_box_count: result.ocr_box_count(),
            char_count: result.markdown.chars().count(),
            word_count: result.markdown.split_whitespace().count(),
            confidence,
            tier: result.tier,
        }
    }
}

/// One engine's contribution to an [`ExtractResponse`].
#[derive(Clone, Debug, JsonSchema, Serialize)]
pub struct ModelOutput {
    /// Markdown for every processed page.
    pub text_markdown: String,
    /// One `data:image/png;base64,...` URL per processed page, with the
    /// engine's blocks outlined.
    pub annotated_images: Vec<String>,
    pub meta: ModelMeta,
}

/// The result of an extraction request.
#[derive(Clone, Debug, JsonSchema, Serialize)]
pub struct ExtractResponse {
    /// Number of pages processed.
    pub pages: usize,
    /// Output for each requested engine, in request order.
    #[serde(serialize_with = "serialize_models")]
    #[schemars(with = "BTreeMap<String, ModelOutput>")]
    pub models: Vec<(String, ModelOutput)>,
}

impl ExtractResponse {
    /// Look up the output for an engine name, as requested.
    #[cfg(test)]
    pub fn model(&self, name: &str) -> Option<&ModelOutput> {
        self.models.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }
}

/// Write models as a JSON object, preserving order.
fn serialize_models<S: Serializer>(
    models: &[(String, ModelOutput)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(models.iter().map(|(name, output)| (name, output)))
}

/// Runs engines and renders their annotated pages.
pub struct Orchestrator {
    registry: AdapterRegistry,
    dpi: u32,
    jobs: usize,
}

impl Orchestrator {
    /// Create an orchestrator rendering at `dpi` and running up to `jobs`
    /// engines at once.
    pub fn new(registry: AdapterRegistry, dpi: u32, jobs: usize) -> Self {
        Self {
            registry,
            dpi,
            jobs: jobs.max(1),
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Run each engine in `engine_names` over pages `start..=end` (1-based)
    /// of `doc`.
    #[instrument(level = "debug", skip(self, doc), fields(pages = doc.page_count()))]
    pub async fn run(
        &self,
        doc: &Document,
        engine_names: &[String],
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<ExtractResponse, ExtractError> {
        let range = PageRange::resolve(start, end, doc.page_count())?;
        let confidence = (!doc.is_native()).then_some(DEGRADED_CONFIDENCE);
        let models = stream::iter(
            engine_names
                .iter()
                .map(|name| self.run_engine(doc, name, range, confidence)),
        )
        .buffered(self.jobs)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(ExtractResponse {
            pages: range.indices(doc.page_count()).len(),
            models,
        })
    }

    /// Run a single engine and annotate its pages.
    #[instrument(level = "debug", skip(self, doc, range, confidence))]
    async fn run_engine(
        &self,
        doc: &Document,
        name: &str,
        range: PageRange,
        confidence: Option<f32>,
    ) -> Result<(String, ModelOutput), ExtractError> {
        let adapter = self.registry.get(name);
        let started = Instant::now();
        let result = adapter.extract(doc, Some(range)).await;
        let meta = ModelMeta::new(&result, started.elapsed(), confidence);
        debug!(engine = name, adapter = adapter.name(), ?meta, "Engine finished");

        let page_indices = range.indices(doc.page_count());
        let mut annotated_images = Vec::with_capacity(page_indices.len());
        for page_idx in page_indices {
            let page_size = doc.page(page_idx)?.size();
            let image = raster::render_page(doc, page_idx, self.dpi).await?;
            let blocks = result.blocks.get(&page_idx).cloned().unwrap_or_default();
            let encoded = spawn_blocking_propagating_panics(move || {
                png_data_url(&annotate(&image, &blocks, page_size))
            })
            .await;
            annotated_images.push(encoded.unwrap_or_else(|err| {
                error!(engine = name, page_idx, "Cannot encode page image: {:#}", err);
                data_url("image/png", &[])
            }));
        }

        Ok((
            name.to_owned(),
            ModelOutput {
                text_markdown: result.markdown,
                annotated_images,
                meta,
            },
        ))
    }
}
