//! The request path: validation, admission control, loading and
//! orchestration.
//!
//! This is what an HTTP layer would call. Caller errors come back as
//! [`ExtractError`]s; everything else degrades inside the engines.

use std::{collections::BTreeMap, sync::Arc};

use clap::Args;

use crate::{
    engines::{EngineOpts, KNOWN_ENGINES, parse_engine_names, registry::AdapterRegistry},
    error::ExtractError,
    health::{ComponentStatus, HealthReport},
    ocr::ocr_engine_for_choice,
    orchestrator::{ExtractResponse, Orchestrator},
    pdf::DocumentLoader,
    prelude::*,
    rate_limit::{RateLimit, SlidingWindowLimiter},
};

/// Default upload size cap: 15 MiB.
pub const MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// MIME type we accept, as detected from magic bytes.
const PDF_MIME_TYPE: &str = "application/pdf";

/// Options for request handling.
#[derive(Args, Clone, Debug)]
pub struct ServiceOpts {
    /// Reject uploads larger than this many bytes.
    #[clap(long, default_value_t = MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Per-client request limit, of the form "12/m" or "2/s".
    #[clap(long, default_value_t)]
    pub rate_limit: RateLimit,

    /// Max number of engines to run at a time.
    #[clap(short = 'j', long = "jobs", default_value = "3")]
    pub job_count: usize,
}

impl Default for ServiceOpts {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            rate_limit: RateLimit::default(),
            job_count: 3,
        }
    }
}

/// An extraction request.
#[derive(Clone, Debug)]
pub struct ExtractRequest {
    /// The uploaded file's name, which must end in `.pdf`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Comma-separated engine names. Empty means every known engine.
    pub models: String,
    /// First page to process, 1-based.
    pub page_start: Option<usize>,
    /// Last page to process, inclusive.
    pub page_end: Option<usize>,
    /// Rate-limiter identity.
    pub client: String,
}

/// Handles extraction requests and health probes.
pub struct ExtractService {
    loader: DocumentLoader,
    ocr_status: ComponentStatus,
    orchestrator: Orchestrator,
    limiter: SlidingWindowLimiter,
    max_upload_bytes: usize,
    pipelines: BTreeMap<String, bool>,
}

impl ExtractService {
    /// Assemble a service from its parts.
    pub fn new(
        loader: DocumentLoader,
        ocr_status: ComponentStatus,
        registry: AdapterRegistry,
        engine_opts: &EngineOpts,
        service_opts: &ServiceOpts,
    ) -> Self {
        let pipelines = KNOWN_ENGINES
            .iter()
            .map(|&name| {
                (
                    name.to_owned(),
                    engine_opts.pipeline_command(name).is_some(),
                )
            })
            .collect();
        Self {
            loader,
            ocr_status,
            orchestrator: Orchestrator::new(registry, engine_opts.dpi, service_opts.job_count),
            limiter: SlidingWindowLimiter::new(service_opts.rate_limit.clone()),
            max_upload_bytes: service_opts.max_upload_bytes,
            pipelines,
        }
    }

    /// Probe for external tools and build a service.
    #[instrument(level = "debug", skip_all)]
    pub async fn from_opts(engine_opts: &EngineOpts, service_opts: &ServiceOpts) -> Result<Self> {
        let loader = DocumentLoader::from_choice(engine_opts.pdf_backend).await?;
        let (ocr, ocr_status) = ocr_engine_for_choice(engine_opts.ocr).await?;
        let registry = AdapterRegistry::from_opts(engine_opts, Arc::clone(&ocr))?;
        info!(
            pdf_backend = loader.status().name.as_deref().unwrap_or("none"),
            ocr = ocr.name(),
            "Extraction service ready"
        );
        Ok(Self::new(
            loader,
            ocr_status,
            registry,
            engine_opts,
            service_opts,
        ))
    }

    /// Report which optional engines are usable.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok".to_owned(),
            pdf_backend: self.loader.status().clone(),
            ocr: self.ocr_status.clone(),
            engines: self
                .orchestrator
                .registry()
                .names()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            pipelines: self.pipelines.clone(),
        }
    }

    /// Validate and run an extraction request.
    #[instrument(level = "debug", skip_all, fields(file_name = %req.file_name, client = %req.client))]
    pub async fn extract(&self, req: &ExtractRequest) -> Result<ExtractResponse, ExtractError> {
        if !self.limiter.admit(&req.client) {
            return Err(ExtractError::RateLimited {
                client: req.client.clone(),
            });
        }
        if !req.file_name.to_lowercase().ends_with(".pdf") {
            return Err(ExtractError::UnsupportedFormat(format!(
                "{:?} does not have a .pdf extension",
                req.file_name
            )));
        }
        if req.bytes.is_empty() {
            return Err(ExtractError::EmptyInput);
        }
        if req.bytes.len() > self.max_upload_bytes {
            return Err(ExtractError::TooLarge {
                size: req.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        match infer::get(&req.bytes).map(|kind| kind.mime_type()) {
            Some(PDF_MIME_TYPE) => {}
            // PDF readers tolerate junk before the header, so let a real
            // backend decide.
            None if self.loader.status().active => {
                debug!("No PDF header at offset 0; deferring to the PDF backend");
            }
            other => {
                return Err(ExtractError::UnsupportedFormat(format!(
                    "expected {}, found {}",
                    PDF_MIME_TYPE,
                    other.unwrap_or("unrecognized data")
                )));
            }
        }

        let doc = self.loader.load(&req.bytes).await?;
        let engines = parse_engine_names(&req.models);
        debug!(pages = doc.page_count(), ?engines, "Loaded document");
        self.orchestrator
            .run(&doc, &engines, req.page_start, req.page_end)
            .await
    }
}
