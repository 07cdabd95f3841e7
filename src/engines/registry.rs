//! Looking up engines by name.

use std::sync::Arc;

use super::{
    Adapter, EngineOpts, docling::DoclingAdapter, mineru::MinerUAdapter,
    pipeline::{CommandPipeline, ModelPipeline},
    surya::SuryaAdapter,
};
use crate::{ocr::OcrEngine, prelude::*};

/// All known engines. Unknown names get the default engine.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
    default: Arc<dyn Adapter>,
}

impl AdapterRegistry {
    /// Build the engines, using `pipeline_for` to find each engine's model
    /// pipeline.
    pub fn with_pipelines(
        pipeline_for: impl Fn(&str) -> Option<Arc<dyn ModelPipeline>>,
        ocr: Arc<dyn OcrEngine>,
        ocr_dpi: u32,
    ) -> Self {
        let surya: Arc<dyn Adapter> = Arc::new(SuryaAdapter::new(
            pipeline_for(SuryaAdapter::NAME),
            ocr.clone(),
            ocr_dpi,
        ));
        let docling = Arc::new(DoclingAdapter::new(
            pipeline_for(DoclingAdapter::NAME),
            ocr.clone(),
            ocr_dpi,
        ));
        let mineru = Arc::new(MinerUAdapter::new(
            pipeline_for(MinerUAdapter::NAME),
            ocr,
            ocr_dpi,
        ));
        Self {
            adapters: vec![surya.clone(), docling, mineru],
            default: surya,
        }
    }

    /// Build the engines from command-line options.
    pub fn from_opts(opts: &EngineOpts, ocr: Arc<dyn OcrEngine>) -> Result<Self> {
        let mut pipelines = vec![];
        for name in [SuryaAdapter::NAME, DoclingAdapter::NAME, MinerUAdapter::NAME] {
            if let Some(command) = opts.pipeline_command(name) {
                let pipeline: Arc<dyn ModelPipeline> = Arc::new(
                    CommandPipeline::new(command)
                        .with_context(|| format!("bad pipeline command for {}", name))?,
                );
                debug!(engine = name, command, "Configured model pipeline");
                pipelines.push((name, pipeline));
            }
        }
        Ok(Self::with_pipelines(
            |name| {
                pipelines
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, p)| p.clone())
            },
            ocr,
            opts.ocr_dpi,
        ))
    }

    /// Look up an engine. Matching ignores case, and unknown names resolve
    /// to the default engine.
    pub fn get(&self, name: &str) -> Arc<dyn Adapter> {
        let name = name.trim().to_lowercase();
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .unwrap_or(&self.default)
            .clone()
    }

    /// The names of all registered engines.
    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}
