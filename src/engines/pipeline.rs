//! External model pipelines, used for each engine's preferred tier.
//!
//! A pipeline is any program that can be run as
//!
//! ```text
//! <command...> <pdf-path> <first-page> <last-page>
//! ```
//!
//! with 1-based, inclusive page numbers, and that prints a [`PipelineOutput`]
//! to standard output.

use std::ops::Range;

use schemars::JsonSchema;
use tokio::process::Command;

use crate::{async_utils::run_command, geometry::Rect, pdf::Document, prelude::*};

/// What a model pipeline prints.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
pub struct PipelineOutput {
    /// One entry for each requested page, in order.
    pub pages: Vec<PipelinePage>,
}

/// Model output for a single page.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct PipelinePage {
    /// Markdown text for the page.
    pub markdown: String,

    /// Layout blocks as `[x0, y0, x1, y1]`, in PDF points with a top-left
    /// origin.
    #[serde(default)]
    #[schemars(with = "Vec<[f32; 4]>")]
    pub blocks: Vec<Rect>,
}

/// A model that turns document pages into markdown and layout blocks.
#[async_trait]
pub trait ModelPipeline: Send + Sync + 'static {
    /// A name for logs.
    fn name(&self) -> &str;

    /// Process the 0-based `pages` of `doc`.
    async fn run(&self, doc: &Document, pages: Range<usize>) -> Result<PipelineOutput>;
}

/// A [`ModelPipeline`] that runs an external command.
#[derive(Clone, Debug)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
}

impl CommandPipeline {
    /// Parse a command line. Arguments are split on whitespace; there is no
    /// quoting.
    pub fn new(command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace().map(str::to_owned);
        let program = words
            .next()
            .ok_or_else(|| anyhow!("pipeline command is empty"))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

#[async_trait]
impl ModelPipeline for CommandPipeline {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(level = "debug", skip(self, doc), fields(program = %self.program))]
    async fn run(&self, doc: &Document, pages: Range<usize>) -> Result<PipelineOutput> {
        if pages.is_empty() {
            return Ok(PipelineOutput::default());
        }
        let path = doc
            .backend()
            .and_then(|backend| backend.source_path())
            .ok_or_else(|| anyhow!("document has no file for {} to read", self.program))?;

        let output = run_command(
            &self.program,
            Command::new(&self.program)
                .args(&self.args)
                .arg(path)
                .arg((pages.start + 1).to_string())
                .arg(pages.end.to_string()),
        )
        .await?;
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("{} printed invalid pipeline output", self.program))
    }
}
