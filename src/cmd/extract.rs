//! The `extract` subcommand.

use clap::Args;

use crate::{
    async_utils::write_json_output,
    engines::{EngineOpts, KNOWN_ENGINES},
    prelude::*,
    service::{ExtractRequest, ExtractService, ServiceOpts},
    ui::{ProgressConfig, Ui},
};

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// The PDF to extract.
    pub input_path: PathBuf,

    /// Comma-separated engines to run. Unknown names use the default engine.
    #[clap(long, default_value_t = KNOWN_ENGINES.join(","))]
    pub models: String,

    /// First page to process (1-based).
    #[clap(long)]
    pub page_start: Option<usize>,

    /// Last page to process (inclusive).
    #[clap(long)]
    pub page_end: Option<usize>,

    /// Client identity used for rate limiting.
    #[clap(long, default_value = "local")]
    pub client: String,

    #[clap(flatten)]
    pub engine_opts: EngineOpts,

    #[clap(flatten)]
    pub service_opts: ServiceOpts,

    /// Output file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all, fields(input = %opts.input_path.display()))]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let service = ExtractService::from_opts(&opts.engine_opts, &opts.service_opts).await?;

    let bytes = tokio::fs::read(&opts.input_path)
        .await
        .with_context(|| format!("cannot read {:?}", opts.input_path.display()))?;
    let file_name = opts
        .input_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let req = ExtractRequest {
        file_name,
        bytes,
        models: opts.models.clone(),
        page_start: opts.page_start,
        page_end: opts.page_end,
        client: opts.client.clone(),
    };

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "📄",
        msg: "Extracting",
        done_msg: "Extracted",
    });
    let response = service.extract(&req).await;
    spinner.finish_using_style();
    let response =
        response.with_context(|| format!("cannot extract {:?}", opts.input_path.display()))?;

    write_json_output(opts.output_path.as_deref(), &response).await
}
