use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod annotate;
mod async_utils;
mod cmd;
mod cpu_limit;
mod data_url;
mod engines;
mod error;
mod geometry;
mod health;
mod ocr;
mod orchestrator;
mod pdf;
mod prelude;
mod rate_limit;
mod service;
#[cfg(test)]
mod test_support;
mod ui;

/// Compare PDF extraction engines side by side.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
External Tools:
  - pdfinfo, pdftotext, pdftocairo (poppler-utils): native PDF support.
    Without them, documents are replaced by synthetic placeholder pages.
  - tesseract: OCR for scanned pages.

Environment Variables:
  - SURYA_COMMAND, DOCLING_COMMAND, MINERU_COMMAND (optional): model
    pipeline commands. Each is run as `<command> <pdf> <first> <last>`
    and must print JSON matching `schema PipelineOutput`.
  - RUST_LOG (optional): log filter, such as `debug`.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run engines over a PDF and print text, annotated pages and metadata.
    Extract(cmd::extract::ExtractOpts),
    /// Report which PDF, OCR and model backends are available.
    Health(cmd::health::HealthOpts),
    /// Print schemas for output formats.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Extract(opts) => opts.output_path.is_none(),
            Cmd::Health(opts) => opts.output_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive = Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Extract(opts) => cmd::extract::cmd_extract(ui, opts).await,
        Cmd::Health(opts) => cmd::health::cmd_health(opts).await,
        Cmd::Schema(opts) => cmd::schema::cmd_schema(opts).await,
    }
}
