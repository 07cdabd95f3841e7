//! The `health` subcommand.

use clap::Args;

use crate::{
    async_utils::write_json_output,
    engines::EngineOpts,
    prelude::*,
    service::{ExtractService, ServiceOpts},
};

/// Health command line arguments.
#[derive(Debug, Args)]
pub struct HealthOpts {
    #[clap(flatten)]
    pub engine_opts: EngineOpts,

    /// Output file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `health` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_health(opts: &HealthOpts) -> Result<()> {
    let service = ExtractService::from_opts(&opts.engine_opts, &ServiceOpts::default()).await?;
    write_json_output(opts.output_path.as_deref(), &service.health()).await
}
