//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;

use crate::{
    async_utils::write_json_output, engines::pipeline::PipelineOutput, health::HealthReport,
    orchestrator::ExtractResponse, prelude::*,
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// Output of `extract`.
    ExtractResponse,
    /// Output of `health`.
    HealthReport,
    /// What a model pipeline command must print.
    PipelineOutput,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::ExtractResponse => schema_for!(ExtractResponse),
        SchemaType::HealthReport => schema_for!(HealthReport),
        SchemaType::PipelineOutput => schema_for!(PipelineOutput),
    };
    write_json_output(schema_opts.output_path.as_deref(), &schema).await
}
