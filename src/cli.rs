//! Command-line surface for bundle-generate.
//!
//! The entry struct [`Cli`] defines the user-facing options and subcommands.
//! [`run`] is the async entrypoint used by `main` and by integration tests;
//! all generation logic lives in [`crate::generate`].
use crate::client::HttpWorkspaceClient;
use crate::generate::{generate, GenerateOptions, Target};
use crate::load_config::{load_config, GenerateConfig};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for bundle-generate: turn live workspace resources into bundle configuration.
#[derive(Parser)]
#[clap(
    name = "bundle-generate",
    version,
    about = "Generate bundle configuration and source files from existing workspace resources"
)]
pub struct Cli {
    /// Optional YAML file with defaults for output directories and downloads
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate configuration for an existing job
    Job {
        /// Job ID of the job to generate config for
        #[clap(long)]
        existing_job_id: i64,
        #[clap(flatten)]
        output: OutputArgs,
    },
    /// Generate configuration for an existing pipeline
    Pipeline {
        /// ID of the pipeline to generate config for
        #[clap(long)]
        existing_pipeline_id: String,
        #[clap(flatten)]
        output: OutputArgs,
    },
    /// Generate configuration for an existing app
    App {
        /// Name of the app to generate config for
        #[clap(long)]
        existing_app_name: String,
        #[clap(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct OutputArgs {
    /// Resource key to use for the generated configuration
    #[clap(long)]
    pub key: Option<String>,

    /// Directory the generated YAML is written to
    #[clap(short = 'd', long)]
    pub config_dir: Option<PathBuf>,

    /// Directory downloaded files are written to
    #[clap(short = 's', long)]
    pub source_dir: Option<PathBuf>,

    /// Overwrite existing files
    #[clap(short = 'f', long)]
    pub force: bool,
}

impl OutputArgs {
    /// Flags win over the config file, which wins over the defaults.
    pub fn into_options(self, file: GenerateConfig) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        GenerateOptions {
            config_dir: self
                .config_dir
                .or(file.config_dir)
                .unwrap_or(defaults.config_dir),
            source_dir: self
                .source_dir
                .or(file.source_dir)
                .unwrap_or(defaults.source_dir),
            key: self.key,
            force: self.force,
            exclude_dirs: file.exclude_dirs.unwrap_or(defaults.exclude_dirs),
            concurrency: file.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let file_config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GenerateConfig::default(),
    };

    let (target, output) = match cli.command {
        Commands::Job {
            existing_job_id,
            output,
        } => (
            Target::Job {
                job_id: existing_job_id,
            },
            output,
        ),
        Commands::Pipeline {
            existing_pipeline_id,
            output,
        } => (
            Target::Pipeline {
                pipeline_id: existing_pipeline_id,
            },
            output,
        ),
        Commands::App {
            existing_app_name,
            output,
        } => (
            Target::App {
                name: existing_app_name,
            },
            output,
        ),
    };
    let options = output.into_options(file_config);

    let client = HttpWorkspaceClient::new_from_env()?;
    tracing::info!(?target, "Starting generation");
    match generate(&target, &options, &client, &client).await {
        Ok(report) => {
            println!("Generated {}", report.config_file.display());
            for file in &report.downloaded {
                println!("Downloaded {}", file.display());
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Generation failed");
            Err(anyhow::Error::new(e))
        }
    }
}
