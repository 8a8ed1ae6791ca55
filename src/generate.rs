//! High-level pipeline: fetch → register references → convert → save → download.
//!
//! One call handles one resource. The resource is fetched through a
//! [`ResourceClient`], every workspace file it references is registered with a
//! fresh [`Downloader`] (which rewrites the reference to the local copy), the
//! result is converted into a ranked value tree and saved as YAML, and finally
//! the referenced files are downloaded.
//!
//! # Error Handling
//! Every step returns its error unchanged. The YAML file and the downloads are
//! checked against `force` independently, each all-or-nothing on its own.

use std::path::PathBuf;

use tracing::{error, info};

use crate::download::{Downloader, DEFAULT_CONCURRENCY, DEFAULT_EXCLUDED_DIRS};
use crate::error::GenerateError;
use crate::resources::{app, job, normalize_key, pipeline};
use crate::saver::Saver;
use crate::value::{Mapping, Value};
use crate::workspace::{ResourceClient, WorkspaceClient};

/// The resource to generate configuration for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Job { job_id: i64 },
    Pipeline { pipeline_id: String },
    App { name: String },
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub config_dir: PathBuf,
    pub source_dir: PathBuf,
    /// Resource key; derived from the resource name when absent.
    pub key: Option<String>,
    pub force: bool,
    pub exclude_dirs: Vec<String>,
    pub concurrency: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("resources"),
            source_dir: PathBuf::from("src"),
            key: None,
            force: false,
            exclude_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug)]
pub struct GenerateReport {
    pub key: String,
    pub config_file: PathBuf,
    pub downloaded: Vec<PathBuf>,
}

struct Generated {
    section: &'static str,
    suffix: &'static str,
    name: Option<String>,
    fallback_key: String,
    value: Value,
    saver: Saver,
}

pub async fn generate<W, R>(
    target: &Target,
    options: &GenerateOptions,
    workspace: &W,
    resources: &R,
) -> Result<GenerateReport, GenerateError>
where
    W: WorkspaceClient + ?Sized,
    R: ResourceClient + ?Sized,
{
    info!(
        ?target,
        config_dir = %options.config_dir.display(),
        source_dir = %options.source_dir.display(),
        "[GENERATE] Starting"
    );

    let mut downloader = Downloader::new(workspace, &options.source_dir, &options.config_dir)
        .with_excluded_dirs(options.exclude_dirs.iter().cloned())
        .with_concurrency(options.concurrency);

    let generated = match target {
        Target::Job { job_id } => {
            let mut job = resources.get_job(*job_id).await?;
            job::mark_for_download(&mut job, &mut downloader).await?;
            Generated {
                section: job::SECTION,
                suffix: job::SUFFIX,
                name: job.settings.name.clone(),
                fallback_key: format!("job_{job_id}"),
                value: job::convert_job_to_value(&job)?,
                saver: job::saver(),
            }
        }
        Target::Pipeline { pipeline_id } => {
            let mut pipeline = resources.get_pipeline(pipeline_id).await?;
            pipeline::mark_for_download(&mut pipeline, &mut downloader).await?;
            Generated {
                section: pipeline::SECTION,
                suffix: pipeline::SUFFIX,
                name: pipeline.spec.name.clone().or_else(|| pipeline.name.clone()),
                fallback_key: format!("pipeline_{}", normalize_key(pipeline_id)),
                value: pipeline::convert_pipeline_to_value(&pipeline)?,
                saver: pipeline::saver(),
            }
        }
        Target::App { name } => {
            let mut app = resources.get_app(name).await?;
            app::mark_for_download(&mut app, &mut downloader).await?;
            Generated {
                section: app::SECTION,
                suffix: app::SUFFIX,
                name: Some(app.name.clone()),
                fallback_key: "app".to_string(),
                value: app::convert_app_to_value(&app)?,
                saver: app::saver(),
            }
        }
    };

    let key = match &options.key {
        Some(key) => key.clone(),
        None => generated
            .name
            .as_deref()
            .map(normalize_key)
            .filter(|k| !k.is_empty())
            .unwrap_or(generated.fallback_key),
    };

    let document = resource_document(generated.section, &key, generated.value);
    let config_file = options
        .config_dir
        .join(format!("{key}.{}.yml", generated.suffix));
    generated
        .saver
        .save_as_yaml(&document, &config_file, options.force)
        .map_err(|e| {
            error!(error = %e, path = %config_file.display(), "[GENERATE][ERROR] Saving config failed");
            e
        })?;

    let downloaded: Vec<PathBuf> = downloader.files().keys().cloned().collect();
    downloader.flush_to_disk(options.force).await.map_err(|e| {
        error!(error = %e, "[GENERATE][ERROR] Downloading files failed");
        e
    })?;

    info!(
        key = %key,
        config_file = %config_file.display(),
        files = downloaded.len(),
        "[GENERATE] Complete"
    );
    Ok(GenerateReport {
        key,
        config_file,
        downloaded,
    })
}

/// Wraps a converted resource as `resources.<section>.<key>`.
pub fn resource_document(section: &str, key: &str, value: Value) -> Value {
    let mut keyed = Mapping::new();
    keyed.insert(key, 0, value);
    let mut sections = Mapping::new();
    sections.insert(section, 0, Value::Mapping(keyed));
    let mut root = Mapping::new();
    root.insert("resources", 0, Value::Mapping(sections));
    Value::Mapping(root)
}
