use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::convert::convert_to_mapping;
use crate::download::Downloader;
use crate::error::GenerateError;
use crate::order::Order;
use crate::saver::{Saver, Style};
use crate::value::{Mapping, Value};
use crate::workspace::WorkspaceClient;

use super::is_workspace_path;

pub const SECTION: &str = "pipelines";
pub const SUFFIX: &str = "pipeline";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub pipeline_id: String,
    pub name: Option<String>,
    pub state: Option<String>,
    pub creator_user_name: Option<String>,
    pub spec: PipelineSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub target: Option<String>,
    pub storage: Option<String>,
    pub development: Option<bool>,
    pub continuous: Option<bool>,
    pub serverless: Option<bool>,
    pub clusters: Vec<Json>,
    pub configuration: BTreeMap<String, String>,
    pub libraries: Vec<PipelineLibrary>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineLibrary {
    pub notebook: Option<LibraryPath>,
    pub file: Option<LibraryPath>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryPath {
    pub path: String,
}

pub fn pipeline_order() -> Order {
    Order::new(["name", "clusters", "configuration", "libraries"])
}

pub fn saver() -> Saver {
    Saver::with_style([
        ("configuration", Style::DoubleQuoted),
        ("spark_conf", Style::DoubleQuoted),
        ("custom_tags", Style::DoubleQuoted),
        ("tags", Style::DoubleQuoted),
    ])
}

/// Registers notebook and file libraries that live in the workspace.
pub async fn mark_for_download<C>(
    pipeline: &mut Pipeline,
    downloader: &mut Downloader<'_, C>,
) -> Result<(), GenerateError>
where
    C: WorkspaceClient + ?Sized,
{
    for library in &mut pipeline.spec.libraries {
        if let Some(notebook) = library.notebook.as_mut().filter(|n| is_workspace_path(&n.path)) {
            downloader.mark_notebook_for_download(&mut notebook.path).await?;
        }
        if let Some(file) = library.file.as_mut().filter(|f| is_workspace_path(&f.path)) {
            downloader.mark_file_for_download(&mut file.path).await?;
        }
    }
    Ok(())
}

/// `id` is read-only and `storage` is left to the platform.
pub fn convert_pipeline_to_value(pipeline: &Pipeline) -> Result<Value, GenerateError> {
    let mut order = pipeline_order();
    convert_to_mapping(&pipeline.spec, Some(&mut order), &["id", "storage", "format"], Mapping::new())
}
