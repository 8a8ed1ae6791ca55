use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::convert::convert_to_mapping;
use crate::download::Downloader;
use crate::error::GenerateError;
use crate::order::Order;
use crate::saver::{Saver, Style};
use crate::value::{Mapping, Value};
use crate::workspace::WorkspaceClient;

use super::is_workspace_path;

/// Section under `resources` the job is written to.
pub const SECTION: &str = "jobs";
/// Config files are named `<key>.job.yml`.
pub const SUFFIX: &str = "job";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub job_id: i64,
    pub creator_user_name: Option<String>,
    pub settings: JobSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub name: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,
    pub existing_cluster_id: Option<String>,
    pub new_cluster: Option<Json>,
    pub job_clusters: Vec<Json>,
    pub tasks: Vec<Task>,
    pub git_source: Option<Json>,
    pub parameters: Vec<JobParameter>,
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub task_key: String,
    pub description: Option<String>,
    pub depends_on: Vec<TaskDependency>,
    pub existing_cluster_id: Option<String>,
    pub new_cluster: Option<Json>,
    pub job_cluster_key: Option<String>,
    pub notebook_task: Option<NotebookTask>,
    pub spark_python_task: Option<SparkPythonTask>,
    pub sql_task: Option<SqlTask>,
    pub libraries: Vec<Json>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDependency {
    pub task_key: String,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookTask {
    pub notebook_path: String,
    pub source: Option<Source>,
    pub base_parameters: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkPythonTask {
    pub python_file: String,
    pub source: Option<Source>,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlTask {
    pub warehouse_id: String,
    pub file: Option<SqlTaskFile>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlTaskFile {
    pub path: String,
    pub source: Option<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Workspace,
    Git,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParameter {
    pub name: String,
    pub default: String,
}

pub fn job_order() -> Order {
    Order::new(["name", "job_clusters", "compute", "tasks"])
}

pub fn task_order() -> Order {
    Order::new([
        "task_key",
        "depends_on",
        "existing_cluster_id",
        "new_cluster",
        "job_cluster_key",
    ])
}

/// Map-of-string fields are quoted wholesale.
pub fn saver() -> Saver {
    Saver::with_style([
        ("spark_conf", Style::DoubleQuoted),
        ("custom_tags", Style::DoubleQuoted),
        ("tags", Style::DoubleQuoted),
    ])
}

/// Registers every workspace notebook, Python file and SQL file the job's tasks run,
/// rewriting the task paths to the local copies.
pub async fn mark_for_download<C>(
    job: &mut Job,
    downloader: &mut Downloader<'_, C>,
) -> Result<(), GenerateError>
where
    C: WorkspaceClient + ?Sized,
{
    let from_git = job.settings.git_source.is_some();
    for task in &mut job.settings.tasks {
        if let Some(notebook) = task.notebook_task.as_mut() {
            if runs_from_workspace(notebook.source, from_git) && is_workspace_path(&notebook.notebook_path) {
                downloader
                    .mark_notebook_for_download(&mut notebook.notebook_path)
                    .await?;
            } else {
                debug!(task = %task.task_key, "Notebook is not in the workspace, leaving path as is");
            }
        }
        if let Some(python) = task.spark_python_task.as_mut() {
            if runs_from_workspace(python.source, from_git) && is_workspace_path(&python.python_file) {
                downloader.mark_file_for_download(&mut python.python_file).await?;
            }
        }
        if let Some(file) = task.sql_task.as_mut().and_then(|sql| sql.file.as_mut()) {
            if runs_from_workspace(file.source, from_git) && is_workspace_path(&file.path) {
                downloader.mark_file_for_download(&mut file.path).await?;
            }
        }
    }
    Ok(())
}

fn runs_from_workspace(source: Option<Source>, from_git: bool) -> bool {
    match source {
        Some(Source::Workspace) => true,
        Some(Source::Git) => false,
        None => !from_git,
    }
}

pub fn convert_job_to_value(job: &Job) -> Result<Value, GenerateError> {
    let mut order = job_order();
    let mut value = Mapping::new();

    if !job.settings.tasks.is_empty() {
        let mut task_order = task_order();
        let tasks = job
            .settings
            .tasks
            .iter()
            .map(|task| convert_to_mapping(task, Some(&mut task_order), &["format"], Mapping::new()))
            .collect::<Result<Vec<_>, _>>()?;
        value.insert("tasks", order.get("tasks"), Value::Sequence(tasks));
    }

    // Parameters are built by hand so an empty default survives and `name` leads.
    if !job.settings.parameters.is_empty() {
        let params = job
            .settings
            .parameters
            .iter()
            .map(|p| {
                let mut param_order = Order::new(["name", "default"]);
                let mut param = Mapping::new();
                param.insert("name", param_order.get("name"), p.name.clone().into());
                param.insert("default", param_order.get("default"), p.default.clone().into());
                Value::Mapping(param)
            })
            .collect();
        value.insert("parameters", order.get("parameters"), Value::Sequence(params));
    }

    convert_to_mapping(
        &job.settings,
        Some(&mut order),
        &["format", "new_cluster", "existing_cluster_id"],
        value,
    )
}
