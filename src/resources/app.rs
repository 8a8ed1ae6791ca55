use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::convert::from_json;
use crate::download::Downloader;
use crate::error::GenerateError;
use crate::order::Order;
use crate::saver::Saver;
use crate::value::{Mapping, Value};
use crate::workspace::WorkspaceClient;

pub const SECTION: &str = "apps";
pub const SUFFIX: &str = "app";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub name: String,
    pub description: Option<String>,
    pub default_source_code_path: Option<String>,
    pub resources: Vec<Json>,
    pub url: Option<String>,
    pub creator: Option<String>,
    pub create_time: Option<String>,
    pub app_status: Option<Json>,
    pub compute_status: Option<Json>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

pub fn app_order() -> Order {
    Order::new(["name", "description", "source_code_path", "resources"])
}

pub fn saver() -> Saver {
    Saver::new()
}

/// Registers the app's source directory, rewriting its path to the local copy.
pub async fn mark_for_download<C>(
    app: &mut App,
    downloader: &mut Downloader<'_, C>,
) -> Result<(), GenerateError>
where
    C: WorkspaceClient + ?Sized,
{
    if let Some(path) = app.default_source_code_path.as_mut() {
        downloader.mark_directory_for_download(path).await?;
    }
    Ok(())
}

/// Most app fields are read-only status; only the deployable ones are copied.
pub fn convert_app_to_value(app: &App) -> Result<Value, GenerateError> {
    let mut order = app_order();
    let mut value = Mapping::new();
    value.insert("name", order.get("name"), app.name.clone().into());
    if let Some(description) = &app.description {
        value.insert("description", order.get("description"), description.clone().into());
    }
    if let Some(path) = &app.default_source_code_path {
        value.insert("source_code_path", order.get("source_code_path"), path.clone().into());
    }
    if let Some(resources) = from_json(serde_json::to_value(&app.resources)?)? {
        value.insert("resources", order.get("resources"), resources);
    }
    Ok(Value::Mapping(value))
}
